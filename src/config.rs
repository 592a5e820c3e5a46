//! Run configuration: the validated MAC target, CLI switches, and the
//! timing constants of the protocol driver.
//!
//! There is deliberately no config file and no environment surface; the
//! daemon owns all persistent bond state, and this tool is parameterized
//! entirely by its command line.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A 48-bit Bluetooth address in canonical upper-case colon form.
///
/// The MAC and its derived BlueZ object path are in one-to-one
/// correspondence: `AA:BB:CC:DD:EE:FF` maps to
/// `<adapter>/dev_AA_BB_CC_DD_EE_FF`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacAddress(String);

impl MacAddress {
    /// The BlueZ device object path under the given adapter.
    pub fn device_path(&self, adapter_path: &str) -> String {
        format!("{}/dev_{}", adapter_path, self.0.replace(':', "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MacAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<&str> = s.split(':').collect();
        let well_formed = octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
        if !well_formed {
            return Err(format!(
                "invalid MAC address '{s}', expected format AA:BB:CC:DD:EE:FF"
            ));
        }
        Ok(MacAddress(s.to_ascii_uppercase()))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable per-run configuration, built from the CLI surface.
#[derive(Debug, Clone)]
pub struct Config {
    pub mac: MacAddress,
    pub check_only: bool,
    pub force_repair: bool,
    pub verbose: bool,
}

/// Timing knobs of the protocol driver.
///
/// Defaults come from the reference bring-up against BlueZ 5.6x/5.8x
/// hardware; they are plain values rather than inline literals so a
/// future flag can override them without touching the driver.
#[derive(Debug, Clone)]
pub struct Tunables {
    /// Bound on the wait for the target's `InterfacesAdded` signal.
    pub discovery_timeout: Duration,
    /// Pause between `StopDiscovery` and the first connect, letting the
    /// controller release scan state.
    pub settle_delay: Duration,
    /// Per-attempt bound on `Device1.Connect`.
    pub connect_timeout: Duration,
    /// Connect attempts before giving up on the RF-timing race.
    pub connect_retries: u32,
    /// Base of the linear backoff between connect attempts.
    pub connect_retry_base: Duration,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            connect_retries: 5,
            connect_retry_base: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_canonicalizes_to_upper_case() {
        let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(mac.as_str(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn accepts_mixed_case() {
        assert!("Aa:0b:C1:dD:2e:F3".parse::<MacAddress>().is_ok());
    }

    #[test]
    fn rejects_wrong_shape() {
        for bad in [
            "",
            "AA:BB:CC:DD:EE",
            "AA:BB:CC:DD:EE:FF:00",
            "AABBCCDDEEFF",
            "AA-BB-CC-DD-EE-FF",
            "AA:BB:CC:DD:EE:GG",
            "AA:BB:CC:DD:EE:F",
            "AA:BB:CC:DD:EE:FFF",
        ] {
            assert!(bad.parse::<MacAddress>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn derives_the_device_object_path() {
        let mac: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(
            mac.device_path("/org/bluez/hci0"),
            "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF"
        );
    }

    #[test]
    fn tunables_defaults_match_the_reference_timing() {
        let t = Tunables::default();
        assert_eq!(t.discovery_timeout, Duration::from_secs(30));
        assert_eq!(t.settle_delay, Duration::from_secs(2));
        assert_eq!(t.connect_retries, 5);
        assert_eq!(t.connect_retry_base, Duration::from_secs(1));
    }
}
