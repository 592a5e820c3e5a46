//! Device controller: every operation against the target device path.
//!
//! Existence is decided by `GetManagedObjects`, never by property or
//! introspection probes; the daemon will happily build a proxy for a
//! path that is not a real managed object. Connect carries the
//! progressive retry for the `le-connection-abort-by-local` RF race,
//! and pairing wraps the connect-then-pair ordering BLE SMP requires
//! together with the transient agent registration.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use zbus::proxy::CacheProperties;
use zbus::zvariant::OwnedObjectPath;

use crate::app::Teardown;
use crate::bluez::agent::AgentRegistration;
use crate::bluez::proxies::{Adapter1Proxy, BluezObjectManagerProxy, Device1Proxy};
use crate::bluez::{
    error_name, is_le_abort, DEVICE_INTERFACE, ERR_ALREADY_CONNECTED, ERR_DOES_NOT_EXIST,
};
use crate::bus::BusSession;
use crate::config::{MacAddress, Tunables};
use crate::error::{classify, is_access_denied, Error};
use crate::output::Reporter;

/// Result of a probe connect against an existing bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondStatus {
    /// The remote accepted the encrypted link; the bond is usable.
    Valid,
    /// The remote refused the link; its half of the bond is gone.
    Invalid,
}

/// Delay before retry number `attempt` (1-based): linear backoff.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base * attempt
}

pub struct DeviceController<'a> {
    session: &'a BusSession,
    adapter: &'a Adapter1Proxy<'static>,
    mac: MacAddress,
    device_path: OwnedObjectPath,
    report: &'a Reporter,
    tunables: &'a Tunables,
}

impl<'a> DeviceController<'a> {
    pub fn new(
        session: &'a BusSession,
        adapter: &'a Adapter1Proxy<'static>,
        adapter_path: &OwnedObjectPath,
        mac: &MacAddress,
        report: &'a Reporter,
        tunables: &'a Tunables,
    ) -> Result<Self, Error> {
        let device_path = OwnedObjectPath::try_from(mac.device_path(adapter_path.as_str()))
            .map_err(|e| Error::Unexpected(format!("derived device path is invalid: {e}")))?;
        Ok(Self {
            session,
            adapter,
            mac: mac.clone(),
            device_path,
            report,
            tunables,
        })
    }

    pub fn path(&self) -> &OwnedObjectPath {
        &self.device_path
    }

    /// Fresh uncached proxy for the device path. Building one does not
    /// touch the bus, so it is valid even before the device exists.
    async fn device_proxy(&self) -> Result<Device1Proxy<'static>, Error> {
        Device1Proxy::builder(self.session.connection())
            .path(self.device_path.to_string())
            .map_err(|e| classify(e, "device proxy path invalid", Error::Pairing))?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(|e| classify(e, "Device1 proxy failed", Error::Pairing))
    }

    /// Whether the target is a real managed object carrying `Device1`.
    pub async fn exists(&self) -> Result<bool, Error> {
        let om = BluezObjectManagerProxy::new(self.session.connection())
            .await
            .map_err(|e| classify(e, "ObjectManager proxy failed", Error::Pairing))?;
        let objects = om
            .get_managed_objects()
            .await
            .map_err(|e| classify(e, "GetManagedObjects failed", Error::Pairing))?;
        let present = objects
            .get(&self.device_path)
            .map(|interfaces| interfaces.contains_key(DEVICE_INTERFACE))
            .unwrap_or(false);
        if present {
            self.report.verbose(&format!("device exists: {}", self.device_path));
        } else {
            self.report.verbose(&format!("device not found: {}", self.device_path));
        }
        Ok(present)
    }

    pub async fn is_paired(&self) -> bool {
        match self.device_proxy().await {
            Ok(device) => device.paired().await.unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn is_trusted(&self) -> bool {
        match self.device_proxy().await {
            Ok(device) => device.trusted().await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Human-readable bond state for the `Bond:` progress line.
    pub async fn bond_summary(&self) -> String {
        match (self.is_paired().await, self.is_trusted().await) {
            (true, true) => "found (paired + trusted)".into(),
            (true, false) => "found (paired, not trusted)".into(),
            (false, _) => "found (not paired)".into(),
        }
    }

    /// Probes an existing bond with a connect/disconnect cycle.
    ///
    /// BlueZ error strings for a rejected bond vary across daemon
    /// versions, so any connect failure here means the bond is stale;
    /// only permission problems propagate.
    pub async fn verify(&self) -> Result<BondStatus, Error> {
        self.report.verbose("verifying bond with a probe connect");
        match self.connect_with_retry().await {
            Ok(()) => {
                if let Ok(device) = self.device_proxy().await {
                    if let Err(e) = device.disconnect().await {
                        debug!("disconnect after probe failed: {e}");
                    }
                }
                Ok(BondStatus::Valid)
            }
            Err(Error::Permission(detail)) => Err(Error::Permission(detail)),
            Err(e) => {
                debug!("probe connect failed: {e}");
                Ok(BondStatus::Invalid)
            }
        }
    }

    /// `Device1.Connect` with a bounded linear-backoff retry.
    ///
    /// Only `le-connection-abort-by-local` is retried; it is an RF
    /// timing race right after discovery, not a real rejection.
    /// Authentication-class failures return immediately.
    pub async fn connect_with_retry(&self) -> Result<(), Error> {
        let device = self.device_proxy().await?;
        let retries = self.tunables.connect_retries;
        for attempt in 1..=retries {
            match timeout(self.tunables.connect_timeout, device.connect()).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) if error_name(&e) == Some(ERR_ALREADY_CONNECTED) => return Ok(()),
                Ok(Err(e)) if is_access_denied(&e) => {
                    return Err(classify(e, "Connect failed", Error::Pairing));
                }
                Ok(Err(e)) => {
                    let text = e.to_string();
                    if !is_le_abort(&text) {
                        return Err(Error::Pairing(format!(
                            "connect failed for {}: {text}",
                            self.mac
                        )));
                    }
                    debug!(attempt, retries, "local controller aborted the LE link");
                    self.report
                        .verbose(&format!("connect retry {attempt}/{retries}"));
                    sleep(retry_delay(self.tunables.connect_retry_base, attempt)).await;
                }
                Err(_) => {
                    return Err(Error::Pairing(format!(
                        "connection to {} timed out. Is the device powered on and in range?",
                        self.mac
                    )));
                }
            }
        }
        Err(Error::Pairing(format!(
            "connection to {} failed after {retries} attempts. \
             Is the device powered on and in range?",
            self.mac
        )))
    }

    /// Runs the full pairing handshake with a transient agent.
    ///
    /// The agent is registered for exactly this attempt and released on
    /// success and failure alike.
    pub async fn pair(&self, pin: &str, teardown: &Teardown) -> Result<(), Error> {
        let agent = AgentRegistration::register(self.session.connection(), pin).await?;
        teardown.agent_registered(true);
        self.report.field("Agent", "registered");

        let outcome = self.pair_over_link().await;

        agent.release().await;
        teardown.agent_registered(false);
        outcome
    }

    async fn pair_over_link(&self) -> Result<(), Error> {
        // SMP runs over an existing L2CAP link. Calling Pair without a
        // connection makes the daemon page over BR/EDR, which dies with
        // a Page Timeout on BLE-only peripherals.
        self.connect_with_retry().await?;
        self.report.verbose("connected, starting SMP pairing");

        let device = self.device_proxy().await?;
        device.pair().await.map_err(|e| {
            classify(e, &format!("Pair failed for {}", self.mac), Error::Pairing)
        })?;
        self.report.field("Pairing", "success");
        info!(device = %self.mac, "pairing successful");

        // Leave the link down; the downstream application owns the next
        // connect.
        if let Err(e) = device.disconnect().await {
            debug!("disconnect after pair failed: {e}");
        }
        Ok(())
    }

    /// Marks the device trusted so the daemon auto-accepts future
    /// connections. No-op when already trusted; never performed on an
    /// unpaired device. Best effort: the bond itself is already stored.
    pub async fn trust(&self) -> Result<(), Error> {
        let device = self.device_proxy().await?;
        if device.trusted().await.unwrap_or(false) {
            self.report.verbose("device already trusted");
            return Ok(());
        }
        if !device.paired().await.unwrap_or(false) {
            warn!(device = %self.mac, "skipping trust, device is not paired");
            return Ok(());
        }
        match device.set_trusted(true).await {
            Ok(()) => {
                self.report.field("Trusted", "set");
                info!(device = %self.mac, "device trusted");
            }
            Err(e) => warn!("failed to set trusted: {e}"),
        }
        Ok(())
    }

    /// Drops the device and its bond from the adapter. Idempotent:
    /// a missing device is success.
    pub async fn remove(&self) -> Result<(), Error> {
        match self.adapter.remove_device(&self.device_path).await {
            Ok(()) => {
                self.report.verbose(&format!("removed device {}", self.mac));
                info!(device = %self.mac, "device removed");
                Ok(())
            }
            Err(e) if error_name(&e) == Some(ERR_DOES_NOT_EXIST) => {
                debug!("RemoveDevice: device already gone");
                Ok(())
            }
            Err(e) if is_access_denied(&e) => Err(classify(e, "RemoveDevice failed", Error::Pairing)),
            Err(e) => {
                debug!("RemoveDevice failed: {e}");
                Ok(())
            }
        }
    }

    pub async fn remove_if_exists(&self) -> Result<(), Error> {
        if self.exists().await? {
            self.remove().await
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_linearly() {
        let base = Duration::from_secs(1);
        assert_eq!(retry_delay(base, 1), Duration::from_secs(1));
        assert_eq!(retry_delay(base, 2), Duration::from_secs(2));
        assert_eq!(retry_delay(base, 5), Duration::from_secs(5));
    }

    #[test]
    fn backoff_scales_with_the_base() {
        let base = Duration::from_millis(250);
        assert_eq!(retry_delay(base, 4), Duration::from_secs(1));
    }
}
