//! BlueZ wire surface: interface constants, static proxies, and the
//! pairing agent we export back at the daemon.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  Adapter1 / Device1 / AgentManager1   ┌──────────┐
//! │   blebond    │──────────────────────────────────────>│  bluezd  │
//! │  (proxies)   │<──────────────────────────────────────│          │
//! └──────────────┘        org.bluez.Agent1 callbacks     └──────────┘
//! ```
//!
//! All proxies issue explicit method-call messages; none of them depend
//! on the daemon's introspection XML, which is not published reliably
//! for every interface across BlueZ versions.

pub mod agent;
pub mod proxies;

pub use agent::{AgentRegistration, PairingAgent};

/// Well-known bus name of the Bluetooth daemon.
pub const BLUEZ_SERVICE: &str = "org.bluez";

/// Object path carrying `AgentManager1`.
pub const BLUEZ_MANAGER_PATH: &str = "/org/bluez";

pub const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";
pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";

/// BlueZ error text for the RF-timing race where the local controller
/// aborts a LE connection right after a scan. Transient; retried.
pub const LE_ABORT_BY_LOCAL: &str = "le-connection-abort-by-local";

/// Error name returned for `Connect` on an already connected device.
pub const ERR_ALREADY_CONNECTED: &str = "org.bluez.Error.AlreadyConnected";

/// Error name returned for `RemoveDevice` on an unknown device.
pub const ERR_DOES_NOT_EXIST: &str = "org.bluez.Error.DoesNotExist";

/// The D-Bus error name of a method reply, if the error carries one.
pub fn error_name(err: &zbus::Error) -> Option<&str> {
    match err {
        zbus::Error::MethodError(name, _, _) => Some(name.as_str()),
        _ => None,
    }
}

/// True when a connect failure is the transient local-abort race
/// rather than a real rejection.
pub fn is_le_abort(error_text: &str) -> bool {
    error_text.contains(LE_ABORT_BY_LOCAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn le_abort_is_detected_inside_the_error_text() {
        assert!(is_le_abort(
            "Pairing failed: Connect failed: le-connection-abort-by-local"
        ));
        assert!(!is_le_abort("br-connection-profile-unavailable"));
        assert!(!is_le_abort("Authentication Failed"));
    }
}
