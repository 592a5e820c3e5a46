//! The transient pairing agent exported back at the Bluetooth daemon.
//!
//! During `Device1.Pair` the daemon turns around and calls into an
//! `org.bluez.Agent1` object we serve on the bus, asking for the PIN
//! (as a legacy string or a BLE SMP passkey) and for authorization
//! decisions. The agent lives only as long as one pair attempt:
//! [`AgentRegistration::register`] exports and registers it,
//! [`AgentRegistration::release`] unregisters and unexports it, and
//! the device controller runs the release on every exit path.
//!
//! The PIN held here is never written to any stream or log.

use tracing::debug;
use zbus::zvariant::{ObjectPath, OwnedObjectPath};
use zbus::{interface, Connection, DBusError};

use crate::error::{classify, Error};

/// Object path the agent is exported at, under this process's bus name.
pub const AGENT_PATH: &str = "/org/bluez/agent/blebond";

/// Capability announced to the agent manager. `KeyboardDisplay` covers
/// both passkey entry and numeric comparison.
pub const AGENT_CAPABILITY: &str = "KeyboardDisplay";

/// Errors an agent callback may return to the daemon, named per the
/// BlueZ agent API (`org.bluez.Error.*`).
#[derive(Debug, DBusError)]
#[zbus(prefix = "org.bluez.Error")]
pub enum AgentError {
    #[zbus(error)]
    ZBus(zbus::Error),
    Rejected(String),
    Canceled(String),
}

/// Decodes a decimal PIN into the u32 passkey BLE SMP expects.
pub fn decode_passkey(pin: &str) -> Option<u32> {
    pin.parse().ok()
}

/// `org.bluez.Agent1` implementation answering with a static PIN.
pub struct PairingAgent {
    pin: String,
}

impl PairingAgent {
    pub fn new(pin: String) -> Self {
        Self { pin }
    }
}

#[interface(name = "org.bluez.Agent1")]
impl PairingAgent {
    /// Legacy BR/EDR PIN entry.
    async fn request_pin_code(&self, device: OwnedObjectPath) -> Result<String, AgentError> {
        debug!(device = %device, "PIN code requested");
        Ok(self.pin.clone())
    }

    /// BLE SMP passkey entry.
    async fn request_passkey(&self, device: OwnedObjectPath) -> Result<u32, AgentError> {
        debug!(device = %device, "passkey requested");
        decode_passkey(&self.pin)
            .ok_or_else(|| AgentError::Rejected("configured PIN is not a decimal passkey".into()))
    }

    /// Informational only; the value is not echoed anywhere.
    async fn display_passkey(&self, device: OwnedObjectPath, _passkey: u32, entered: u16) {
        debug!(device = %device, entered, "daemon displayed a passkey");
    }

    /// Numeric comparison. Auto-accepted; the peer was pre-selected by
    /// MAC on the command line.
    async fn request_confirmation(
        &self,
        device: OwnedObjectPath,
        _passkey: u32,
    ) -> Result<(), AgentError> {
        debug!(device = %device, "auto-confirming numeric comparison");
        Ok(())
    }

    /// Service authorization. Auto-accepted.
    async fn authorize_service(
        &self,
        device: OwnedObjectPath,
        uuid: String,
    ) -> Result<(), AgentError> {
        debug!(device = %device, %uuid, "auto-authorizing service");
        Ok(())
    }

    fn release(&self) {
        debug!("agent released by the daemon");
    }

    fn cancel(&self) {
        debug!("agent request canceled by the daemon");
    }
}

fn agent_path() -> ObjectPath<'static> {
    ObjectPath::from_static_str_unchecked(AGENT_PATH)
}

/// A live registration with the daemon's agent manager.
///
/// Holds the exported object and the manager proxy; dropping it without
/// calling [`release`](Self::release) would leak the registration, so the
/// device controller treats release as mandatory on success and failure
/// alike.
pub struct AgentRegistration {
    conn: Connection,
    manager: super::proxies::AgentManager1Proxy<'static>,
}

impl AgentRegistration {
    /// Exports the agent at [`AGENT_PATH`] and registers it with
    /// `AgentManager1`. On registration failure the object is unexported
    /// again before the error is returned.
    pub async fn register(conn: &Connection, pin: &str) -> Result<Self, Error> {
        conn.object_server()
            .at(AGENT_PATH, PairingAgent::new(pin.to_string()))
            .await
            .map_err(|e| classify(e, "agent export failed", Error::Pairing))?;

        let manager = super::proxies::AgentManager1Proxy::new(conn)
            .await
            .map_err(|e| classify(e, "AgentManager1 proxy failed", Error::Pairing))?;

        if let Err(e) = manager.register_agent(&agent_path(), AGENT_CAPABILITY).await {
            let _ = conn.object_server().remove::<PairingAgent, _>(AGENT_PATH).await;
            return Err(classify(e, "RegisterAgent failed", Error::Pairing));
        }

        debug!(path = AGENT_PATH, capability = AGENT_CAPABILITY, "agent registered");
        Ok(Self {
            conn: conn.clone(),
            manager,
        })
    }

    /// Unregisters and unexports the agent. Failures are logged and
    /// swallowed: the daemon drops registrations of a vanished client
    /// on its own, and release must not mask the pair outcome.
    pub async fn release(self) {
        if let Err(e) = self.manager.unregister_agent(&agent_path()).await {
            debug!("UnregisterAgent failed (agent may already be gone): {e}");
        }
        if let Err(e) = self
            .conn
            .object_server()
            .remove::<PairingAgent, _>(AGENT_PATH)
            .await
        {
            debug!("agent unexport failed: {e}");
        }
        debug!("agent released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_six_digit_pin() {
        assert_eq!(decode_passkey("123456"), Some(123_456));
    }

    #[test]
    fn leading_zeros_decode_numerically() {
        assert_eq!(decode_passkey("000042"), Some(42));
    }

    #[test]
    fn rejects_non_decimal_pins() {
        assert_eq!(decode_passkey("12a456"), None);
        assert_eq!(decode_passkey(""), None);
        assert_eq!(decode_passkey("12 34"), None);
    }

    #[test]
    fn agent_path_is_a_valid_object_path() {
        assert!(ObjectPath::try_from(AGENT_PATH).is_ok());
    }
}
