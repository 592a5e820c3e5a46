//! Static proxy traits for the BlueZ D-Bus interfaces this tool drives.
//!
//! Generated with the zbus `#[proxy]` macro. The daemon's introspection
//! data is not consulted at any point; every call is an explicit
//! method-call message against a fixed interface name.

use std::collections::HashMap;

use zbus::proxy;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

/// `org.bluez.Adapter1` on an adapter object such as `/org/bluez/hci0`.
#[proxy(
    interface = "org.bluez.Adapter1",
    default_service = "org.bluez",
    gen_blocking = false
)]
pub trait Adapter1 {
    /// Start scanning for nearby devices.
    fn start_discovery(&self) -> zbus::Result<()>;

    /// Stop an ongoing discovery session started by this client.
    fn stop_discovery(&self) -> zbus::Result<()>;

    /// Restrict discovery; `{"Transport": "le"}` keeps the scan BLE-only.
    fn set_discovery_filter(&self, filter: HashMap<&str, Value<'_>>) -> zbus::Result<()>;

    /// Remove a device and its bond from the adapter.
    fn remove_device(&self, device: &ObjectPath<'_>) -> zbus::Result<()>;

    #[zbus(property)]
    fn powered(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn set_powered(&self, powered: bool) -> zbus::Result<()>;

    #[zbus(property)]
    fn pairable(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn set_pairable(&self, pairable: bool) -> zbus::Result<()>;

    #[zbus(property)]
    fn discovering(&self) -> zbus::Result<bool>;
}

/// `org.bluez.Device1` on a device object.
#[proxy(
    interface = "org.bluez.Device1",
    default_service = "org.bluez",
    gen_blocking = false
)]
pub trait Device1 {
    /// Connect the lowest layers; for BLE this brings up the L2CAP link
    /// that SMP pairing runs over.
    fn connect(&self) -> zbus::Result<()>;

    /// Disconnect all profiles and the underlying link.
    fn disconnect(&self) -> zbus::Result<()>;

    /// Run the native pairing handshake. The daemon calls back into the
    /// registered agent while this is in flight.
    fn pair(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn paired(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn trusted(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn set_trusted(&self, trusted: bool) -> zbus::Result<()>;

    #[zbus(property)]
    fn connected(&self) -> zbus::Result<bool>;
}

/// `org.bluez.AgentManager1` at `/org/bluez`.
#[proxy(
    interface = "org.bluez.AgentManager1",
    default_service = "org.bluez",
    default_path = "/org/bluez",
    gen_blocking = false
)]
pub trait AgentManager1 {
    /// Register a pairing agent exported at `agent` with the given
    /// capability string.
    fn register_agent(&self, agent: &ObjectPath<'_>, capability: &str) -> zbus::Result<()>;

    /// Unregister a previously registered agent.
    fn unregister_agent(&self, agent: &ObjectPath<'_>) -> zbus::Result<()>;
}

/// `org.freedesktop.DBus.ObjectManager` on the BlueZ root.
///
/// `GetManagedObjects` is the authoritative existence check for both
/// adapters and devices, keyed by object path.
#[proxy(
    interface = "org.freedesktop.DBus.ObjectManager",
    default_service = "org.bluez",
    default_path = "/",
    gen_blocking = false
)]
pub trait BluezObjectManager {
    /// All managed objects: `{ object_path: { interface: { prop: value } } }`.
    fn get_managed_objects(
        &self,
    ) -> zbus::Result<HashMap<OwnedObjectPath, HashMap<String, HashMap<String, OwnedValue>>>>;

    /// Signal: new interfaces appeared on an object. During discovery a
    /// freshly seen device shows up here with `org.bluez.Device1`.
    #[zbus(signal)]
    fn interfaces_added(
        &self,
        object_path: OwnedObjectPath,
        interfaces: HashMap<String, HashMap<String, OwnedValue>>,
    ) -> zbus::Result<()>;
}
