//! BLE discovery for a device not yet known to the daemon.
//!
//! The `InterfacesAdded` subscription is installed before
//! `StartDiscovery` is issued, so the target cannot slip through
//! between the two; the handler is edge-triggered and ignores signals
//! for unrelated paths or interface sets. Discovery is always balanced
//! with a `StopDiscovery`, and a short settle delay after a successful
//! scan lets the controller release RF state before the next connect
//! (skipping it reproduces the `le-connection-abort-by-local` race).

use std::collections::HashMap;

use futures_util::StreamExt;
use tokio::time::{sleep, timeout};
use tracing::debug;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

use crate::app::Teardown;
use crate::bluez::proxies::{Adapter1Proxy, BluezObjectManagerProxy};
use crate::bluez::DEVICE_INTERFACE;
use crate::bus::BusSession;
use crate::config::{MacAddress, Tunables};
use crate::error::{classify, Error};
use crate::output::Reporter;

/// True when an `InterfacesAdded` signal announces the target device.
fn announces_target(
    added_path: &OwnedObjectPath,
    interfaces: &HashMap<String, HashMap<String, OwnedValue>>,
    target: &OwnedObjectPath,
) -> bool {
    added_path == target && interfaces.contains_key(DEVICE_INTERFACE)
}

pub struct Discovery<'a> {
    session: &'a BusSession,
    adapter: &'a Adapter1Proxy<'static>,
    mac: &'a MacAddress,
    device_path: &'a OwnedObjectPath,
    report: &'a Reporter,
    tunables: &'a Tunables,
}

impl<'a> Discovery<'a> {
    pub fn new(
        session: &'a BusSession,
        adapter: &'a Adapter1Proxy<'static>,
        mac: &'a MacAddress,
        device_path: &'a OwnedObjectPath,
        report: &'a Reporter,
        tunables: &'a Tunables,
    ) -> Self {
        Self {
            session,
            adapter,
            mac,
            device_path,
            report,
            tunables,
        }
    }

    /// Scans until the target appears or the bound expires.
    pub async fn discover(&self, teardown: &Teardown) -> Result<(), Error> {
        let om = BluezObjectManagerProxy::new(self.session.connection())
            .await
            .map_err(|e| classify(e, "ObjectManager proxy failed", Error::Discovery))?;

        // Subscribe first; a signal emitted between StartDiscovery and a
        // later subscription would be lost.
        let mut added = om
            .receive_interfaces_added()
            .await
            .map_err(|e| classify(e, "InterfacesAdded subscription failed", Error::Discovery))?;

        self.report.verbose("setting BLE transport filter");
        let filter = HashMap::from([("Transport", zbus::zvariant::Value::from("le"))]);
        self.adapter
            .set_discovery_filter(filter)
            .await
            .map_err(|e| classify(e, "SetDiscoveryFilter failed", Error::Discovery))?;

        self.report
            .verbose(&format!("starting discovery for {}", self.mac));
        self.adapter
            .start_discovery()
            .await
            .map_err(|e| classify(e, "StartDiscovery failed", Error::Discovery))?;
        teardown.discovery_active(true);

        let found = timeout(self.tunables.discovery_timeout, async {
            while let Some(signal) = added.next().await {
                let Ok(args) = signal.args() else { continue };
                if announces_target(args.object_path(), args.interfaces(), self.device_path) {
                    debug!(path = %self.device_path, "target device appeared");
                    return true;
                }
            }
            false
        })
        .await;

        // Balance StartDiscovery on every path; the daemon reference
        // counts discovery across clients.
        if let Err(e) = self.adapter.stop_discovery().await {
            debug!("StopDiscovery failed (may already be stopped): {e}");
        }
        teardown.discovery_active(false);
        drop(added);

        match found {
            Ok(true) => {
                self.report
                    .verbose("device found, letting the controller settle");
                sleep(self.tunables.settle_delay).await;
                Ok(())
            }
            Ok(false) => Err(Error::Discovery(
                "InterfacesAdded signal stream closed unexpectedly".into(),
            )),
            Err(_) => Err(Error::Discovery(format!(
                "device {} not found within {}s. Is it powered on and advertising?",
                self.mac,
                self.tunables.discovery_timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> OwnedObjectPath {
        OwnedObjectPath::try_from(s.to_string()).unwrap()
    }

    fn with_device1() -> HashMap<String, HashMap<String, OwnedValue>> {
        HashMap::from([(DEVICE_INTERFACE.to_string(), HashMap::new())])
    }

    #[test]
    fn matches_the_target_device() {
        let target = path("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF");
        assert!(announces_target(&target, &with_device1(), &target));
    }

    #[test]
    fn ignores_unrelated_paths() {
        let target = path("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF");
        let other = path("/org/bluez/hci0/dev_11_22_33_44_55_66");
        assert!(!announces_target(&other, &with_device1(), &target));
    }

    #[test]
    fn ignores_signals_without_device1() {
        let target = path("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF");
        let media_only: HashMap<String, HashMap<String, OwnedValue>> =
            HashMap::from([("org.bluez.MediaControl1".to_string(), HashMap::new())]);
        assert!(!announces_target(&target, &media_only, &target));
    }
}
