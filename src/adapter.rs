//! Adapter controller: locates the first usable adapter and brings it
//! into a powered, pairable state.
//!
//! Every `ensure_*` operation is idempotent; when the precondition
//! already holds the bus is left untouched beyond the property read.

use tracing::{debug, info};
use zbus::proxy::CacheProperties;
use zbus::zvariant::OwnedObjectPath;

use crate::bluez::proxies::{Adapter1Proxy, BluezObjectManagerProxy};
use crate::bluez::ADAPTER_INTERFACE;
use crate::bus::BusSession;
use crate::error::{classify, Error};
use crate::output::Reporter;

pub struct AdapterController<'a> {
    report: &'a Reporter,
    proxy: Adapter1Proxy<'static>,
    path: OwnedObjectPath,
}

impl<'a> AdapterController<'a> {
    /// Enumerates the daemon's managed objects and takes the first path
    /// exposing `Adapter1` (lowest path first, so `hci0` wins when
    /// several adapters are present).
    pub async fn locate(session: &'a BusSession, report: &'a Reporter) -> Result<Self, Error> {
        let om = BluezObjectManagerProxy::new(session.connection())
            .await
            .map_err(|e| classify(e, "ObjectManager proxy failed", Error::Adapter))?;
        let objects = om
            .get_managed_objects()
            .await
            .map_err(|e| classify(e, "GetManagedObjects failed", Error::Adapter))?;

        let mut adapters: Vec<OwnedObjectPath> = objects
            .into_iter()
            .filter(|(_, interfaces)| interfaces.contains_key(ADAPTER_INTERFACE))
            .map(|(path, _)| path)
            .collect();
        adapters.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        let path = adapters.into_iter().next().ok_or_else(|| {
            Error::Adapter("no Bluetooth adapter found. Is bluetoothd running?".into())
        })?;
        debug!(%path, "adapter located");

        let proxy = Adapter1Proxy::builder(session.connection())
            .path(path.to_string())
            .map_err(|e| classify(e, "adapter proxy path invalid", Error::Adapter))?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(|e| classify(e, "Adapter1 proxy failed", Error::Adapter))?;

        Ok(Self { report, proxy, path })
    }

    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    pub fn proxy(&self) -> &Adapter1Proxy<'static> {
        &self.proxy
    }

    /// Short name of the adapter, e.g. `hci0`.
    pub fn name(&self) -> &str {
        self.path.as_str().rsplit('/').next().unwrap_or("adapter")
    }

    /// Powers the adapter on if needed and confirms the write stuck.
    pub async fn ensure_powered(&self) -> Result<(), Error> {
        let powered = self
            .proxy
            .powered()
            .await
            .map_err(|e| classify(e, "Powered read failed", Error::Adapter))?;
        if powered {
            self.report.verbose("adapter already powered");
            return Ok(());
        }
        self.report.verbose("powering on adapter");
        self.proxy
            .set_powered(true)
            .await
            .map_err(|e| classify(e, "Powered write failed", Error::Adapter))?;
        let confirmed = self
            .proxy
            .powered()
            .await
            .map_err(|e| classify(e, "Powered re-read failed", Error::Adapter))?;
        if !confirmed {
            return Err(Error::Adapter(format!(
                "adapter {} did not power on",
                self.name()
            )));
        }
        info!(adapter = self.name(), "adapter powered on");
        Ok(())
    }

    /// Same contract as [`ensure_powered`](Self::ensure_powered) for the
    /// `Pairable` flag.
    pub async fn ensure_pairable(&self) -> Result<(), Error> {
        let pairable = self
            .proxy
            .pairable()
            .await
            .map_err(|e| classify(e, "Pairable read failed", Error::Adapter))?;
        if pairable {
            self.report.verbose("adapter already pairable");
            return Ok(());
        }
        self.report.verbose("enabling pairable mode");
        self.proxy
            .set_pairable(true)
            .await
            .map_err(|e| classify(e, "Pairable write failed", Error::Adapter))?;
        let confirmed = self
            .proxy
            .pairable()
            .await
            .map_err(|e| classify(e, "Pairable re-read failed", Error::Adapter))?;
        if !confirmed {
            return Err(Error::Adapter(format!(
                "adapter {} did not become pairable",
                self.name()
            )));
        }
        info!(adapter = self.name(), "adapter set to pairable");
        Ok(())
    }

    /// One-line adapter status for the header, e.g. `hci0 (powered, pairable)`.
    pub async fn summary(&self) -> Result<String, Error> {
        let powered = self
            .proxy
            .powered()
            .await
            .map_err(|e| classify(e, "Powered read failed", Error::Adapter))?;
        let pairable = self
            .proxy
            .pairable()
            .await
            .map_err(|e| classify(e, "Pairable read failed", Error::Adapter))?;
        let mut flags = Vec::new();
        if powered {
            flags.push("powered");
        }
        if pairable {
            flags.push("pairable");
        }
        let flags = if flags.is_empty() {
            "inactive".to_string()
        } else {
            flags.join(", ")
        };
        Ok(format!("{} ({})", self.name(), flags))
    }

    /// Daemon version, informational only. BlueZ publishes no version
    /// property on the bus, so this asks the CLI that ships with it and
    /// degrades to `unknown`.
    pub async fn daemon_version(&self) -> String {
        match tokio::process::Command::new("bluetoothctl")
            .arg("--version")
            .output()
            .await
        {
            Ok(out) => parse_version_line(&String::from_utf8_lossy(&out.stdout)),
            Err(e) => {
                debug!("bluetoothctl probe failed: {e}");
                "unknown".to_string()
            }
        }
    }
}

/// Extracts the version from `bluetoothctl: 5.82` style output.
fn parse_version_line(line: &str) -> String {
    let line = line.trim();
    let version = match line.rsplit_once(':') {
        Some((_, v)) => v.trim(),
        None => line,
    };
    if version.is_empty() {
        "unknown".to_string()
    } else {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bluetoothctl_output() {
        assert_eq!(parse_version_line("bluetoothctl: 5.82\n"), "5.82");
        assert_eq!(parse_version_line("5.66"), "5.66");
        assert_eq!(parse_version_line(""), "unknown");
        assert_eq!(parse_version_line("bluetoothctl:"), "unknown");
    }
}
