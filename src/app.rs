//! The orchestrator: one straight-line pass through the bond state
//! machine.
//!
//! adapter bring-up → existence check → probe verify → (remove and
//! re-pair when stale) → trust. Every step is idempotent, so re-running
//! after a partial success converges without extra side effects. This
//! module is also the only place where an error kind or outcome becomes
//! a process exit code.

use std::cell::{Cell, RefCell};

use tracing::debug;
use zbus::proxy::CacheProperties;
use zbus::zvariant::{ObjectPath, OwnedObjectPath};
use zbus::Connection;

use crate::adapter::AdapterController;
use crate::bluez::agent::{PairingAgent, AGENT_PATH};
use crate::bluez::proxies::{Adapter1Proxy, AgentManager1Proxy};
use crate::bus::BusSession;
use crate::config::{Config, Tunables};
use crate::device::{BondStatus, DeviceController};
use crate::discovery::Discovery;
use crate::error::{Error, ExitCode};
use crate::output::Reporter;
use crate::pin::PinSource;

/// Terminal states of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// An existing bond survived the probe connect.
    Verified,
    /// A fresh bond was established.
    Paired,
    /// `--force-repair` dropped the old bond and paired again.
    Repaired,
    /// `--check-only` and no valid bond present.
    NoBond,
}

impl Outcome {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Outcome::NoBond => ExitCode::NoBond,
            _ => ExitCode::Ok,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Outcome::Verified => "Bond verified \u{2014} ready to connect",
            Outcome::Paired => "Bond established \u{2014} ready to connect",
            Outcome::Repaired => "Re-paired \u{2014} ready to connect",
            Outcome::NoBond => "No valid bond present",
        }
    }
}

/// Which stage of the run is in progress, for picking the exit code
/// after an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Setup,
    Bond,
}

/// Bus-side state that must be unwound when the run is cut short.
///
/// Discovery and the pairing agent flip their flags here; on SIGINT the
/// orchestrator replays the balancing calls (`StopDiscovery`,
/// `UnregisterAgent`, unexport) so the daemon is left clean.
pub struct Teardown {
    conn: RefCell<Option<Connection>>,
    adapter_path: RefCell<Option<OwnedObjectPath>>,
    discovering: Cell<bool>,
    agent: Cell<bool>,
    phase: Cell<Phase>,
}

impl Teardown {
    fn new() -> Self {
        Self {
            conn: RefCell::new(None),
            adapter_path: RefCell::new(None),
            discovering: Cell::new(false),
            agent: Cell::new(false),
            phase: Cell::new(Phase::Setup),
        }
    }

    fn attach(&self, conn: Connection) {
        *self.conn.borrow_mut() = Some(conn);
    }

    fn adapter_located(&self, path: OwnedObjectPath) {
        *self.adapter_path.borrow_mut() = Some(path);
    }

    fn bond_phase(&self) {
        self.phase.set(Phase::Bond);
    }

    pub fn discovery_active(&self, active: bool) {
        self.discovering.set(active);
    }

    pub fn agent_registered(&self, registered: bool) {
        self.agent.set(registered);
    }

    fn exit_code(&self) -> ExitCode {
        match self.phase.get() {
            Phase::Setup => ExitCode::AdapterError,
            Phase::Bond => ExitCode::PairingFailed,
        }
    }

    async fn unwind(&self) {
        let conn = self.conn.borrow().clone();
        let Some(conn) = conn else { return };

        if self.agent.get() {
            if let Ok(manager) = AgentManager1Proxy::new(&conn).await {
                if let Err(e) = manager
                    .unregister_agent(&ObjectPath::from_static_str_unchecked(AGENT_PATH))
                    .await
                {
                    debug!("UnregisterAgent during unwind failed: {e}");
                }
            }
            let _ = conn
                .object_server()
                .remove::<PairingAgent, _>(AGENT_PATH)
                .await;
            self.agent.set(false);
        }

        if self.discovering.get() {
            let adapter_path = self.adapter_path.borrow().clone();
            if let Some(path) = adapter_path {
                if let Ok(builder) = Adapter1Proxy::builder(&conn).path(path.to_string()) {
                    if let Ok(adapter) = builder.cache_properties(CacheProperties::No).build().await
                    {
                        if let Err(e) = adapter.stop_discovery().await {
                            debug!("StopDiscovery during unwind failed: {e}");
                        }
                    }
                }
            }
            self.discovering.set(false);
        }
    }
}

/// One bond-management run.
pub struct App {
    config: Config,
    tunables: Tunables,
    pin_source: Box<dyn PinSource>,
    report: Reporter,
    teardown: Teardown,
}

impl App {
    pub fn new(config: Config, pin_source: Box<dyn PinSource>) -> Self {
        let report = Reporter::new(config.verbose);
        Self {
            config,
            tunables: Tunables::default(),
            pin_source,
            report,
            teardown: Teardown::new(),
        }
    }

    /// Runs the flow to completion and maps the result onto the exit
    /// code contract. The `Result:` line is always the last thing on
    /// stdout, for success and failure alike.
    pub async fn run(&self) -> ExitCode {
        match self.execute().await {
            Ok(outcome) => {
                self.report.result(outcome.message());
                outcome.exit_code()
            }
            Err(err) => {
                self.report.result_failure(err.headline());
                self.report.error(&err.to_string());
                err.exit_code()
            }
        }
    }

    /// SIGINT handler: balance whatever bus state the aborted run left
    /// behind, then exit with the code of the interrupted stage.
    pub async fn interrupted(&self) -> ExitCode {
        self.report.error("interrupted, unwinding bus state");
        self.teardown.unwind().await;
        self.report.result_failure("interrupted");
        self.teardown.exit_code()
    }

    async fn execute(&self) -> Result<Outcome, Error> {
        let session = BusSession::open().await?;
        self.teardown.attach(session.connection().clone());

        let adapter = AdapterController::locate(&session, &self.report).await?;
        self.teardown.adapter_located(adapter.path().clone());

        let version = adapter.daemon_version().await;
        let summary = adapter.summary().await?;
        self.report
            .header(&version, &summary, self.config.mac.as_str());

        adapter.ensure_powered().await?;
        adapter.ensure_pairable().await?;
        self.teardown.bond_phase();

        let device = DeviceController::new(
            &session,
            adapter.proxy(),
            adapter.path(),
            &self.config.mac,
            &self.report,
            &self.tunables,
        )?;

        if self.config.force_repair {
            self.report.field("Mode", "force-repair");
            device.remove_if_exists().await?;
            self.report.field("Cleanup", "removed existing bond");
            self.pair_flow(&session, &adapter, &device).await?;
            return Ok(Outcome::Repaired);
        }

        if device.exists().await? {
            if device.is_paired().await {
                self.report.field("Bond", &device.bond_summary().await);
                self.report.field("Verify", "testing connection...");
                match device.verify().await? {
                    BondStatus::Valid => {
                        self.report.field("Verify", "test connect OK");
                        device.trust().await?;
                        return Ok(Outcome::Verified);
                    }
                    BondStatus::Invalid => {
                        self.report
                            .field("Verify", "test connect FAILED \u{2014} bond is invalid");
                        if self.config.check_only {
                            // Check-only never mutates daemon state; the
                            // stale bond is reported, not repaired.
                            return Ok(Outcome::NoBond);
                        }
                        self.report.field("Cleanup", "removed invalid bond");
                        device.remove().await?;
                    }
                }
            } else {
                self.report.field("Bond", "found (not paired)");
                if self.config.check_only {
                    return Ok(Outcome::NoBond);
                }
                // Half-known cache entry; drop it so the scan starts clean.
                device.remove().await?;
                self.report.verbose("removed stale device entry for a clean scan");
            }
        } else {
            self.report
                .field("Bond", "not found \u{2014} pairing required");
            if self.config.check_only {
                return Ok(Outcome::NoBond);
            }
        }

        self.pair_flow(&session, &adapter, &device).await?;
        Ok(Outcome::Paired)
    }

    /// Discovery, pairing, and trust for a device with no usable bond.
    async fn pair_flow(
        &self,
        session: &BusSession,
        adapter: &AdapterController<'_>,
        device: &DeviceController<'_>,
    ) -> Result<(), Error> {
        let pin = self.pin_source.obtain().await?;
        let discovery = Discovery::new(
            session,
            adapter.proxy(),
            &self.config.mac,
            device.path(),
            &self.report,
            &self.tunables,
        );
        discovery.discover(&self.teardown).await?;
        device.pair(&pin, &self.teardown).await?;
        device.trust().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_map_onto_the_exit_contract() {
        assert_eq!(Outcome::Verified.exit_code(), ExitCode::Ok);
        assert_eq!(Outcome::Paired.exit_code(), ExitCode::Ok);
        assert_eq!(Outcome::Repaired.exit_code(), ExitCode::Ok);
        assert_eq!(Outcome::NoBond.exit_code(), ExitCode::NoBond);
    }

    #[test]
    fn outcome_messages_are_distinct() {
        let messages = [
            Outcome::Verified.message(),
            Outcome::Paired.message(),
            Outcome::Repaired.message(),
            Outcome::NoBond.message(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn interrupt_code_follows_the_phase() {
        let teardown = Teardown::new();
        assert_eq!(teardown.exit_code(), ExitCode::AdapterError);
        teardown.bond_phase();
        assert_eq!(teardown.exit_code(), ExitCode::PairingFailed);
    }

    #[test]
    fn teardown_flags_track_registration_state() {
        let teardown = Teardown::new();
        assert!(!teardown.discovering.get());
        assert!(!teardown.agent.get());
        teardown.discovery_active(true);
        teardown.agent_registered(true);
        assert!(teardown.discovering.get());
        assert!(teardown.agent.get());
        teardown.discovery_active(false);
        teardown.agent_registered(false);
        assert!(!teardown.discovering.get());
        assert!(!teardown.agent.get());
    }
}
