//! System bus session.
//!
//! One connection is opened per run and owned here; every other
//! component borrows it. Open failures are split per the contract:
//! an access-denied reply means the caller lacks bus policy for this
//! tool, anything else (no socket, daemon down) is reported as an
//! adapter-level problem.

use tracing::debug;
use zbus::Connection;

use crate::error::{is_access_denied, Error};

/// Owner of the D-Bus system connection for one run.
pub struct BusSession {
    conn: Connection,
}

impl BusSession {
    /// Connects to the system message bus.
    pub async fn open() -> Result<Self, Error> {
        debug!("connecting to the D-Bus system bus");
        match Connection::system().await {
            Ok(conn) => {
                debug!(unique_name = ?conn.unique_name(), "system bus connected");
                Ok(Self { conn })
            }
            Err(e) if is_access_denied(&e) => Err(Error::Permission(format!(
                "cannot connect to the system bus: {e}. \
                 Are you root or in the bluetooth group?"
            ))),
            Err(e) => Err(Error::Adapter(format!(
                "cannot reach the system bus: {e}"
            ))),
        }
    }

    /// The underlying connection. Borrow only; the session owns it.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
