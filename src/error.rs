//! Error taxonomy and exit-code mapping.
//!
//! Components fail fast with one of the kinds below; the orchestrator in
//! [`crate::app`] is the sole place where a kind becomes a process exit
//! code. Classification from raw `zbus` errors happens at the bus boundary
//! via [`classify`], so an `AccessDenied` reply surfaces as a permission
//! error no matter which call produced it.

use thiserror::Error;
use zbus::fdo;

/// Failure kinds for a bond-management run.
#[derive(Error, Debug)]
pub enum Error {
    /// No access to the system bus or to a privileged BlueZ method.
    #[error("D-Bus permission denied: {0}")]
    Permission(String),

    /// Adapter missing, or refuses to become powered/pairable.
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// The target never advertised within the discovery bound.
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Connect or pair failed for a reason other than a stale bond.
    #[error("Pairing failed: {0}")]
    Pairing(String),

    /// Anything that does not fit the taxonomy above.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Process exit codes, a stable contract for callers (systemd units,
/// scripts) that decide what to do from the code alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Bond verified or established and trusted.
    Ok = 0,
    /// No valid bond present (only reachable with `--check-only`).
    NoBond = 1,
    /// Pairing or discovery failed: wrong PIN, unreachable, or timeout.
    PairingFailed = 2,
    /// Adapter not found or not powerable.
    AdapterError = 3,
    /// Denied access to the system bus.
    DbusPermission = 4,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Error {
    /// The exit code this kind maps to.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::Permission(_) => ExitCode::DbusPermission,
            Error::Adapter(_) => ExitCode::AdapterError,
            Error::Discovery(_) | Error::Pairing(_) | Error::Unexpected(_) => {
                ExitCode::PairingFailed
            }
        }
    }

    /// Short class label for the final `Result:` line.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Permission(_) => "no access to the system bus",
            Error::Adapter(_) => "adapter error",
            Error::Discovery(_) => "discovery failed",
            Error::Pairing(_) => "pairing failed",
            Error::Unexpected(_) => "unexpected error",
        }
    }
}

/// True when a bus error is an `AccessDenied` reply, however zbus
/// chose to represent it.
pub fn is_access_denied(err: &zbus::Error) -> bool {
    match err {
        zbus::Error::FDO(e) => matches!(**e, fdo::Error::AccessDenied(_)),
        zbus::Error::MethodError(name, _, _) => {
            name.as_str() == "org.freedesktop.DBus.Error.AccessDenied"
        }
        _ => false,
    }
}

/// Classifies a bus error: access denials become [`Error::Permission`],
/// everything else goes through `fallback` with the call context attached.
pub fn classify(err: zbus::Error, context: &str, fallback: fn(String) -> Error) -> Error {
    let detail = format!("{context}: {err}");
    if is_access_denied(&err) {
        Error::Permission(detail)
    } else {
        fallback(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(ExitCode::Ok.code(), 0);
        assert_eq!(ExitCode::NoBond.code(), 1);
        assert_eq!(ExitCode::PairingFailed.code(), 2);
        assert_eq!(ExitCode::AdapterError.code(), 3);
        assert_eq!(ExitCode::DbusPermission.code(), 4);
    }

    #[test]
    fn every_error_kind_maps_into_the_contract() {
        let kinds = [
            Error::Permission("x".into()),
            Error::Adapter("x".into()),
            Error::Discovery("x".into()),
            Error::Pairing("x".into()),
            Error::Unexpected("x".into()),
        ];
        for kind in kinds {
            assert!((0..=4).contains(&kind.exit_code().code()));
        }
    }

    #[test]
    fn access_denied_classifies_as_permission() {
        let err = zbus::Error::FDO(Box::new(fdo::Error::AccessDenied("nope".into())));
        let classified = classify(err, "RegisterAgent failed", Error::Pairing);
        assert!(matches!(classified, Error::Permission(_)));
    }

    #[test]
    fn other_errors_take_the_fallback_kind() {
        let err = zbus::Error::InputOutput(std::sync::Arc::new(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no socket",
        )));
        let classified = classify(err, "Connect failed", Error::Pairing);
        assert!(matches!(classified, Error::Pairing(_)));
        assert!(classified.to_string().contains("Connect failed"));
    }

    #[test]
    fn classification_keeps_call_context() {
        let err = zbus::Error::FDO(Box::new(fdo::Error::AccessDenied("nope".into())));
        let classified = classify(err, "Powered write failed", Error::Adapter);
        assert!(classified.to_string().contains("Powered write failed"));
    }
}
