//! PIN acquisition.
//!
//! The orchestrator asks a [`PinSource`] for the PIN only when a pair
//! attempt is actually needed, so a verified bond never prompts. Two
//! sources exist: a pre-supplied value from `--pin` (systemd units,
//! scripts) and an interactive no-echo terminal prompt.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Error;

/// Upper bound on PIN length accepted from either source.
pub const PIN_MAX_LENGTH: usize = 16;

/// Checks that a PIN is usable for static numeric pairing before any
/// bus traffic happens.
pub fn validate_pin(pin: &str) -> Result<(), Error> {
    if pin.is_empty() {
        return Err(Error::Pairing("PIN must not be empty".into()));
    }
    if pin.len() > PIN_MAX_LENGTH {
        return Err(Error::Pairing(format!(
            "PIN longer than {PIN_MAX_LENGTH} digits"
        )));
    }
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Pairing("PIN must contain only decimal digits".into()));
    }
    Ok(())
}

/// Capability producing a PIN for one pair attempt.
#[async_trait]
pub trait PinSource {
    async fn obtain(&self) -> Result<String, Error>;
}

/// Pre-supplied PIN from the `--pin` flag.
pub struct StaticPin {
    pin: String,
}

impl StaticPin {
    pub fn new(pin: String) -> Self {
        Self { pin }
    }
}

#[async_trait]
impl PinSource for StaticPin {
    async fn obtain(&self) -> Result<String, Error> {
        debug!("using pre-supplied PIN");
        validate_pin(&self.pin)?;
        Ok(self.pin.clone())
    }
}

/// Interactive prompt on the controlling terminal, echo suppressed.
pub struct InteractivePin;

impl InteractivePin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InteractivePin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PinSource for InteractivePin {
    async fn obtain(&self) -> Result<String, Error> {
        debug!("prompting for PIN");
        // The prompt blocks on terminal input; run it off the event loop
        // so signal handling stays responsive.
        let pin = tokio::task::spawn_blocking(|| rpassword::prompt_password("Enter PIN: "))
            .await
            .map_err(|e| Error::Unexpected(format!("PIN prompt task failed: {e}")))?
            .map_err(|e| Error::Pairing(format!("failed to read PIN: {e}")))?;
        validate_pin(&pin)?;
        Ok(pin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_returns_its_pin() {
        let source = StaticPin::new("123456".into());
        assert_eq!(source.obtain().await.unwrap(), "123456");
    }

    #[tokio::test]
    async fn static_source_rejects_a_bad_pin() {
        let source = StaticPin::new("12-34".into());
        assert!(source.obtain().await.is_err());
    }

    #[test]
    fn accepts_plain_decimal_pins() {
        assert!(validate_pin("0000").is_ok());
        assert!(validate_pin("123456").is_ok());
        assert!(validate_pin("1").is_ok());
    }

    #[test]
    fn rejects_empty_overlong_and_non_decimal() {
        assert!(validate_pin("").is_err());
        assert!(validate_pin("12345678901234567").is_err());
        assert!(validate_pin("12a4").is_err());
        assert!(validate_pin("12 34").is_err());
        assert!(validate_pin("-1234").is_err());
    }

    #[test]
    fn sixteen_digits_is_the_inclusive_bound() {
        assert!(validate_pin("1234567890123456").is_ok());
    }
}
