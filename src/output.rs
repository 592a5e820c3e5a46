//! Progress reporting on stdout.
//!
//! The stdout surface is a fixed sequence of aligned `Key: value`
//! lines with `Result:` always last; scripts parse it, so nothing
//! else may be printed there. Errors go to stderr.

use tracing::debug;

/// Width of the label column, including the trailing colon.
const LABEL_WIDTH: usize = 10;

/// Formats one aligned `Key: value` line.
fn format_field(label: &str, value: &str) -> String {
    format!("{:<width$}{}", format!("{label}:"), value, width = LABEL_WIDTH)
}

/// Prints the aligned progress lines and, in verbose mode, per-call
/// diagnostics.
pub struct Reporter {
    verbose: bool,
}

impl Reporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Tool banner plus the environment fields.
    pub fn header(&self, bluez_version: &str, adapter: &str, mac: &str) {
        println!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        self.field("BlueZ", bluez_version);
        self.field("Adapter", adapter);
        self.field("Device", mac);
    }

    pub fn field(&self, label: &str, value: &str) {
        println!("{}", format_field(label, value));
    }

    /// Final line of a successful run.
    pub fn result(&self, message: &str) {
        self.field("Result", &format!("\u{2705} {message}"));
    }

    /// Final line of a failed run; the detail goes to stderr separately.
    pub fn result_failure(&self, message: &str) {
        self.field("Result", &format!("\u{274c} {message}"));
    }

    /// Failure detail on stderr, aligned with the stdout column.
    pub fn error(&self, message: &str) {
        eprintln!("{}", format_field("Error", message));
    }

    /// Diagnostic line, printed only with `--verbose`.
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            println!("  [{message}]");
        }
        debug!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_align_on_the_label_column() {
        assert_eq!(format_field("BlueZ", "5.82"), "BlueZ:    5.82");
        assert_eq!(
            format_field("Device", "AA:BB:CC:DD:EE:FF"),
            "Device:   AA:BB:CC:DD:EE:FF"
        );
        assert_eq!(format_field("Result", "ok"), "Result:   ok");
    }

    #[test]
    fn long_labels_still_render() {
        // Labels longer than the column degrade to a single separator-less
        // overflow rather than truncating.
        assert!(format_field("Verification", "x").starts_with("Verification:"));
    }
}
