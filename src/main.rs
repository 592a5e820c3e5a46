use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use blebond::app::App;
use blebond::config::{Config, MacAddress};
use blebond::error::ExitCode;
use blebond::pin::{InteractivePin, PinSource, StaticPin};

/// Exit code for command-line usage errors, kept outside the reserved
/// 0-4 range consumed by callers (EX_USAGE from sysexits).
const EXIT_USAGE: i32 = 64;

#[derive(Parser)]
#[command(
    name = "blebond",
    version,
    about = "Ensures a BLE bond with a peripheral exists before your application starts"
)]
struct Cli {
    /// Target device MAC address (e.g. AA:BB:CC:DD:EE:FF)
    #[arg(value_name = "MAC", value_parser = parse_mac)]
    mac: MacAddress,

    /// PIN code for non-interactive pairing (systemd units, scripts)
    #[arg(long, value_name = "PIN")]
    pin: Option<String>,

    /// Check whether a valid bond exists, without pairing
    #[arg(long)]
    check_only: bool,

    /// Drop any existing bond and pair from scratch
    #[arg(long, conflicts_with = "check_only")]
    force_repair: bool,

    /// Verbose output with per-call diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn parse_mac(s: &str) -> Result<MacAddress, String> {
    s.parse()
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug, default warn.
/// Logs go to stderr so stdout stays the parseable progress surface.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "blebond=debug"
        } else {
            "blebond=warn"
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EXIT_USAGE,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error:    failed to start the async runtime: {e}");
            std::process::exit(ExitCode::AdapterError.code());
        }
    };

    let code = runtime.block_on(run(cli));
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let pin_source: Box<dyn PinSource> = match cli.pin {
        Some(pin) => Box::new(StaticPin::new(pin)),
        None => Box::new(InteractivePin::new()),
    };
    let config = Config {
        mac: cli.mac,
        check_only: cli.check_only,
        force_repair: cli.force_repair,
        verbose: cli.verbose,
    };

    let app = App::new(config, pin_source);
    let code = tokio::select! {
        code = app.run() => code,
        _ = tokio::signal::ctrl_c() => app.interrupted().await,
    };
    code.code()
}
