use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

mod app;
mod attendance;
mod config;
mod db;
mod error;
mod lock;
mod logging;
mod model;
mod retry;
mod sheets;
mod store;
#[cfg(test)]
mod testing;

use config::Config;
use error::AppError;

/// Records one RFID badge scan and keeps the attendance sheets in step.
#[derive(Parser, Debug)]
#[command(name = "rfid-attendance", version, about)]
struct Cli {
    /// Tag ID read from the badge. Prompted for when omitted; `exit` only prepares the sheets.
    tag: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let _guard = match logging::init(&config) {
        Ok(guard) => guard,
        Err(e) => {
            let e = AppError::Logging(format!("{e:#}"));
            eprintln!("{e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let tag = match app::read_tag(cli.tag) {
        Ok(tag) => tag,
        Err(e) => {
            error!(code = e.code(), error = %e, "No usable tag, nothing to do");
            return ExitCode::from(e.exit_code());
        }
    };

    info!(tag_id = %tag, "Attendance run starting");
    match app::run(&config, &tag).await {
        Ok(app::RunOutcome::Exited) => {
            info!("Exited on request");
            ExitCode::SUCCESS
        }
        Ok(app::RunOutcome::Processed { scan, sweep }) => {
            info!(accepted = scan.is_ok(), swept = sweep.closed, "Attendance run finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(code = e.code(), error = %e, "Attendance run failed");
            ExitCode::from(e.exit_code())
        }
    }
}
