//! One invocation: lock, connect, prepare the sheets, process a tag, sweep.

use std::io::{self, BufRead, Write};

use chrono::{Local, NaiveDateTime};
use tracing::{error, info, warn};

use crate::attendance::ScanError;
use crate::attendance::policy::AttendancePolicy;
use crate::attendance::processor::{ScanProcessor, ScanReport, Transition};
use crate::attendance::sweeper::{self, SweepReport};
use crate::config::Config;
use crate::db::init_db;
use crate::error::AppError;
use crate::lock::InstanceLock;
use crate::sheets::GoogleSheets;
use crate::sheets::Spreadsheet;
use crate::sheets::projector::SheetProjector;
use crate::store::{AttendanceStore, MySqlStore};

const PROMPT: &str = "Enter the RFID Tag ID: ";

#[derive(Debug)]
pub enum RunOutcome {
    /// `exit` was entered; the sheets were prepared and nothing else happened.
    Exited,
    Processed {
        scan: Result<ScanReport, ScanError>,
        sweep: SweepReport,
    },
}

/// The tag from the command line, or prompted for on stdin. Called before the lock is
/// taken so an operator at the prompt never holds it.
pub fn read_tag(arg: Option<String>) -> Result<String, AppError> {
    let raw = match arg {
        Some(tag) => tag,
        None => prompt_tag()
            .map_err(|e| AppError::Usage(format!("cannot read tag from stdin: {e}")))?,
    };
    normalize_tag(&raw)
}

fn normalize_tag(raw: &str) -> Result<String, AppError> {
    let tag = raw.trim();
    if tag.is_empty() {
        return Err(AppError::Usage("no RFID tag given".to_string()));
    }
    Ok(tag.to_string())
}

pub async fn run(config: &Config, tag: &str) -> Result<RunOutcome, AppError> {
    let _lock = InstanceLock::acquire(&config.lock_file)?;
    let pool = init_db(config).await?;

    let store = MySqlStore::new(pool.clone(), config.retry.clone());
    let sheets = GoogleSheets::connect(
        &config.sheet_id,
        &config.credentials_path,
        config.retry.clone(),
    );
    let result = match sheets {
        Ok(sheets) => {
            let now = Local::now().naive_local();
            run_session(&store, &sheets, &config.policy, tag, now).await
        }
        Err(e) => Err(e.into()),
    };

    pool.close().await;
    info!("Database connection closed");
    result
}

/// Everything after the collaborators are connected, in run order.
pub async fn run_session(
    store: &dyn AttendanceStore,
    sheets: &dyn Spreadsheet,
    policy: &AttendancePolicy,
    tag: &str,
    now: NaiveDateTime,
) -> Result<RunOutcome, AppError> {
    let roster = store.staff_roster().await?;
    info!(count = roster.len(), "Loaded staff roster");
    let projector = SheetProjector::initialize(sheets, &roster, now.date()).await?;
    let session = projector.session();
    info!(monthly = %session.monthly.title, daily = %session.daily.title, "Sheets ready");

    if tag.eq_ignore_ascii_case("exit") {
        info!("Exit requested, stopping after sheet setup");
        return Ok(RunOutcome::Exited);
    }

    let mut processor = ScanProcessor::new(store, &projector, policy);
    let scan = processor.process(tag, now).await;
    log_scan(tag, &scan);

    let sweep = sweeper::sweep(store, &projector, policy, now).await;
    if !sweep.committed {
        warn!("End-of-day sweep did not commit, open records remain");
    } else if sweep.closed > 0 {
        info!(closed = sweep.closed, projected = sweep.projected, "End-of-day sweep finished");
    }

    Ok(RunOutcome::Processed { scan, sweep })
}

fn prompt_tag() -> io::Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(PROMPT.as_bytes())?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

fn log_scan(tag_id: &str, scan: &Result<ScanReport, ScanError>) {
    match scan {
        Ok(report) => {
            let direction = match report.transition {
                Transition::SignedIn { .. } => "IN",
                Transition::SignedOut => "OUT",
            };
            info!(
                tag_id,
                name = %report.identity.name,
                direction,
                onsite_id = report.record_id,
                "Scan processed"
            );
            if !report.projected {
                warn!(tag_id, "Ledger updated but sheets are out of date");
            }
        }
        Err(ScanError::Persistence(e)) => error!(tag_id, error = %e, "Scan failed"),
        Err(e) => warn!(tag_id, reason = %e, "Scan rejected"),
    }
}
