use chrono::NaiveDateTime;
use tracing::{error, info, warn};

use super::policy::AttendancePolicy;
use crate::model::onsite::DayWindow;
use crate::sheets::projector::SheetProjector;
use crate::store::AttendanceStore;

#[derive(Debug, PartialEq, Eq)]
pub struct SweepReport {
    /// Records force-closed in the ledger.
    pub closed: usize,
    /// false when the sweep transaction was rolled back
    pub committed: bool,
    /// false when the daily sheet batch failed after the commit
    pub projected: bool,
}

impl SweepReport {
    fn untouched(committed: bool) -> Self {
        Self {
            closed: 0,
            committed,
            projected: true,
        }
    }
}

/// Past the cutoff, closes every record still active today and marks those people OUT
/// on the daily sheet. The ledger changes commit together or not at all, and the sheet
/// is only written after the commit. The monthly sheet is never touched.
///
/// Failures are logged and reported, never propagated: a rolled-back sweep leaves the
/// run successful and the next run past cutoff tries again.
pub async fn sweep(
    store: &dyn AttendanceStore,
    projector: &SheetProjector<'_>,
    policy: &AttendancePolicy,
    now: NaiveDateTime,
) -> SweepReport {
    if !policy.is_after_cutoff(now.time()) {
        info!("Not past cutoff time, end-of-day sweep skipped");
        return SweepReport::untouched(true);
    }

    info!("Cutoff time passed, signing out everyone still IN");
    let day = DayWindow::for_date(now.date());
    let open = match store.active_records(&day).await {
        Ok(open) => open,
        Err(e) => {
            error!(error = %e, "Could not list open records, end-of-day sweep skipped");
            return SweepReport::untouched(false);
        }
    };
    if open.is_empty() {
        info!("No open records to close");
        return SweepReport::untouched(true);
    }

    let ids: Vec<u64> = open.iter().map(|r| r.id).collect();
    let names: Vec<String> = open
        .iter()
        .filter_map(|r| {
            if r.name.is_none() {
                warn!(tag_id = %r.tag_id, onsite_id = r.id, "No staff name for open record, closing without sheet update");
            }
            r.name.clone()
        })
        .collect();

    if let Err(e) = store.close_records(&ids, now).await {
        error!(error = %e, count = ids.len(), "End-of-day sweep rolled back, sheets not updated");
        return SweepReport::untouched(false);
    }

    let projected = match projector.project_sweep(&names, now).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Ledger swept but daily sheet update failed, views now diverge");
            false
        }
    };

    SweepReport {
        closed: ids.len(),
        committed: true,
        projected,
    }
}
