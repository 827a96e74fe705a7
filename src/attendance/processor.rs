use chrono::NaiveDateTime;
use tracing::{error, info, warn};

use super::ScanError;
use super::identity;
use super::policy::{AttendancePolicy, CooldownRegistry};
use crate::model::mark::MonthlyMark;
use crate::model::onsite::DayWindow;
use crate::model::staff::Identity;
use crate::sheets::projector::SheetProjector;
use crate::store::AttendanceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    SignedIn { mark: MonthlyMark },
    SignedOut,
}

#[derive(Debug)]
pub struct ScanReport {
    pub identity: Identity,
    pub transition: Transition,
    pub record_id: u64,
    /// false when the ledger changed but a sheet write failed afterwards
    pub projected: bool,
}

/// Turns accepted scans into ledger transitions and mirrors them onto the sheets.
pub struct ScanProcessor<'a> {
    store: &'a dyn AttendanceStore,
    projector: &'a SheetProjector<'a>,
    policy: &'a AttendancePolicy,
    cooldown: CooldownRegistry,
}

impl<'a> ScanProcessor<'a> {
    pub fn new(
        store: &'a dyn AttendanceStore,
        projector: &'a SheetProjector<'a>,
        policy: &'a AttendancePolicy,
    ) -> Self {
        Self {
            store,
            projector,
            policy,
            cooldown: CooldownRegistry::new(),
        }
    }

    /// Gates run in order: identity, cooldown, time window. A rejected scan changes nothing.
    ///
    /// The current state comes from the latest record for the tag inside today's
    /// window: an active one is closed (sign-out), otherwise a new one is opened
    /// (sign-in). If the ledger write fails the sheets are left alone. If a sheet
    /// write fails after the ledger write, the two stay diverged and the report
    /// says so; nothing is rolled back.
    pub async fn process(&mut self, tag_id: &str, now: NaiveDateTime) -> Result<ScanReport, ScanError> {
        let identity = identity::resolve(self.store, tag_id).await?;

        if let Some(remaining) = self.cooldown.remaining(&identity.name, now, self.policy.cooldown) {
            warn!(name = %identity.name, remaining_secs = remaining.as_secs_f64(), "Scan denied, cooldown active");
            return Err(ScanError::Cooldown {
                name: identity.name,
                remaining,
            });
        }

        let time = now.time();
        if !self.policy.is_within_window(time) {
            warn!(name = %identity.name, at = %time.format("%H:%M"), "Scan denied, outside sign-in window");
            return Err(ScanError::OutsideWindow {
                name: identity.name,
                at: time,
            });
        }

        self.cooldown.record(&identity.name, now);

        let day = DayWindow::for_date(now.date());
        let latest = self.store.latest_record(tag_id, &day).await?;

        let (transition, record_id) = match latest {
            Some(record) if record.active => {
                info!(name = %identity.name, tag_id, "Currently IN, processing sign-out");
                self.store
                    .close_record(record.id, now)
                    .await
                    .inspect_err(|e| error!(error = %e, tag_id, "Sign-out not recorded, sheets not updated"))?;
                (Transition::SignedOut, record.id)
            }
            _ => {
                info!(name = %identity.name, tag_id, "Currently OUT, processing sign-in");
                let id = self
                    .store
                    .open_record(tag_id, now)
                    .await
                    .inspect_err(|e| error!(error = %e, tag_id, "Sign-in not recorded, sheets not updated"))?;
                (
                    Transition::SignedIn {
                        mark: self.policy.sign_in_mark(time),
                    },
                    id,
                )
            }
        };

        let projection = match transition {
            Transition::SignedIn { mark } => {
                self.projector.project_sign_in(&identity.name, mark, now).await
            }
            Transition::SignedOut => self.projector.project_sign_out(&identity.name, now).await,
        };
        let projected = match projection {
            Ok(()) => true,
            Err(e) => {
                error!(
                    error = %e,
                    name = %identity.name,
                    record_id,
                    "Ledger updated but sheet update failed, views now diverge"
                );
                false
            }
        };

        Ok(ScanReport {
            identity,
            transition,
            record_id,
            projected,
        })
    }
}
