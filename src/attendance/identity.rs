use tracing::{info, warn};

use super::ScanError;
use crate::model::staff::Identity;
use crate::store::AttendanceStore;

/// Maps a scanned tag to a staff member.
///
/// A tag already bound in `sign` must still exist in `Staff`; otherwise the scan is
/// rejected and the binding left for an operator to fix. A tag known only to `Staff`
/// gets its `sign` binding created on this first scan.
pub async fn resolve(store: &dyn AttendanceStore, tag_id: &str) -> Result<Identity, ScanError> {
    if let Some(assignment) = store.assignment_by_tag(tag_id).await? {
        if store.staff_by_tag(tag_id).await?.is_none() {
            warn!(tag_id, "Tag found in sign but not in Staff, data inconsistency");
            return Err(ScanError::InconsistentAssignment(tag_id.to_string()));
        }
        info!(tag_id, name = %assignment.name, "Tag found in sign table");
        return Ok(Identity {
            tag_id: tag_id.to_string(),
            name: assignment.name,
        });
    }

    info!(tag_id, "Tag not in sign table, checking Staff");
    match store.staff_by_tag(tag_id).await? {
        Some(staff) => {
            store.insert_assignment(tag_id, &staff.name).await?;
            info!(tag_id, name = %staff.name, "Added staff member to sign table");
            Ok(Identity {
                tag_id: tag_id.to_string(),
                name: staff.name,
            })
        }
        None => {
            warn!(tag_id, "Tag not found in sign or Staff");
            Err(ScanError::UnknownTag(tag_id.to_string()))
        }
    }
}
