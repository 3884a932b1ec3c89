// libs/appointment-cell/src/services/lifecycle.rs
use crate::models::AppointmentStatus;

/// Status rules for the appointment lifecycle. The persisted mutations are
/// precondition-qualified updates; this service is the single place the
/// rules are written down, so the booking and review paths build their
/// status filters from it instead of hardcoding stored values.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn can_cancel(&self, status: &AppointmentStatus) -> bool {
        matches!(status, AppointmentStatus::Pending | AppointmentStatus::Paid)
    }

    pub fn can_complete(&self, status: &AppointmentStatus) -> bool {
        *status == AppointmentStatus::Confirmed
    }

    pub fn can_review(&self, status: &AppointmentStatus) -> bool {
        *status == AppointmentStatus::Completed
    }

    /// Statuses a patient-initiated cancel may act on.
    pub fn cancellable_statuses(&self) -> Vec<AppointmentStatus> {
        AppointmentStatus::ALL
            .iter()
            .copied()
            .filter(|s| self.can_cancel(s))
            .collect()
    }

    /// Statuses an appointment must be in before it can be reviewed.
    pub fn reviewable_statuses(&self) -> Vec<AppointmentStatus> {
        AppointmentStatus::ALL
            .iter()
            .copied()
            .filter(|s| self.can_review(s))
            .collect()
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_cannot_cancel() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(!lifecycle.can_cancel(&AppointmentStatus::Confirmed));
        assert!(!lifecycle.can_cancel(&AppointmentStatus::Completed));
        assert!(!lifecycle.can_cancel(&AppointmentStatus::Cancelled));
    }

    #[test]
    fn only_confirmed_completes() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.can_complete(&AppointmentStatus::Confirmed));
        assert!(!lifecycle.can_complete(&AppointmentStatus::Pending));
        assert!(!lifecycle.can_complete(&AppointmentStatus::Paid));
        assert!(!lifecycle.can_complete(&AppointmentStatus::Completed));
    }

    #[test]
    fn paid_remains_cancellable() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.can_cancel(&AppointmentStatus::Paid));
        assert_eq!(
            AppointmentStatus::filter_list(&lifecycle.cancellable_statuses()),
            "pending,paid"
        );
    }

    #[test]
    fn review_only_after_completion() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.can_review(&AppointmentStatus::Completed));
        assert!(!lifecycle.can_review(&AppointmentStatus::Confirmed));
        assert_eq!(
            AppointmentStatus::filter_list(&lifecycle.reviewable_statuses()),
            "completed"
        );
    }
}
