//! Job status enum mapping to the `job_statuses` lookup table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

/// Job lifecycle status.
///
/// Variant discriminants match the seed data order (1-based) in the
/// `job_statuses` table. Transitions are strictly forward:
/// `Pending -> Processing -> {Completed, Failed}`; the repository layer
/// guards every transition with a status predicate so nothing else is
/// representable in the database.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending = 1,
    Processing = 2,
    Completed = 3,
    Failed = 4,
}

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Map a database status ID back to the enum.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Processing),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Lowercase status name as exposed by the API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is legal from this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_ids_match_seed_data() {
        assert_eq!(JobStatus::Pending.id(), 1);
        assert_eq!(JobStatus::Processing.id(), 2);
        assert_eq!(JobStatus::Completed.id(), 3);
        assert_eq!(JobStatus::Failed.id(), 4);
    }

    #[test]
    fn from_id_round_trips() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(JobStatus::from_id(0), None);
        assert_eq!(JobStatus::from_id(5), None);
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
