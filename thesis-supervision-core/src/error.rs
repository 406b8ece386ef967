use thiserror::Error;

use crate::request::RequestStatus;
use crate::{Department, RequestId, SlotId, StudentId, TeacherId, TopicId};

/// Every failure the engine reports to callers.
///
/// Validation problems and business-rule conflicts are separate variants so
/// the caller can render different messaging; concurrency losers get the
/// same business-rule variants as everyone else, never a lock error.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    #[error("invalid stream code: {code}")]
    InvalidStreamCode { code: String },

    #[error("invalid academic year: {value}")]
    InvalidAcademicYear { value: String },

    #[error("invalid semester config: {reason}")]
    InvalidSemesterConfig { reason: String },

    #[error("no semester configured for department {department}, year {academic_year}")]
    SemesterNotConfigured {
        department: Department,
        academic_year: String,
    },

    #[error("the submission deadline for this semester has passed")]
    DeadlinePassed,

    #[error("no available slot for teacher {teacher} in stream {stream}")]
    NoAvailableSlot { teacher: TeacherId, stream: String },

    #[error("slot {slot} capacity exceeded: {occupied} active of {quota}")]
    CapacityExceeded {
        slot: SlotId,
        occupied: u32,
        quota: u32,
    },

    #[error("topic {topic} is already occupied or deleted")]
    TopicAlreadyOccupied { topic: TopicId },

    #[error("topic of request {request} is locked and can no longer be changed")]
    TopicLocked { request: RequestId },

    #[error("the cancellation window for this semester has closed")]
    CancellationLocked,

    #[error("completing requests is not yet allowed in this semester")]
    CompletionNotAllowed,

    #[error("request {request} has no archivable files, refusing to complete")]
    NoArchivableFiles { request: RequestId },

    #[error("student {student} already has an active request")]
    ActiveRequestExists { student: StudentId },

    #[error("request {id} cannot go from {from} to {to}")]
    InvalidTransition {
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("request {0} not found")]
    RequestNotFound(RequestId),

    #[error("topic {0} not found")]
    TopicNotFound(TopicId),

    #[error("slot {0} not found")]
    SlotNotFound(SlotId),

    #[error("stream {0} not registered")]
    StreamNotFound(String),

    #[error("teacher {0} not found")]
    TeacherNotFound(TeacherId),

    #[error("student {0} not found")]
    StudentNotFound(StudentId),

    #[error("snapshot io error: {0}")]
    SnapshotIo(#[from] std::io::Error),

    #[error("snapshot decode error: {0}")]
    SnapshotDecode(#[from] serde_json::Error),
}
