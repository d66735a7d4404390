//! crates/timetable_core/src/error.rs
//!
//! The error taxonomy every engine operation reports in.

use crate::codec::CodecError;
use crate::domain::{ExamKind, SectionType, SlotKey};
use crate::ports::PortError;

/// The expected, user-facing reasons a request is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictKind {
    #[error("section clashes with {course_code} at {slot}")]
    ClassHourClash { course_code: String, slot: SlotKey },

    #[error("course's exam clashes with {course_code}'s {exam}")]
    ExamHourClash { course_code: String, exam: ExamKind },

    #[error("can't have multiple sections of type {section_type} for {course_code}")]
    DuplicateSectionType {
        course_code: String,
        section_type: SectionType,
    },

    #[error("course {0} is archived")]
    CourseArchived(String),

    #[error("timetable is archived")]
    TimetableArchived,

    #[error("timetable is not a draft")]
    NotDraft,

    #[error("archived timetable can not be a draft")]
    ArchivedToDraft,

    #[error("cannot publish empty timetable")]
    PublishEmpty,

    #[error("cannot publish timetable with warnings")]
    PublishWithWarnings,

    #[error("timetable is archived. cannot copy old timetables")]
    CopyArchived,

    #[error("timetable was modified concurrently, reload and try again")]
    ConcurrentModification,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("user does not own timetable")]
    Forbidden,

    #[error(transparent)]
    Conflict(#[from] ConflictKind),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Search index error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A convenience type alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<PortError> for EngineError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => EngineError::NotFound(what),
            PortError::Conflict(_) => EngineError::Conflict(ConflictKind::ConcurrentModification),
            PortError::Unauthorized => EngineError::Forbidden,
            PortError::Unexpected(msg) => EngineError::Internal(msg),
        }
    }
}

// Catalog or stored data that does not decode is our fault, not the caller's.
impl From<CodecError> for EngineError {
    fn from(err: CodecError) -> Self {
        EngineError::Internal(err.to_string())
    }
}
