//! crates/timetable_core/src/ports.rs
//!
//! Defines the service contracts (traits) the timetable engine depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! constraint logic independent of Postgres and of the search service.

use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::{
    Course, CourseWithSections, ExamInterval, MetadataEdit, NewTimetable, Section, SectionType,
    Timetable, TimetableId, TimingEntry, UserProfile, Warning,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A conditional write found the row changed since it was read.
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Write Payloads
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    Attach(Uuid),
    Detach(Uuid),
}

/// Everything one section add or remove persists. A store applies all of it
/// or none of it.
#[derive(Debug, Clone)]
pub struct SectionCommit {
    pub timetable_id: TimetableId,
    /// The version the plan was computed against.
    pub expected_version: i64,
    pub membership: Membership,
    pub timings: Vec<TimingEntry>,
    pub warnings: Vec<Warning>,
    /// `None` leaves the stored exam times untouched.
    pub exam_times: Option<Vec<ExamInterval>>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users & Auth ---
    async fn get_user(&self, user_id: Uuid) -> PortResult<UserProfile>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    // --- Timetables ---
    /// Loads a timetable together with its sections.
    async fn get_timetable(&self, id: TimetableId) -> PortResult<Timetable>;

    /// Inserts the timetable and its section links as one unit.
    async fn insert_timetable(&self, timetable: NewTimetable) -> PortResult<Timetable>;

    /// Applies a section change atomically. Returns `PortError::Conflict`
    /// when the stored version no longer matches `expected_version`.
    async fn commit_section_change(&self, commit: SectionCommit) -> PortResult<()>;

    async fn update_metadata(
        &self,
        id: TimetableId,
        expected_version: i64,
        edit: &MetadataEdit,
    ) -> PortResult<Timetable>;

    async fn delete_timetable(&self, id: TimetableId) -> PortResult<()>;
}

/// Read-only access to the course catalog.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn get_section(&self, section_id: Uuid) -> PortResult<Section>;

    async fn get_course(&self, course_id: Uuid) -> PortResult<Course>;

    /// The distinct section types across all of a course's sections.
    async fn get_offered_section_types(&self, course_id: Uuid) -> PortResult<Vec<SectionType>>;

    // --- Browsing ---
    /// Every course still on offer, ordered by code.
    async fn list_courses(&self) -> PortResult<Vec<Course>>;

    async fn get_course_with_sections(&self, course_id: Uuid) -> PortResult<CourseWithSections>;
}

#[async_trait]
pub trait SearchIndexService: Send + Sync {
    /// Adds (or replaces) the published timetable in the search index.
    async fn add_timetable(&self, timetable: &Timetable) -> PortResult<()>;

    async fn remove_timetable(&self, id: TimetableId) -> PortResult<()>;
}
