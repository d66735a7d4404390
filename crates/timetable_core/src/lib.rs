pub mod clash;
pub mod codec;
pub mod domain;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod mutation;
pub mod ports;
pub mod warnings;

pub use domain::{
    Course, CourseWithSections, ExamInterval, ExamKind, MetadataEdit, NewTimetable, Section,
    SectionType, SlotKey, Timetable, TimetableId, TimingEntry, UserProfile, Warning,
};
pub use engine::{AcademicTerm, TimetableEngine};
pub use error::{ConflictKind, EngineError, EngineResult};
pub use ports::{
    CatalogService, DatabaseService, Membership, PortError, PortResult, SearchIndexService,
    SectionCommit,
};
