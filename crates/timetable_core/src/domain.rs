//! crates/timetable_core/src/domain.rs
//!
//! Defines the pure, core data structures for the timetable engine.
//! These structs are independent of any database or serialization format;
//! the string encodings used at the persistence boundary live in `codec`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Internal numeric timetable id. Obfuscated before it leaves the service.
pub type TimetableId = i64;

//=========================================================================================
// Catalog Reference Data
//=========================================================================================

/// The closed set of section types a course can offer.
///
/// The declaration order is the order missing types are listed in a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SectionType {
    #[serde(rename = "L")]
    Lecture,
    #[serde(rename = "P")]
    Practical,
    #[serde(rename = "T")]
    Tutorial,
}

impl SectionType {
    pub const ALL: [SectionType; 3] = [
        SectionType::Lecture,
        SectionType::Practical,
        SectionType::Tutorial,
    ];

    /// The single-letter code used in warnings and in the catalog.
    pub fn code(self) -> char {
        match self {
            SectionType::Lecture => 'L',
            SectionType::Practical => 'P',
            SectionType::Tutorial => 'T',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'L' => Some(SectionType::Lecture),
            'P' => Some(SectionType::Practical),
            'T' => Some(SectionType::Tutorial),
            _ => None,
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One offering of a course, with its own weekly slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: Uuid,
    pub course_id: Uuid,
    pub section_type: SectionType,
    pub number: i32,
    pub instructors: Vec<String>,
    /// Raw `room:aux:day:hour` inputs, one per weekly occurrence.
    pub room_time: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub archived: bool,
    pub midsem_start_time: Option<DateTime<Utc>>,
    pub midsem_end_time: Option<DateTime<Utc>>,
    pub compre_start_time: Option<DateTime<Utc>>,
    pub compre_end_time: Option<DateTime<Utc>>,
}

impl Course {
    /// The exam windows this course sits, midsem first. A kind is only
    /// present when both of its timestamps are.
    pub fn exam_intervals(&self) -> Vec<ExamInterval> {
        let mut intervals = Vec::with_capacity(2);
        if let (Some(start), Some(end)) = (self.midsem_start_time, self.midsem_end_time) {
            intervals.push(ExamInterval {
                course_code: self.code.clone(),
                kind: ExamKind::Midsem,
                start,
                end,
            });
        }
        if let (Some(start), Some(end)) = (self.compre_start_time, self.compre_end_time) {
            intervals.push(ExamInterval {
                course_code: self.code.clone(),
                kind: ExamKind::Compre,
                start,
                end,
            });
        }
        intervals
    }
}

/// A catalog course with every section it offers.
#[derive(Debug, Clone)]
pub struct CourseWithSections {
    pub course: Course,
    pub sections: Vec<Section>,
}

// Represents a user - only the fields a new timetable is stamped with.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub degrees: Vec<String>,
    pub batch: i32,
}

//=========================================================================================
// Timetable Encoded State (typed)
//=========================================================================================

/// A weekly `(day, hour)` occupation key. Only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey(pub String);

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One weekly occurrence of an assigned section, owned by a course.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimingEntry {
    pub course_code: String,
    pub slot: SlotKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamKind {
    Midsem,
    Compre,
}

impl ExamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExamKind::Midsem => "midsem",
            ExamKind::Compre => "compre",
        }
    }
}

impl fmt::Display for ExamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamInterval {
    pub course_code: String,
    pub kind: ExamKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A course that is partially selected: some offered types are missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub course_code: String,
    pub missing: BTreeSet<SectionType>,
}

//=========================================================================================
// Timetable
//=========================================================================================

#[derive(Debug, Clone)]
pub struct Timetable {
    pub id: TimetableId,
    pub author_id: Uuid,
    pub name: String,
    pub degrees: Vec<String>,
    pub private: bool,
    pub draft: bool,
    pub archived: bool,
    pub acad_year: i32,
    pub year: i32,
    pub semester: i32,
    pub sections: Vec<Section>,
    pub timings: Vec<TimingEntry>,
    pub exam_times: Vec<ExamInterval>,
    pub warnings: Vec<Warning>,
    /// Bumped on every committed write; stale writers are rejected.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Timetable {
    pub fn is_published(&self) -> bool {
        !self.draft && !self.private
    }

    /// Whether `principal` may read this timetable at all.
    pub fn visible_to(&self, principal: Uuid) -> bool {
        self.author_id == principal || !self.private
    }

    pub fn contains_section(&self, section_id: Uuid) -> bool {
        self.sections.iter().any(|s| s.id == section_id)
    }
}

/// The values a freshly created or copied timetable is inserted with.
#[derive(Debug, Clone)]
pub struct NewTimetable {
    pub author_id: Uuid,
    pub name: String,
    pub degrees: Vec<String>,
    pub acad_year: i32,
    pub year: i32,
    pub semester: i32,
    pub sections: Vec<Section>,
    pub timings: Vec<TimingEntry>,
    pub exam_times: Vec<ExamInterval>,
    pub warnings: Vec<Warning>,
}

/// Requested metadata for an existing timetable.
#[derive(Debug, Clone)]
pub struct MetadataEdit {
    pub name: String,
    pub private: bool,
    pub draft: bool,
}
