//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged with the browser client. Timetables
//! leave the service with obfuscated ids and their `timings`, `examTimes` and
//! `warnings` in the persisted string encodings.

use crate::adapters::ids::{IdCodecError, TimetableIdCodec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use timetable_core::codec::{encode_exam_time, encode_timing, encode_warning};
use timetable_core::{Course, CourseWithSections, Section, Timetable};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Requests
//=========================================================================================

/// Names a catalog section to add to or remove from a timetable.
#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionRequest {
    pub section_id: Uuid,
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditTimetableRequest {
    pub name: String,
    pub is_private: bool,
    pub is_draft: bool,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
    pub id: Uuid,
    pub course_id: Uuid,
    /// `L`, `P` or `T`.
    #[serde(rename = "type")]
    pub section_type: String,
    pub number: i32,
    pub instructors: Vec<String>,
    pub room_time: Vec<String>,
}

impl From<&Section> for SectionView {
    fn from(section: &Section) -> Self {
        Self {
            id: section.id,
            course_id: section.course_id,
            section_type: section.section_type.code().to_string(),
            number: section.number,
            instructors: section.instructors.clone(),
            room_time: section.room_time.clone(),
        }
    }
}

/// A full timetable snapshot. This is also the document the search index
/// stores for published timetables.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimetableView {
    pub id: String,
    pub author_id: Uuid,
    pub name: String,
    pub degrees: Vec<String>,
    pub private: bool,
    pub draft: bool,
    pub archived: bool,
    pub acad_year: i32,
    pub year: i32,
    pub semester: i32,
    pub sections: Vec<SectionView>,
    pub timings: Vec<String>,
    pub exam_times: Vec<String>,
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl TimetableView {
    pub fn from_domain(
        timetable: &Timetable,
        ids: &TimetableIdCodec,
    ) -> Result<Self, IdCodecError> {
        Ok(Self {
            id: ids.encode(timetable.id)?,
            author_id: timetable.author_id,
            name: timetable.name.clone(),
            degrees: timetable.degrees.clone(),
            private: timetable.private,
            draft: timetable.draft,
            archived: timetable.archived,
            acad_year: timetable.acad_year,
            year: timetable.year,
            semester: timetable.semester,
            sections: timetable.sections.iter().map(SectionView::from).collect(),
            timings: timetable.timings.iter().map(encode_timing).collect(),
            exam_times: timetable.exam_times.iter().map(encode_exam_time).collect(),
            warnings: timetable.warnings.iter().map(encode_warning).collect(),
            created_at: timetable.created_at,
            last_updated: timetable.last_updated,
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub archived: bool,
    pub midsem_start_time: Option<DateTime<Utc>>,
    pub midsem_end_time: Option<DateTime<Utc>>,
    pub compre_start_time: Option<DateTime<Utc>>,
    pub compre_end_time: Option<DateTime<Utc>>,
}

impl From<Course> for CourseView {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            code: course.code,
            name: course.name,
            archived: course.archived,
            midsem_start_time: course.midsem_start_time,
            midsem_end_time: course.midsem_end_time,
            compre_start_time: course.compre_start_time,
            compre_end_time: course.compre_end_time,
        }
    }
}

/// A course with every section it offers.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetailView {
    #[serde(flatten)]
    pub course: CourseView,
    pub sections: Vec<SectionView>,
}

impl From<CourseWithSections> for CourseDetailView {
    fn from(detail: CourseWithSections) -> Self {
        Self {
            sections: detail.sections.iter().map(SectionView::from).collect(),
            course: detail.course.into(),
        }
    }
}

/// Returned by create and copy.
#[derive(Serialize, Debug, ToSchema)]
pub struct CreatedTimetable {
    pub id: String,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
