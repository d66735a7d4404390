//! crates/timetable_core/src/clash.rs
//!
//! Pure clash checks of a candidate section (class hours) or course (exam
//! hours) against a timetable's current state. Both checks stop at the first
//! conflict they find so the caller can surface one problem at a time.

use crate::codec::{decode_room_time, CodecError};
use crate::domain::{Course, ExamInterval, ExamKind, Section, SlotKey, TimingEntry};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

//=========================================================================================
// Class-Hour Clash
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassHourCheck {
    Clear,
    Clash { course_code: String, slot: SlotKey },
}

/// Checks the candidate's weekly slots against the occupied ones, in the
/// order the candidate lists them.
pub fn check_class_hours(
    timings: &[TimingEntry],
    candidate: &Section,
) -> Result<ClassHourCheck, CodecError> {
    let occupied: HashMap<&SlotKey, &str> = timings
        .iter()
        .map(|t| (&t.slot, t.course_code.as_str()))
        .collect();

    for room_time in &candidate.room_time {
        let slot = decode_room_time(room_time)?;
        if let Some(owner) = occupied.get(&slot) {
            return Ok(ClassHourCheck::Clash {
                course_code: owner.to_string(),
                slot,
            });
        }
    }
    Ok(ClassHourCheck::Clear)
}

//=========================================================================================
// Exam-Hour Clash
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExamHourCheck {
    /// The course already sits in the timetable; its exams are already counted.
    SameCourse,
    Clear,
    Clash { exam: ExamKind, course_code: String },
}

impl ExamHourCheck {
    pub fn same_course(&self) -> bool {
        matches!(self, ExamHourCheck::SameCourse)
    }
}

/// Whether `[new_start, new_end]` collides with `existing`.
///
/// Back-to-back windows do not overlap: a new exam ending exactly when an
/// existing one starts (or starting exactly when it ends) is allowed.
pub fn exam_windows_overlap(
    new_start: DateTime<Utc>,
    new_end: DateTime<Utc>,
    existing: &ExamInterval,
) -> bool {
    let (start, end) = (existing.start, existing.end);
    (new_start <= start && new_end > start)
        || (new_start < end && new_end >= end)
        || (new_start >= start && new_end <= end)
}

pub fn check_exam_hours(exam_times: &[ExamInterval], candidate: &Course) -> ExamHourCheck {
    if exam_times.iter().any(|e| e.course_code == candidate.code) {
        return ExamHourCheck::SameCourse;
    }

    // Midsem is checked against every existing window before compre is.
    for window in candidate.exam_intervals() {
        if let Some(hit) = exam_times
            .iter()
            .find(|existing| exam_windows_overlap(window.start, window.end, existing))
        {
            return ExamHourCheck::Clash {
                exam: window.kind,
                course_code: hit.course_code.clone(),
            };
        }
    }
    ExamHourCheck::Clear
}
