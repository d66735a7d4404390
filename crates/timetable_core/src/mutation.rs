//! crates/timetable_core/src/mutation.rs
//!
//! Plans section additions and removals. A plan is computed entirely from the
//! timetable as read plus catalog facts and is returned as a single
//! `SectionCommit`; nothing is written here.

use crate::clash::{check_class_hours, check_exam_hours, ClassHourCheck, ExamHourCheck};
use crate::codec::{decode_room_time, timings_for_section};
use crate::domain::{Course, Section, SectionType, Timetable};
use crate::error::{ConflictKind, EngineError, EngineResult};
use crate::lifecycle::{check_section_add, check_section_remove};
use crate::ports::{Membership, SectionCommit};
use crate::warnings::{recompute, Change};
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::debug;

/// Validates adding `section` (of `course`) to `timetable` and computes the
/// resulting state.
pub fn plan_add(
    timetable: &Timetable,
    section: &Section,
    course: &Course,
    offered: &BTreeSet<SectionType>,
) -> EngineResult<SectionCommit> {
    check_section_add(timetable)?;

    if course.archived {
        return Err(ConflictKind::CourseArchived(course.code.clone()).into());
    }

    let duplicate = || -> EngineError {
        ConflictKind::DuplicateSectionType {
            course_code: course.code.clone(),
            section_type: section.section_type,
        }
        .into()
    };
    if timetable.contains_section(section.id) {
        return Err(duplicate());
    }

    if let ClassHourCheck::Clash { course_code, slot } =
        check_class_hours(&timetable.timings, section)?
    {
        return Err(ConflictKind::ClassHourClash { course_code, slot }.into());
    }

    let exam_check = check_exam_hours(&timetable.exam_times, course);
    if let ExamHourCheck::Clash { exam, course_code } = &exam_check {
        return Err(ConflictKind::ExamHourClash {
            course_code: course_code.clone(),
            exam: *exam,
        }
        .into());
    }

    let same_type_selected = timetable
        .sections
        .iter()
        .any(|s| s.course_id == course.id && s.section_type == section.section_type);
    if same_type_selected {
        return Err(duplicate());
    }

    let warnings = recompute(
        &course.code,
        section.section_type,
        offered,
        Change::Add,
        &timetable.warnings,
    );

    let mut timings = timetable.timings.clone();
    timings.extend(timings_for_section(&course.code, &section.room_time)?);

    let exam_times = (!exam_check.same_course()).then(|| {
        let mut exam_times = timetable.exam_times.clone();
        exam_times.extend(course.exam_intervals());
        exam_times
    });

    debug!(
        timetable_id = timetable.id,
        course = %course.code,
        section_type = %section.section_type,
        "planned section add"
    );

    Ok(SectionCommit {
        timetable_id: timetable.id,
        expected_version: timetable.version,
        membership: Membership::Attach(section.id),
        timings,
        warnings,
        exam_times,
    })
}

/// The structural inverse of `plan_add`. `course` is the removed section's
/// course; its exams leave the timetable with its last selected section.
pub fn plan_remove(
    timetable: &Timetable,
    section_id: uuid::Uuid,
    course: &Course,
    offered: &BTreeSet<SectionType>,
) -> EngineResult<SectionCommit> {
    check_section_remove(timetable)?;

    let section = timetable
        .sections
        .iter()
        .find(|s| s.id == section_id)
        .ok_or_else(|| EngineError::NotFound("section in timetable".to_string()))?;

    // Drop one entry per weekly occurrence of this section.
    let mut timings = timetable.timings.clone();
    for room_time in &section.room_time {
        let slot = decode_room_time(room_time)?;
        if let Some(i) = timings
            .iter()
            .position(|t| t.course_code == course.code && t.slot == slot)
        {
            timings.remove(i);
        }
    }

    let course_still_selected = timetable
        .sections
        .iter()
        .any(|s| s.id != section_id && s.course_id == section.course_id);
    let exam_times = (!course_still_selected).then(|| {
        timetable
            .exam_times
            .iter()
            .filter(|e| e.course_code != course.code)
            .cloned()
            .collect()
    });

    let warnings = recompute(
        &course.code,
        section.section_type,
        offered,
        Change::Remove,
        &timetable.warnings,
    );

    Ok(SectionCommit {
        timetable_id: timetable.id,
        expected_version: timetable.version,
        membership: Membership::Detach(section_id),
        timings,
        warnings,
        exam_times,
    })
}

/// The timetable a successful `commit` leaves behind. `section` is the
/// section the commit attaches or detaches.
pub fn apply_commit(
    mut timetable: Timetable,
    commit: SectionCommit,
    section: &Section,
) -> Timetable {
    match commit.membership {
        Membership::Attach(_) => timetable.sections.push(section.clone()),
        Membership::Detach(id) => timetable.sections.retain(|s| s.id != id),
    }
    timetable.timings = commit.timings;
    timetable.warnings = commit.warnings;
    if let Some(exam_times) = commit.exam_times {
        timetable.exam_times = exam_times;
    }
    timetable.version += 1;
    timetable.last_updated = Utc::now();
    timetable
}
