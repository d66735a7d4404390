//! crates/timetable_core/src/warnings.rs
//!
//! Targeted upkeep of a timetable's "incomplete section types" warnings.
//!
//! A course carries a warning iff at least one of its sections is selected and
//! at least one type it offers is not. Only the entry of the course being
//! changed is touched; every other entry keeps its value and position.

use crate::domain::{SectionType, Warning};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Add,
    Remove,
}

/// Returns the warnings after a section of `changed` type was added to or
/// removed from `course_code`.
///
/// `offered` is every type the course offers. Callers guarantee that an added
/// type was not already selected and that a removed type was.
pub fn recompute(
    course_code: &str,
    changed: SectionType,
    offered: &BTreeSet<SectionType>,
    change: Change,
    current: &[Warning],
) -> Vec<Warning> {
    let position = current.iter().position(|w| w.course_code == course_code);

    let missing: BTreeSet<SectionType> = match (change, position) {
        // Added to a partially selected course.
        (Change::Add, Some(i)) => {
            let mut missing = current[i].missing.clone();
            missing.remove(&changed);
            missing
        }
        // First section of the course.
        (Change::Add, None) => {
            let mut missing = offered.clone();
            missing.remove(&changed);
            missing
        }
        (Change::Remove, Some(i)) => {
            let mut missing = current[i].missing.clone();
            missing.insert(changed);
            missing
        }
        // The course was complete before this removal.
        (Change::Remove, None) => BTreeSet::from([changed]),
    };

    // Nothing selected any more reads as "unselected", not "incomplete".
    let unselected = change == Change::Remove && offered.is_subset(&missing);

    let mut next = current.to_vec();
    if missing.is_empty() || unselected {
        if let Some(i) = position {
            next.remove(i);
        }
        return next;
    }

    let entry = Warning {
        course_code: course_code.to_string(),
        missing,
    };
    match position {
        Some(i) => next[i] = entry,
        None => next.push(entry),
    }
    next
}

/// Warnings recomputed from scratch from `(course code, offered, selected)`
/// triples, in iteration order.
pub fn from_selection<'a, I>(courses: I) -> Vec<Warning>
where
    I: IntoIterator<Item = (&'a str, &'a BTreeSet<SectionType>, &'a BTreeSet<SectionType>)>,
{
    courses
        .into_iter()
        .filter(|(_, _, selected)| !selected.is_empty())
        .filter_map(|(code, offered, selected)| {
            let missing: BTreeSet<SectionType> = offered.difference(selected).copied().collect();
            (!missing.is_empty()).then(|| Warning {
                course_code: code.to_string(),
                missing,
            })
        })
        .collect()
}
