//! crates/timetable_core/src/lifecycle.rs
//!
//! Guards for the draft -> published -> archived lifecycle. Each check is a
//! pure function of the timetable as read and the caller's request.

use crate::domain::{MetadataEdit, Timetable};
use crate::error::{ConflictKind, EngineError, EngineResult};
use uuid::Uuid;

pub const UNTITLED_TIMETABLE: &str = "Untitled Timetable";

/// What the search index must do after a metadata edit commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSync {
    Add,
    Remove,
    Unchanged,
}

/// Mutation paths: the caller must be the author.
pub fn ensure_owner(timetable: &Timetable, principal: Uuid) -> EngineResult<()> {
    if timetable.author_id != principal {
        return Err(EngineError::Forbidden);
    }
    Ok(())
}

/// Read paths: someone else's private timetable does not exist to the caller.
pub fn ensure_visible(timetable: &Timetable, principal: Uuid) -> EngineResult<()> {
    if !timetable.visible_to(principal) {
        return Err(EngineError::NotFound("timetable".to_string()));
    }
    Ok(())
}

pub fn check_copy(source: &Timetable) -> EngineResult<()> {
    if source.archived {
        return Err(ConflictKind::CopyArchived.into());
    }
    Ok(())
}

pub fn check_section_add(timetable: &Timetable) -> EngineResult<()> {
    if timetable.archived {
        return Err(ConflictKind::TimetableArchived.into());
    }
    if !timetable.draft {
        return Err(ConflictKind::NotDraft.into());
    }
    Ok(())
}

pub fn check_section_remove(timetable: &Timetable) -> EngineResult<()> {
    if timetable.archived {
        return Err(ConflictKind::TimetableArchived.into());
    }
    Ok(())
}

/// Validates a name/private/draft edit and decides the index follow-up.
///
/// Leaving the draft state or going public counts as publishing and needs a
/// non-empty timetable without warnings.
pub fn check_metadata_edit(timetable: &Timetable, edit: &MetadataEdit) -> EngineResult<IndexSync> {
    if edit.name.trim().is_empty() {
        return Err(EngineError::Invalid("timetable name must not be empty".to_string()));
    }
    if edit.draft && !edit.private {
        return Err(EngineError::Invalid("draft timetable can not be public".to_string()));
    }
    if timetable.archived && edit.draft {
        return Err(ConflictKind::ArchivedToDraft.into());
    }

    let publishing = !edit.draft || !edit.private;
    if publishing && timetable.sections.is_empty() {
        return Err(ConflictKind::PublishEmpty.into());
    }
    if publishing && !timetable.warnings.is_empty() {
        return Err(ConflictKind::PublishWithWarnings.into());
    }

    if !edit.draft && !edit.private {
        Ok(IndexSync::Add)
    } else if timetable.is_published() {
        Ok(IndexSync::Remove)
    } else {
        Ok(IndexSync::Unchanged)
    }
}
