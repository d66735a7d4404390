//! crates/timetable_core/src/engine.rs
//!
//! The entry points request handlers call. Each operation loads what it
//! needs through the ports, runs the pure checks and plans, and persists the
//! outcome in one store call.

use crate::domain::{
    Course, CourseWithSections, MetadataEdit, NewTimetable, SectionType, Timetable, TimetableId,
};
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::{
    check_copy, check_metadata_edit, check_section_add, check_section_remove, ensure_owner,
    ensure_visible, IndexSync, UNTITLED_TIMETABLE,
};
use crate::locks::TimetableLocks;
use crate::mutation::{apply_commit, plan_add, plan_remove};
use crate::ports::{CatalogService, DatabaseService, PortError, SearchIndexService};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The academic term new timetables are stamped with.
#[derive(Debug, Clone, Copy)]
pub struct AcademicTerm {
    pub acad_year: i32,
    pub semester: i32,
}

pub struct TimetableEngine {
    db: Arc<dyn DatabaseService>,
    catalog: Arc<dyn CatalogService>,
    search: Arc<dyn SearchIndexService>,
    term: AcademicTerm,
    locks: TimetableLocks,
}

impl TimetableEngine {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        catalog: Arc<dyn CatalogService>,
        search: Arc<dyn SearchIndexService>,
        term: AcademicTerm,
    ) -> Self {
        Self {
            db,
            catalog,
            search,
            term,
            locks: TimetableLocks::new(),
        }
    }

    //=====================================================================================
    // Lifecycle
    //=====================================================================================

    pub async fn create_timetable(&self, principal: Uuid) -> EngineResult<Timetable> {
        let new = self.blank_timetable(principal).await?;
        let timetable = self
            .db
            .insert_timetable(new)
            .await
            .map_err(internal("create", None))?;
        info!(timetable_id = timetable.id, user_id = %principal, "timetable created");
        Ok(timetable)
    }

    pub async fn get_timetable(
        &self,
        principal: Uuid,
        id: TimetableId,
    ) -> EngineResult<Timetable> {
        let timetable = self.load(id).await?;
        ensure_visible(&timetable, principal)?;
        Ok(timetable)
    }

    /// Copies the contents of a visible, non-archived timetable into a new
    /// private draft owned by `principal`.
    pub async fn copy_timetable(
        &self,
        principal: Uuid,
        source_id: TimetableId,
    ) -> EngineResult<Timetable> {
        let source = self.get_timetable(principal, source_id).await?;
        check_copy(&source)?;

        let mut new = self.blank_timetable(principal).await?;
        new.sections = source.sections;
        new.timings = source.timings;
        new.exam_times = source.exam_times;
        new.warnings = source.warnings;

        let copy = self
            .db
            .insert_timetable(new)
            .await
            .map_err(internal("copy", Some(source_id)))?;
        info!(source_id, timetable_id = copy.id, user_id = %principal, "timetable copied");
        Ok(copy)
    }

    /// Renames, publishes or unpublishes. The search index is kept in step;
    /// if it cannot be updated the metadata change is rolled back.
    pub async fn edit_metadata(
        &self,
        principal: Uuid,
        id: TimetableId,
        edit: MetadataEdit,
    ) -> EngineResult<Timetable> {
        let _guard = self.locks.acquire(id).await;

        let before = self.load(id).await?;
        ensure_owner(&before, principal)?;
        let sync = check_metadata_edit(&before, &edit)?;

        let updated = self
            .db
            .update_metadata(id, before.version, &edit)
            .await
            .map_err(internal("edit metadata", Some(id)))?;

        let synced = match sync {
            IndexSync::Add => self.search.add_timetable(&updated).await,
            IndexSync::Remove => self.search.remove_timetable(id).await,
            IndexSync::Unchanged => Ok(()),
        };
        if let Err(e) = synced {
            error!(
                timetable_id = id,
                error = %e,
                ?sync,
                "search index sync failed, reverting metadata"
            );
            let previous = MetadataEdit {
                name: before.name,
                private: before.private,
                draft: before.draft,
            };
            if let Err(revert) = self.db.update_metadata(id, updated.version, &previous).await {
                error!(timetable_id = id, error = %revert, "failed to revert metadata");
            }
            return Err(EngineError::Upstream(e.to_string()));
        }

        info!(
            timetable_id = id,
            draft = updated.draft,
            private = updated.private,
            "timetable metadata edited"
        );
        Ok(updated)
    }

    /// Deletes the timetable. A published one leaves the search index first,
    /// and stays stored if that fails.
    pub async fn delete_timetable(&self, principal: Uuid, id: TimetableId) -> EngineResult<()> {
        let _guard = self.locks.acquire(id).await;

        let timetable = self.load(id).await?;
        ensure_owner(&timetable, principal)?;

        if timetable.is_published() {
            self.search.remove_timetable(id).await.map_err(|e| {
                error!(timetable_id = id, error = %e, "failed to drop timetable from search index");
                EngineError::Upstream(e.to_string())
            })?;
        }
        self.db
            .delete_timetable(id)
            .await
            .map_err(internal("delete", Some(id)))?;

        info!(timetable_id = id, "timetable deleted");
        Ok(())
    }

    //=====================================================================================
    // Section Mutations
    //=====================================================================================

    pub async fn add_section(
        &self,
        principal: Uuid,
        id: TimetableId,
        section_id: Uuid,
    ) -> EngineResult<Timetable> {
        let _guard = self.locks.acquire(id).await;

        let timetable = self.load(id).await?;
        ensure_owner(&timetable, principal)?;
        check_section_add(&timetable)?;

        let section = self
            .catalog
            .get_section(section_id)
            .await
            .map_err(catalog_failure(Some(id)))?;
        let course = self.course(section.course_id, id).await?;
        let offered = self.offered_types(section.course_id, id).await?;

        let commit = plan_add(&timetable, &section, &course, &offered).map_err(|e| {
            info!(timetable_id = id, course = %course.code, reason = %e, "section add refused");
            e
        })?;
        self.db
            .commit_section_change(commit.clone())
            .await
            .map_err(internal("add section", Some(id)))?;

        info!(
            timetable_id = id,
            course = %course.code,
            section_type = %section.section_type,
            "section added"
        );
        Ok(apply_commit(timetable, commit, &section))
    }

    pub async fn remove_section(
        &self,
        principal: Uuid,
        id: TimetableId,
        section_id: Uuid,
    ) -> EngineResult<Timetable> {
        let _guard = self.locks.acquire(id).await;

        let timetable = self.load(id).await?;
        ensure_owner(&timetable, principal)?;
        check_section_remove(&timetable)?;

        let section = timetable
            .sections
            .iter()
            .find(|s| s.id == section_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound("section in timetable".to_string()))?;
        let course = self.course(section.course_id, id).await?;
        let offered = self.offered_types(section.course_id, id).await?;

        let commit = plan_remove(&timetable, section_id, &course, &offered)?;
        self.db
            .commit_section_change(commit.clone())
            .await
            .map_err(internal("remove section", Some(id)))?;

        info!(timetable_id = id, course = %course.code, "section removed");
        Ok(apply_commit(timetable, commit, &section))
    }

    //=====================================================================================
    // Course Catalog
    //=====================================================================================

    pub async fn list_courses(&self) -> EngineResult<Vec<Course>> {
        self.catalog
            .list_courses()
            .await
            .map_err(catalog_failure(None))
    }

    pub async fn course_with_sections(&self, course_id: Uuid) -> EngineResult<CourseWithSections> {
        self.catalog
            .get_course_with_sections(course_id)
            .await
            .map_err(catalog_failure(None))
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    /// Reads a timetable, logging anything but a plain miss.
    async fn load(&self, id: TimetableId) -> EngineResult<Timetable> {
        self.db.get_timetable(id).await.map_err(|e| {
            if !matches!(e, PortError::NotFound(_)) {
                error!(timetable_id = id, error = %e, "failed to load timetable");
            }
            e.into()
        })
    }

    async fn course(&self, course_id: Uuid, timetable_id: TimetableId) -> EngineResult<Course> {
        self.catalog
            .get_course(course_id)
            .await
            .map_err(catalog_failure(Some(timetable_id)))
    }

    async fn offered_types(
        &self,
        course_id: Uuid,
        timetable_id: TimetableId,
    ) -> EngineResult<BTreeSet<SectionType>> {
        let offered = self
            .catalog
            .get_offered_section_types(course_id)
            .await
            .map_err(catalog_failure(Some(timetable_id)))?;
        Ok(offered.into_iter().collect())
    }

    async fn blank_timetable(&self, principal: Uuid) -> EngineResult<NewTimetable> {
        let user = self.db.get_user(principal).await.map_err(|e| match e {
            PortError::NotFound(_) => {
                warn!(user_id = %principal, "unregistered user tried to create a timetable");
                EngineError::NotFound("user".to_string())
            }
            other => other.into(),
        })?;
        Ok(NewTimetable {
            author_id: principal,
            name: UNTITLED_TIMETABLE.to_string(),
            degrees: user.degrees,
            acad_year: self.term.acad_year,
            year: self.term.acad_year - user.batch + 1,
            semester: self.term.semester,
            sections: vec![],
            timings: vec![],
            exam_times: vec![],
            warnings: vec![],
        })
    }
}

/// Logs a store failure on a write path before converting it. Stale writes
/// pass through as conflicts.
fn internal(
    action: &'static str,
    timetable_id: Option<TimetableId>,
) -> impl Fn(PortError) -> EngineError {
    move |e| {
        if !matches!(e, PortError::Conflict(_)) {
            error!(action, ?timetable_id, error = %e, "store write failed");
        }
        e.into()
    }
}

fn catalog_failure(timetable_id: Option<TimetableId>) -> impl Fn(PortError) -> EngineError {
    move |e| {
        if !matches!(e, PortError::NotFound(_)) {
            error!(?timetable_id, error = %e, "catalog read failed");
        }
        e.into()
    }
}
