//! In-memory port implementations shared by the engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use timetable_core::{
    AcademicTerm, CatalogService, Course, CourseWithSections, DatabaseService, Membership,
    MetadataEdit, NewTimetable, PortError, PortResult, SearchIndexService, Section,
    SectionCommit, SectionType, Timetable, TimetableEngine, TimetableId, UserProfile,
};
use uuid::Uuid;

#[derive(Default)]
struct State {
    next_id: TimetableId,
    timetables: HashMap<TimetableId, Timetable>,
    users: HashMap<Uuid, UserProfile>,
    sections: HashMap<Uuid, Section>,
    courses: HashMap<Uuid, Course>,
}

/// Store and catalog in one, the way the Postgres adapter is.
#[derive(Default)]
pub struct InMemoryDb {
    state: Mutex<State>,
    pub fail_commits: AtomicBool,
    pub fail_reads: AtomicBool,
    pub timetable_reads: AtomicUsize,
}

impl InMemoryDb {
    pub fn add_user(&self, batch: i32) -> Uuid {
        let user_id = Uuid::new_v4();
        self.state.lock().unwrap().users.insert(
            user_id,
            UserProfile {
                user_id,
                degrees: vec!["A7".to_string()],
                batch,
            },
        );
        user_id
    }

    pub fn add_course(
        &self,
        code: &str,
        midsem: Option<(u32, u32)>,
        compre: Option<(u32, u32)>,
    ) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: code.to_string(),
            archived: false,
            midsem_start_time: midsem.map(|(s, _)| exam_day(s)),
            midsem_end_time: midsem.map(|(_, e)| exam_day(e)),
            compre_start_time: compre.map(|(s, _)| exam_day(s) + chrono::Duration::days(60)),
            compre_end_time: compre.map(|(_, e)| exam_day(e) + chrono::Duration::days(60)),
        };
        self.state.lock().unwrap().courses.insert(course.id, course.clone());
        course
    }

    pub fn add_section(
        &self,
        course: &Course,
        section_type: SectionType,
        slots: &[&str],
    ) -> Section {
        let section = Section {
            id: Uuid::new_v4(),
            course_id: course.id,
            section_type,
            number: 1,
            instructors: vec!["Prof".to_string()],
            room_time: slots.iter().map(|s| format!("F102:MAIN:{s}")).collect(),
        };
        self.state.lock().unwrap().sections.insert(section.id, section.clone());
        section
    }

    pub fn stored(&self, id: TimetableId) -> Timetable {
        self.state.lock().unwrap().timetables[&id].clone()
    }

    pub fn set_flags(&self, id: TimetableId, draft: bool, private: bool, archived: bool) {
        let mut state = self.state.lock().unwrap();
        let t = state.timetables.get_mut(&id).unwrap();
        t.draft = draft;
        t.private = private;
        t.archived = archived;
    }

    pub fn archive_course(&self, course_id: Uuid) {
        self.state.lock().unwrap().courses.get_mut(&course_id).unwrap().archived = true;
    }

    pub fn reads(&self) -> usize {
        self.timetable_reads.load(Ordering::SeqCst)
    }

    /// Simulates a writer in another process bumping the version.
    pub fn bump_version(&self, id: TimetableId) {
        self.state.lock().unwrap().timetables.get_mut(&id).unwrap().version += 1;
    }
}

pub fn exam_day(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, hour, 0, 0).unwrap()
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn get_user(&self, user_id: Uuid) -> PortResult<UserProfile> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("user".to_string()))
    }

    async fn validate_auth_session(&self, _session_id: &str) -> PortResult<Uuid> {
        Err(PortError::Unauthorized)
    }

    async fn get_timetable(&self, id: TimetableId) -> PortResult<Timetable> {
        self.timetable_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        self.state
            .lock()
            .unwrap()
            .timetables
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("timetable".to_string()))
    }

    async fn insert_timetable(&self, new: NewTimetable) -> PortResult<Timetable> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let now = Utc::now();
        let timetable = Timetable {
            id: state.next_id,
            author_id: new.author_id,
            name: new.name,
            degrees: new.degrees,
            private: true,
            draft: true,
            archived: false,
            acad_year: new.acad_year,
            year: new.year,
            semester: new.semester,
            sections: new.sections,
            timings: new.timings,
            exam_times: new.exam_times,
            warnings: new.warnings,
            version: 0,
            created_at: now,
            last_updated: now,
        };
        state.timetables.insert(timetable.id, timetable.clone());
        Ok(timetable)
    }

    async fn commit_section_change(&self, commit: SectionCommit) -> PortResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        let attached = match &commit.membership {
            Membership::Attach(id) => Some(
                state
                    .sections
                    .get(id)
                    .cloned()
                    .ok_or_else(|| PortError::NotFound("section".to_string()))?,
            ),
            Membership::Detach(_) => None,
        };
        let t = state
            .timetables
            .get_mut(&commit.timetable_id)
            .ok_or_else(|| PortError::NotFound("timetable".to_string()))?;
        if t.version != commit.expected_version {
            return Err(PortError::Conflict(format!("timetable {} changed", t.id)));
        }
        match commit.membership {
            Membership::Attach(_) => t.sections.extend(attached),
            Membership::Detach(id) => t.sections.retain(|s| s.id != id),
        }
        t.timings = commit.timings;
        t.warnings = commit.warnings;
        if let Some(exam_times) = commit.exam_times {
            t.exam_times = exam_times;
        }
        t.version += 1;
        t.last_updated = Utc::now();
        Ok(())
    }

    async fn update_metadata(
        &self,
        id: TimetableId,
        expected_version: i64,
        edit: &MetadataEdit,
    ) -> PortResult<Timetable> {
        let mut state = self.state.lock().unwrap();
        let t = state
            .timetables
            .get_mut(&id)
            .ok_or_else(|| PortError::NotFound("timetable".to_string()))?;
        if t.version != expected_version {
            return Err(PortError::Conflict(format!("timetable {id} changed")));
        }
        t.name = edit.name.clone();
        t.private = edit.private;
        t.draft = edit.draft;
        t.version += 1;
        Ok(t.clone())
    }

    async fn delete_timetable(&self, id: TimetableId) -> PortResult<()> {
        self.state
            .lock()
            .unwrap()
            .timetables
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound("timetable".to_string()))
    }
}

#[async_trait]
impl CatalogService for InMemoryDb {
    async fn get_section(&self, section_id: Uuid) -> PortResult<Section> {
        self.state
            .lock()
            .unwrap()
            .sections
            .get(&section_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("section".to_string()))
    }

    async fn get_course(&self, course_id: Uuid) -> PortResult<Course> {
        self.state
            .lock()
            .unwrap()
            .courses
            .get(&course_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("course".to_string()))
    }

    async fn get_offered_section_types(&self, course_id: Uuid) -> PortResult<Vec<SectionType>> {
        let types: BTreeSet<SectionType> = self
            .state
            .lock()
            .unwrap()
            .sections
            .values()
            .filter(|s| s.course_id == course_id)
            .map(|s| s.section_type)
            .collect();
        Ok(types.into_iter().collect())
    }

    async fn list_courses(&self) -> PortResult<Vec<Course>> {
        let mut courses: Vec<Course> = self
            .state
            .lock()
            .unwrap()
            .courses
            .values()
            .filter(|c| !c.archived)
            .cloned()
            .collect();
        courses.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(courses)
    }

    async fn get_course_with_sections(&self, course_id: Uuid) -> PortResult<CourseWithSections> {
        let course = self.get_course(course_id).await?;
        let mut sections: Vec<Section> = self
            .state
            .lock()
            .unwrap()
            .sections
            .values()
            .filter(|s| s.course_id == course_id)
            .cloned()
            .collect();
        sections.sort_by_key(|s| (s.section_type, s.number));
        Ok(CourseWithSections { course, sections })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCall {
    Add(TimetableId),
    Remove(TimetableId),
}

#[derive(Default)]
pub struct RecordingIndex {
    pub calls: Mutex<Vec<IndexCall>>,
    pub fail: AtomicBool,
}

impl RecordingIndex {
    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: IndexCall) -> PortResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("search service returned 503".to_string()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl SearchIndexService for RecordingIndex {
    async fn add_timetable(&self, timetable: &Timetable) -> PortResult<()> {
        self.record(IndexCall::Add(timetable.id))
    }

    async fn remove_timetable(&self, id: TimetableId) -> PortResult<()> {
        self.record(IndexCall::Remove(id))
    }
}

pub struct Harness {
    pub db: Arc<InMemoryDb>,
    pub index: Arc<RecordingIndex>,
    pub engine: TimetableEngine,
}

pub fn harness() -> Harness {
    let db = Arc::new(InMemoryDb::default());
    let index = Arc::new(RecordingIndex::default());
    let engine = TimetableEngine::new(
        db.clone(),
        db.clone(),
        index.clone(),
        AcademicTerm {
            acad_year: 2024,
            semester: 1,
        },
    );
    Harness { db, index, engine }
}
