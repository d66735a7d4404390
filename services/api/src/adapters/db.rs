//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` and `CatalogService` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.
//!
//! The encoded `timings`, `exam_times` and `warnings` columns are decoded into
//! typed records here and nowhere else.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use timetable_core::codec::{
    decode_all, decode_exam_time, decode_timing, decode_warning, encode_exam_time, encode_timing,
    encode_warning,
};
use timetable_core::{
    CatalogService, Course, CourseWithSections, DatabaseService, Membership, MetadataEdit,
    NewTimetable, PortError, PortResult, Section, SectionCommit, SectionType, Timetable,
    TimetableId, UserProfile,
};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` and `CatalogService` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Tells a missing row apart from a stale version after a conditional
    /// write matched nothing.
    async fn missed_write(
        tx: &mut Transaction<'_, Postgres>,
        id: TimetableId,
        expected_version: i64,
    ) -> PortError {
        let current: Result<Option<i64>, sqlx::Error> =
            sqlx::query_scalar("SELECT version FROM timetables WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await;
        match current {
            Ok(None) => PortError::NotFound("timetable".to_string()),
            Ok(Some(version)) => PortError::Conflict(format!(
                "timetable {} is at version {}, expected {}",
                id, version, expected_version
            )),
            Err(e) => unexpected(e),
        }
    }
}

/// Starts a read-only transaction whose statements all see one snapshot.
async fn snapshot(pool: &PgPool) -> PortResult<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await.map_err(unexpected)?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
    Ok(tx)
}

async fn sections_of(
    conn: &mut PgConnection,
    timetable_id: TimetableId,
) -> PortResult<Vec<Section>> {
    let records = sqlx::query_as::<_, SectionRecord>(&format!(
        "SELECT {SECTION_COLUMNS} \
         FROM sections s \
         JOIN timetable_sections ts ON ts.section_id = s.id \
         WHERE ts.timetable_id = $1 \
         ORDER BY ts.seq ASC"
    ))
    .bind(timetable_id)
    .fetch_all(conn)
    .await
    .map_err(unexpected)?;

    records.into_iter().map(SectionRecord::to_domain).collect()
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: &'static str) -> impl Fn(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

// Foreign key violations on a section link mean the section is gone.
fn link_error(e: sqlx::Error) -> PortError {
    let foreign_key_violation = e
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23503");
    if foreign_key_violation {
        PortError::NotFound("section".to_string())
    } else {
        unexpected(e)
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    degrees: Vec<String>,
    batch: i32,
}
impl UserRecord {
    fn to_domain(self) -> UserProfile {
        UserProfile {
            user_id: self.user_id,
            degrees: self.degrees,
            batch: self.batch,
        }
    }
}

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    code: String,
    name: String,
    archived: bool,
    midsem_start_time: Option<DateTime<Utc>>,
    midsem_end_time: Option<DateTime<Utc>>,
    compre_start_time: Option<DateTime<Utc>>,
    compre_end_time: Option<DateTime<Utc>>,
}
impl CourseRecord {
    fn to_domain(self) -> Course {
        Course {
            id: self.id,
            code: self.code,
            name: self.name,
            archived: self.archived,
            midsem_start_time: self.midsem_start_time,
            midsem_end_time: self.midsem_end_time,
            compre_start_time: self.compre_start_time,
            compre_end_time: self.compre_end_time,
        }
    }
}

fn section_type(raw: &str) -> PortResult<SectionType> {
    let mut chars = raw.chars();
    match (chars.next().and_then(SectionType::from_code), chars.next()) {
        (Some(t), None) => Ok(t),
        _ => Err(PortError::Unexpected(format!("Unknown section type '{}'", raw))),
    }
}

const SECTION_COLUMNS: &str =
    "s.id, s.course_id, s.type AS section_type, s.number, s.instructors, s.room_time";

const COURSE_COLUMNS: &str = "id, code, name, archived, midsem_start_time, midsem_end_time, \
     compre_start_time, compre_end_time";

#[derive(FromRow)]
struct SectionRecord {
    id: Uuid,
    course_id: Uuid,
    section_type: String,
    number: i32,
    instructors: Vec<String>,
    room_time: Vec<String>,
}
impl SectionRecord {
    fn to_domain(self) -> PortResult<Section> {
        Ok(Section {
            id: self.id,
            course_id: self.course_id,
            section_type: section_type(&self.section_type)?,
            number: self.number,
            instructors: self.instructors,
            room_time: self.room_time,
        })
    }
}

const LINK_SECTION: &str =
    "INSERT INTO timetable_sections (timetable_id, section_id) VALUES ($1, $2)";

const UNLINK_SECTION: &str =
    "DELETE FROM timetable_sections WHERE timetable_id = $1 AND section_id = $2";

const TIMETABLE_COLUMNS: &str = "id, author_id, name, degrees, private, draft, archived, \
     acad_year, year, semester, timings, exam_times, warnings, version, created_at, last_updated";

#[derive(FromRow)]
struct TimetableRecord {
    id: i64,
    author_id: Uuid,
    name: String,
    degrees: Vec<String>,
    private: bool,
    draft: bool,
    archived: bool,
    acad_year: i32,
    year: i32,
    semester: i32,
    timings: Vec<String>,
    exam_times: Vec<String>,
    warnings: Vec<String>,
    version: i64,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}
impl TimetableRecord {
    fn to_domain(self, sections: Vec<Section>) -> PortResult<Timetable> {
        let corrupt = |e: timetable_core::codec::CodecError| {
            PortError::Unexpected(format!("Timetable {} has corrupt state: {}", self.id, e))
        };
        Ok(Timetable {
            id: self.id,
            author_id: self.author_id,
            timings: decode_all(&self.timings, decode_timing).map_err(corrupt)?,
            exam_times: decode_all(&self.exam_times, decode_exam_time).map_err(corrupt)?,
            warnings: decode_all(&self.warnings, decode_warning).map_err(corrupt)?,
            name: self.name,
            degrees: self.degrees,
            private: self.private,
            draft: self.draft,
            archived: self.archived,
            acad_year: self.acad_year,
            year: self.year,
            semester: self.semester,
            sections,
            version: self.version,
            created_at: self.created_at,
            last_updated: self.last_updated,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn get_user(&self, user_id: Uuid) -> PortResult<UserProfile> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, degrees, batch FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("user"))?;
        Ok(record.to_domain())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE session_id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn get_timetable(&self, id: TimetableId) -> PortResult<Timetable> {
        let mut tx = snapshot(&self.pool).await?;

        let record = sqlx::query_as::<_, TimetableRecord>(&format!(
            "SELECT {TIMETABLE_COLUMNS} FROM timetables WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(not_found_or_unexpected("timetable"))?;
        let sections = sections_of(&mut *tx, id).await?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain(sections)
    }

    async fn insert_timetable(&self, new: NewTimetable) -> PortResult<Timetable> {
        let timings: Vec<String> = new.timings.iter().map(encode_timing).collect();
        let exam_times: Vec<String> = new.exam_times.iter().map(encode_exam_time).collect();
        let warnings: Vec<String> = new.warnings.iter().map(encode_warning).collect();

        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, TimetableRecord>(&format!(
            "INSERT INTO timetables \
             (author_id, name, degrees, acad_year, year, semester, timings, exam_times, warnings) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {TIMETABLE_COLUMNS}"
        ))
        .bind(new.author_id)
        .bind(&new.name)
        .bind(&new.degrees)
        .bind(new.acad_year)
        .bind(new.year)
        .bind(new.semester)
        .bind(&timings)
        .bind(&exam_times)
        .bind(&warnings)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        for section in &new.sections {
            sqlx::query(LINK_SECTION)
                .bind(record.id)
                .bind(section.id)
                .execute(&mut *tx)
                .await
                .map_err(link_error)?;
        }

        tx.commit().await.map_err(unexpected)?;
        record.to_domain(new.sections)
    }

    async fn commit_section_change(&self, commit: SectionCommit) -> PortResult<()> {
        let timings: Vec<String> = commit.timings.iter().map(encode_timing).collect();
        let warnings: Vec<String> = commit.warnings.iter().map(encode_warning).collect();
        let exam_times: Option<Vec<String>> = commit
            .exam_times
            .as_ref()
            .map(|times| times.iter().map(encode_exam_time).collect());

        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let updated = sqlx::query(
            "UPDATE timetables \
             SET timings = $1, warnings = $2, exam_times = COALESCE($3, exam_times), \
                 version = version + 1, last_updated = now() \
             WHERE id = $4 AND version = $5",
        )
        .bind(&timings)
        .bind(&warnings)
        .bind(&exam_times)
        .bind(commit.timetable_id)
        .bind(commit.expected_version)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?
        .rows_affected();

        if updated == 0 {
            let missed =
                Self::missed_write(&mut tx, commit.timetable_id, commit.expected_version).await;
            return Err(missed);
        }

        match commit.membership {
            Membership::Attach(section_id) => {
                sqlx::query(LINK_SECTION)
                    .bind(commit.timetable_id)
                    .bind(section_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(link_error)?;
            }
            Membership::Detach(section_id) => {
                sqlx::query(UNLINK_SECTION)
                    .bind(commit.timetable_id)
                    .bind(section_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(unexpected)?;
            }
        }

        // Dropping the transaction on any early return rolls it back.
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn update_metadata(
        &self,
        id: TimetableId,
        expected_version: i64,
        edit: &MetadataEdit,
    ) -> PortResult<Timetable> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, TimetableRecord>(&format!(
            "UPDATE timetables \
             SET name = $1, private = $2, draft = $3, version = version + 1, last_updated = now() \
             WHERE id = $4 AND version = $5 \
             RETURNING {TIMETABLE_COLUMNS}"
        ))
        .bind(&edit.name)
        .bind(edit.private)
        .bind(edit.draft)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;

        let Some(record) = record else {
            return Err(Self::missed_write(&mut tx, id, expected_version).await);
        };
        let sections = sections_of(&mut *tx, id).await?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain(sections)
    }

    async fn delete_timetable(&self, id: TimetableId) -> PortResult<()> {
        let deleted = sqlx::query("DELETE FROM timetables WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?
            .rows_affected();
        if deleted == 0 {
            return Err(PortError::NotFound("timetable".to_string()));
        }
        Ok(())
    }
}

//=========================================================================================
// `CatalogService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CatalogService for DbAdapter {
    async fn get_section(&self, section_id: Uuid) -> PortResult<Section> {
        let record = sqlx::query_as::<_, SectionRecord>(&format!(
            "SELECT {SECTION_COLUMNS} FROM sections s WHERE s.id = $1"
        ))
        .bind(section_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("section"))?;
        record.to_domain()
    }

    async fn get_course(&self, course_id: Uuid) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
        ))
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("course"))?;
        Ok(record.to_domain())
    }

    async fn get_offered_section_types(&self, course_id: Uuid) -> PortResult<Vec<SectionType>> {
        let codes: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT type FROM sections WHERE course_id = $1")
                .bind(course_id)
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?;
        codes.iter().map(|code| section_type(code)).collect()
    }

    async fn list_courses(&self) -> PortResult<Vec<Course>> {
        let records = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE archived = false ORDER BY code ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(CourseRecord::to_domain).collect())
    }

    async fn get_course_with_sections(&self, course_id: Uuid) -> PortResult<CourseWithSections> {
        let mut tx = snapshot(&self.pool).await?;

        let course = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
        ))
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(not_found_or_unexpected("course"))?;
        let records = sqlx::query_as::<_, SectionRecord>(&format!(
            "SELECT {SECTION_COLUMNS} FROM sections s \
             WHERE s.course_id = $1 \
             ORDER BY s.type ASC, s.number ASC"
        ))
        .bind(course_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(CourseWithSections {
            course: course.to_domain(),
            sections: records
                .into_iter()
                .map(SectionRecord::to_domain)
                .collect::<PortResult<_>>()?,
        })
    }
}
