mod common;

use common::{harness, IndexCall};
use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use timetable_core::codec::encode_warning;
use timetable_core::{ConflictKind, EngineError, ExamKind, MetadataEdit, SectionType, Timetable};
use uuid::Uuid;

fn warnings(t: &Timetable) -> Vec<String> {
    t.warnings.iter().map(encode_warning).collect()
}

fn publish() -> MetadataEdit {
    MetadataEdit {
        name: "Sem 1".to_string(),
        private: false,
        draft: false,
    }
}

#[tokio::test]
async fn create_stamps_term_and_year_from_batch() {
    let h = harness();
    let user = h.db.add_user(2022);

    let t = h.engine.create_timetable(user).await.unwrap();
    assert_eq!(t.name, "Untitled Timetable");
    assert_eq!(t.year, 3);
    assert_eq!(t.acad_year, 2024);
    assert!(t.draft && t.private && !t.archived);
    assert!(t.sections.is_empty() && t.timings.is_empty());
}

#[tokio::test]
async fn unknown_user_cannot_create() {
    let h = harness();
    assert!(matches!(
        h.engine.create_timetable(Uuid::new_v4()).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn warnings_follow_section_types_as_they_are_added() {
    let h = harness();
    let user = h.db.add_user(2023);
    let cs = h.db.add_course("CS F211", Some((9, 10)), None);
    let l = h.db.add_section(&cs, SectionType::Lecture, &["M:2"]);
    let p = h.db.add_section(&cs, SectionType::Practical, &["T:4", "T:5"]);
    let tut = h.db.add_section(&cs, SectionType::Tutorial, &["F:1"]);
    let l2 = h.db.add_section(&cs, SectionType::Lecture, &["W:8"]);
    let t = h.engine.create_timetable(user).await.unwrap();

    let t = h.engine.add_section(user, t.id, l.id).await.unwrap();
    assert_eq!(warnings(&t), vec!["CS F211:PT"]);
    let t = h.engine.add_section(user, t.id, p.id).await.unwrap();
    assert_eq!(warnings(&t), vec!["CS F211:T"]);
    let t = h.engine.add_section(user, t.id, tut.id).await.unwrap();
    assert!(t.warnings.is_empty());
    assert_eq!(t.timings.len(), 4);
    assert_eq!(t.exam_times.len(), 1);

    let err = h.engine.add_section(user, t.id, l2.id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Conflict(ConflictKind::DuplicateSectionType {
            section_type: SectionType::Lecture,
            ..
        })
    ));
}

#[tokio::test]
async fn overlapping_midsems_are_refused() {
    let h = harness();
    let user = h.db.add_user(2023);
    let math = h.db.add_course("MATH F111", Some((10, 12)), None);
    let phy = h.db.add_course("PHY F111", Some((11, 13)), None);
    let math_l = h.db.add_section(&math, SectionType::Lecture, &["M:1"]);
    let phy_l = h.db.add_section(&phy, SectionType::Lecture, &["M:3"]);
    let t = h.engine.create_timetable(user).await.unwrap();

    h.engine.add_section(user, t.id, math_l.id).await.unwrap();
    match h.engine.add_section(user, t.id, phy_l.id).await.unwrap_err() {
        EngineError::Conflict(ConflictKind::ExamHourClash { course_code, exam }) => {
            assert_eq!(course_code, "MATH F111");
            assert_eq!(exam, ExamKind::Midsem);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.db.stored(t.id).sections.len(), 1);
}

#[tokio::test]
async fn add_then_remove_restores_the_timetable() {
    let h = harness();
    let user = h.db.add_user(2023);
    let cs = h.db.add_course("CS F211", Some((9, 10)), Some((9, 12)));
    let math = h.db.add_course("MATH F111", Some((14, 15)), None);
    let cs_l = h.db.add_section(&cs, SectionType::Lecture, &["M:2"]);
    h.db.add_section(&cs, SectionType::Practical, &["T:4"]);
    let math_l = h.db.add_section(&math, SectionType::Lecture, &["W:2", "F:2"]);
    let t = h.engine.create_timetable(user).await.unwrap();
    let before = h.engine.add_section(user, t.id, cs_l.id).await.unwrap();

    h.engine.add_section(user, t.id, math_l.id).await.unwrap();
    let after = h.engine.remove_section(user, t.id, math_l.id).await.unwrap();

    assert_eq!(after.sections, before.sections);
    assert_eq!(after.timings, before.timings);
    assert_eq!(after.exam_times, before.exam_times);
    assert_eq!(after.warnings, before.warnings);
}

#[tokio::test]
async fn failed_commit_leaves_no_partial_state() {
    let h = harness();
    let user = h.db.add_user(2023);
    let cs = h.db.add_course("CS F211", Some((9, 10)), None);
    let l = h.db.add_section(&cs, SectionType::Lecture, &["M:2"]);
    let t = h.engine.create_timetable(user).await.unwrap();

    h.db.fail_commits.store(true, Ordering::SeqCst);
    assert!(matches!(
        h.engine.add_section(user, t.id, l.id).await,
        Err(EngineError::Internal(_))
    ));
    let stored = h.db.stored(t.id);
    assert!(stored.sections.is_empty());
    assert!(stored.timings.is_empty() && stored.exam_times.is_empty());
    assert!(stored.warnings.is_empty());
}

#[tokio::test]
async fn stale_version_surfaces_as_concurrent_modification() {
    let h = harness();
    let user = h.db.add_user(2023);
    let cs = h.db.add_course("CS F211", None, None);
    let l = h.db.add_section(&cs, SectionType::Lecture, &["M:2"]);
    let t = h.engine.create_timetable(user).await.unwrap();

    // Another process wins the race between our read and our write.
    let stale = h.db.stored(t.id);
    h.db.bump_version(t.id);

    let commit = timetable_core::mutation::plan_add(
        &stale,
        &l,
        &cs,
        &BTreeSet::from([SectionType::Lecture]),
    )
    .unwrap();
    let err: EngineError = timetable_core::DatabaseService::commit_section_change(&*h.db, commit)
        .await
        .unwrap_err()
        .into();
    assert!(matches!(err, EngineError::Conflict(ConflictKind::ConcurrentModification)));
}

#[tokio::test]
async fn concurrent_adds_cannot_both_take_the_same_slot() {
    let h = std::sync::Arc::new(harness());
    let user = h.db.add_user(2023);
    let a = h.db.add_course("CS F211", None, None);
    let b = h.db.add_course("CS F212", None, None);
    let a_l = h.db.add_section(&a, SectionType::Lecture, &["M:2"]);
    let b_l = h.db.add_section(&b, SectionType::Lecture, &["M:2"]);
    let t = h.engine.create_timetable(user).await.unwrap();

    let first = {
        let h = h.clone();
        tokio::spawn(async move { h.engine.add_section(user, t.id, a_l.id).await })
    };
    let second = {
        let h = h.clone();
        tokio::spawn(async move { h.engine.add_section(user, t.id, b_l.id).await })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(h.db.stored(t.id).timings.len(), 1);
}

#[tokio::test]
async fn only_the_owner_may_mutate_and_strangers_cannot_see_drafts() {
    let h = harness();
    let owner = h.db.add_user(2023);
    let stranger = h.db.add_user(2023);
    let cs = h.db.add_course("CS F211", None, None);
    let l = h.db.add_section(&cs, SectionType::Lecture, &["M:2"]);
    let t = h.engine.create_timetable(owner).await.unwrap();

    assert!(matches!(
        h.engine.add_section(stranger, t.id, l.id).await,
        Err(EngineError::Forbidden)
    ));
    assert!(matches!(
        h.engine.get_timetable(stranger, t.id).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        h.engine.delete_timetable(stranger, t.id).await,
        Err(EngineError::Forbidden)
    ));
}

#[tokio::test]
async fn publishing_is_guarded_and_indexed_once() {
    let h = harness();
    let user = h.db.add_user(2023);
    let cs = h.db.add_course("CS F211", None, None);
    let l = h.db.add_section(&cs, SectionType::Lecture, &["M:2"]);
    let tut = h.db.add_section(&cs, SectionType::Tutorial, &["F:9"]);
    let t = h.engine.create_timetable(user).await.unwrap();

    assert!(matches!(
        h.engine.edit_metadata(user, t.id, publish()).await,
        Err(EngineError::Conflict(ConflictKind::PublishEmpty))
    ));
    h.engine.add_section(user, t.id, l.id).await.unwrap();
    assert!(matches!(
        h.engine.edit_metadata(user, t.id, publish()).await,
        Err(EngineError::Conflict(ConflictKind::PublishWithWarnings))
    ));
    assert!(h.index.calls().is_empty());

    h.engine.add_section(user, t.id, tut.id).await.unwrap();
    let published = h.engine.edit_metadata(user, t.id, publish()).await.unwrap();
    assert!(!published.draft && !published.private);
    assert_eq!(published.name, "Sem 1");
    assert_eq!(h.index.calls(), vec![IndexCall::Add(t.id)]);

    // Published timetables are readable by anyone but closed to new sections.
    let stranger = h.db.add_user(2020);
    assert!(h.engine.get_timetable(stranger, t.id).await.is_ok());
    let extra = h.db.add_section(&cs, SectionType::Practical, &["Th:7"]);
    assert!(matches!(
        h.engine.add_section(user, t.id, extra.id).await,
        Err(EngineError::Conflict(ConflictKind::NotDraft))
    ));
}

#[tokio::test]
async fn unpublishing_removes_from_the_index() {
    let h = harness();
    let user = h.db.add_user(2023);
    let cs = h.db.add_course("CS F211", None, None);
    let l = h.db.add_section(&cs, SectionType::Lecture, &["M:2"]);
    let t = h.engine.create_timetable(user).await.unwrap();
    h.engine.add_section(user, t.id, l.id).await.unwrap();
    h.engine.edit_metadata(user, t.id, publish()).await.unwrap();

    let private = MetadataEdit {
        name: "Sem 1".to_string(),
        private: true,
        draft: false,
    };
    h.engine.edit_metadata(user, t.id, private).await.unwrap();
    assert_eq!(h.index.calls(), vec![IndexCall::Add(t.id), IndexCall::Remove(t.id)]);
}

#[tokio::test]
async fn index_failure_fails_the_publish_and_reverts_flags() {
    let h = harness();
    let user = h.db.add_user(2023);
    let cs = h.db.add_course("CS F211", None, None);
    let l = h.db.add_section(&cs, SectionType::Lecture, &["M:2"]);
    let t = h.engine.create_timetable(user).await.unwrap();
    h.engine.add_section(user, t.id, l.id).await.unwrap();

    h.index.fail.store(true, Ordering::SeqCst);
    assert!(matches!(
        h.engine.edit_metadata(user, t.id, publish()).await,
        Err(EngineError::Upstream(_))
    ));
    let stored = h.db.stored(t.id);
    assert!(stored.draft && stored.private);
    assert_eq!(stored.name, "Untitled Timetable");
}

#[tokio::test]
async fn sections_can_be_removed_from_a_published_timetable_but_not_an_archived_one() {
    let h = harness();
    let user = h.db.add_user(2023);
    let cs = h.db.add_course("CS F211", None, None);
    let l = h.db.add_section(&cs, SectionType::Lecture, &["M:2"]);
    let t = h.engine.create_timetable(user).await.unwrap();
    h.engine.add_section(user, t.id, l.id).await.unwrap();

    h.db.set_flags(t.id, false, false, true);
    assert!(matches!(
        h.engine.remove_section(user, t.id, l.id).await,
        Err(EngineError::Conflict(ConflictKind::TimetableArchived))
    ));

    h.db.set_flags(t.id, false, false, false);
    let t = h.engine.remove_section(user, t.id, l.id).await.unwrap();
    assert!(t.sections.is_empty() && t.timings.is_empty());
}

#[tokio::test]
async fn copy_duplicates_contents_into_a_private_draft() {
    let h = harness();
    let owner = h.db.add_user(2023);
    let copier = h.db.add_user(2022);
    let cs = h.db.add_course("CS F211", Some((9, 10)), None);
    let l = h.db.add_section(&cs, SectionType::Lecture, &["M:2"]);
    h.db.add_section(&cs, SectionType::Practical, &["T:2"]);
    let t = h.engine.create_timetable(owner).await.unwrap();
    let source = h.engine.add_section(owner, t.id, l.id).await.unwrap();

    // A private source is invisible to others.
    assert!(matches!(
        h.engine.copy_timetable(copier, t.id).await,
        Err(EngineError::NotFound(_))
    ));

    let copy = h.engine.copy_timetable(owner, t.id).await.unwrap();
    assert_ne!(copy.id, source.id);
    assert!(copy.draft && copy.private);
    assert_eq!(copy.sections, source.sections);
    assert_eq!(copy.timings, source.timings);
    assert_eq!(copy.exam_times, source.exam_times);
    assert_eq!(warnings(&copy), vec!["CS F211:P"]);

    h.db.set_flags(t.id, false, false, true);
    assert!(matches!(
        h.engine.copy_timetable(copier, t.id).await,
        Err(EngineError::Conflict(ConflictKind::CopyArchived))
    ));
}

#[tokio::test]
async fn deleting_a_draft_never_touches_the_index() {
    let h = harness();
    let user = h.db.add_user(2023);
    let t = h.engine.create_timetable(user).await.unwrap();

    h.index.fail.store(true, Ordering::SeqCst);
    h.engine.delete_timetable(user, t.id).await.unwrap();
    assert!(h.index.calls().is_empty());
    assert!(matches!(
        h.engine.get_timetable(user, t.id).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn deleting_a_published_timetable_removes_it_from_index_then_store() {
    let h = harness();
    let user = h.db.add_user(2023);
    let t = h.engine.create_timetable(user).await.unwrap();
    h.db.set_flags(t.id, false, false, false);

    h.index.fail.store(true, Ordering::SeqCst);
    assert!(matches!(
        h.engine.delete_timetable(user, t.id).await,
        Err(EngineError::Upstream(_))
    ));
    assert!(h.engine.get_timetable(user, t.id).await.is_ok());

    h.index.fail.store(false, Ordering::SeqCst);
    h.engine.delete_timetable(user, t.id).await.unwrap();
    assert_eq!(h.index.calls(), vec![IndexCall::Remove(t.id)]);
    assert!(matches!(
        h.engine.get_timetable(user, t.id).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn section_changes_answer_with_the_committed_state_in_one_read() {
    let h = harness();
    let user = h.db.add_user(2023);
    let cs = h.db.add_course("CS F211", Some((9, 10)), None);
    let l = h.db.add_section(&cs, SectionType::Lecture, &["M:2", "W:2"]);
    h.db.add_section(&cs, SectionType::Practical, &["T:4"]);
    let t = h.engine.create_timetable(user).await.unwrap();

    let added = h.engine.add_section(user, t.id, l.id).await.unwrap();
    assert_eq!(h.db.reads(), 1);
    let stored = h.db.stored(t.id);
    assert_eq!(added.version, stored.version);
    assert_eq!(added.sections, stored.sections);
    assert_eq!(added.timings, stored.timings);
    assert_eq!(added.exam_times, stored.exam_times);
    assert_eq!(added.warnings, stored.warnings);

    let removed = h.engine.remove_section(user, t.id, l.id).await.unwrap();
    assert_eq!(h.db.reads(), 2);
    let stored = h.db.stored(t.id);
    assert_eq!(removed.version, stored.version);
    assert!(removed.sections.is_empty() && removed.timings.is_empty());
    assert_eq!(removed.warnings, stored.warnings);
}

#[tokio::test]
async fn store_read_failures_are_internal() {
    let h = harness();
    let user = h.db.add_user(2023);
    let t = h.engine.create_timetable(user).await.unwrap();

    h.db.fail_reads.store(true, Ordering::SeqCst);
    assert!(matches!(
        h.engine.get_timetable(user, t.id).await,
        Err(EngineError::Internal(_))
    ));
    assert!(matches!(
        h.engine.delete_timetable(user, t.id).await,
        Err(EngineError::Internal(_))
    ));
}

#[tokio::test]
async fn course_listing_skips_archived_courses_and_sorts_by_code() {
    let h = harness();
    let phy = h.db.add_course("PHY F111", None, None);
    let cs = h.db.add_course("CS F211", None, None);
    let old = h.db.add_course("BITS F110", None, None);
    h.db.archive_course(old.id);

    let codes: Vec<String> = h
        .engine
        .list_courses()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.code)
        .collect();
    assert_eq!(codes, vec![cs.code, phy.code]);
}

#[tokio::test]
async fn course_detail_carries_every_section() {
    let h = harness();
    let cs = h.db.add_course("CS F211", Some((9, 10)), None);
    let other = h.db.add_course("MATH F111", None, None);
    let p = h.db.add_section(&cs, SectionType::Practical, &["T:4"]);
    let l = h.db.add_section(&cs, SectionType::Lecture, &["M:2"]);
    h.db.add_section(&other, SectionType::Lecture, &["M:3"]);

    let detail = h.engine.course_with_sections(cs.id).await.unwrap();
    assert_eq!(detail.course.code, "CS F211");
    let ids: Vec<Uuid> = detail.sections.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![l.id, p.id]);

    assert!(matches!(
        h.engine.course_with_sections(Uuid::new_v4()).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn unknown_section_is_not_found() {
    let h = harness();
    let user = h.db.add_user(2023);
    let t = h.engine.create_timetable(user).await.unwrap();
    assert!(matches!(
        h.engine.add_section(user, t.id, Uuid::new_v4()).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        h.engine.remove_section(user, t.id, Uuid::new_v4()).await,
        Err(EngineError::NotFound(_))
    ));
}
