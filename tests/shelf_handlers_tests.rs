//! Shelf 命令处理器集成测试
//!
//! 通过 async handler 驱动完整流程，断言统一返回形状和错误码。

use std::collections::HashSet;
use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

use exam_shelf_lib::shelf::handlers::*;
use exam_shelf_lib::shelf::{
    ClassLevel, EventInput, EventType, ExamStructure, NewResource, Resource, ResourceRepo,
    ShelfDatabase, Subject,
};

fn setup() -> (TempDir, Arc<ShelfDatabase>) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = ShelfDatabase::new(temp_dir.path()).expect("Failed to create database");
    (temp_dir, Arc::new(db))
}

fn resource(exam_id: &str, subject: &str, class_name: &str, chapter: &str, kind: &str) -> NewResource {
    NewResource {
        exam_id: exam_id.into(),
        subject: subject.into(),
        class_name: class_name.into(),
        chapter: chapter.into(),
        resource_type: kind.into(),
        title: format!("{} {}", chapter, kind),
        subtitle: None,
        year: None,
        file_url: "https://example.com/file.pdf".into(),
    }
}

async fn add(db: &Arc<ShelfDatabase>, input: NewResource) -> Resource {
    let result = shelf_add_resource(db, input).await;
    assert!(result.success, "add_resource failed: {:?}", result.error);
    result.data.expect("resource")
}

async fn save(db: &Arc<ShelfDatabase>, exam_id: &str, structure: ExamStructure) {
    let result = shelf_save_structure(
        db,
        SaveStructureInput {
            exam_id: exam_id.into(),
            structure,
        },
    )
    .await;
    assert!(result.success, "save_structure failed: {:?}", result.error);
}

fn ids(resources: &[Resource]) -> HashSet<String> {
    resources.iter().map(|r| r.id.clone()).collect()
}

fn jee_structure() -> ExamStructure {
    ExamStructure {
        subjects: vec![
            Subject::new("Maths", vec![ClassLevel::new("Class 11", vec!["Sets".into()])]),
            Subject::new(
                "Physics",
                vec![ClassLevel::new("Class 11", vec!["Kinematics".into()])],
            ),
            Subject::new("Chemistry", vec![]),
        ],
    }
}

#[tokio::test]
async fn rename_subject_updates_tree_and_resources() {
    let (_temp_dir, db) = setup();
    save(&db, "jee", jee_structure()).await;
    let kinematics = add(&db, resource("jee", "Physics", "Class 11", "Kinematics", "note")).await;
    let sets = add(&db, resource("jee", "Maths", "Class 11", "Sets", "note")).await;

    let input = || RenameSubjectInput {
        exam_id: "jee".into(),
        old_name: "Physics".into(),
        new_name: "Physics I".into(),
    };
    let first = shelf_rename_subject(&db, input()).await;
    assert!(first.success);
    assert_eq!(first.data.map(|o| o.resources_updated), Some(1));

    let structure = shelf_get_structure(&db, "jee".into()).await.data.unwrap();
    let names: Vec<&str> = structure.subjects.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Maths", "Physics I", "Chemistry"]);

    let moved = shelf_get_resource(&db, kinematics.id.clone()).await.data.unwrap();
    assert_eq!(moved.subject, "Physics I");
    let untouched = shelf_get_resource(&db, sets.id.clone()).await.data.unwrap();
    assert_eq!(untouched, sets);

    let resources = shelf_list_exam_resources(&db, "jee".into()).await.data.unwrap();
    assert!(resources.iter().all(|r| r.subject != "Physics"));

    // 旧名称已不存在
    let second = shelf_rename_subject(&db, input()).await;
    assert!(!second.success);
    assert_eq!(second.code.as_deref(), Some("ItemNotFound"));
}

#[tokio::test]
async fn rename_of_missing_path_reports_not_found_and_changes_nothing() {
    let (_temp_dir, db) = setup();
    save(&db, "jee", jee_structure()).await;
    add(&db, resource("jee", "Physics", "Class 11", "Kinematics", "note")).await;
    let before = shelf_list_exam_resources(&db, "jee".into()).await.data.unwrap();

    let class = shelf_rename_class(
        &db,
        RenameClassInput {
            exam_id: "jee".into(),
            subject: "Physics".into(),
            old_name: "Class 12".into(),
            new_name: "XII".into(),
        },
    )
    .await;
    assert_eq!(class.code.as_deref(), Some("ItemNotFound"));

    let chapter = shelf_rename_chapter(
        &db,
        RenameChapterInput {
            exam_id: "jee".into(),
            subject: "Biology".into(),
            class_name: "Class 11".into(),
            old_name: "Cells".into(),
            new_name: "Cell Biology".into(),
        },
    )
    .await;
    assert!(!chapter.success);
    assert_eq!(chapter.code.as_deref(), Some("ItemNotFound"));
    assert!(chapter.error.unwrap().contains("Subject not found"));

    assert_eq!(
        shelf_get_structure(&db, "jee".into()).await.data,
        Some(jee_structure())
    );
    assert_eq!(
        shelf_list_exam_resources(&db, "jee".into()).await.data,
        Some(before)
    );
    assert_eq!(
        shelf_list_pending_cascades(&db).await.data.map(|p| p.len()),
        Some(0)
    );
}

#[tokio::test]
async fn orphan_scan_and_repairs() {
    let (_temp_dir, db) = setup();
    save(
        &db,
        "gate",
        ExamStructure {
            subjects: vec![Subject::new("A", vec![ClassLevel::new("X", vec!["C1".into()])])],
        },
    )
    .await;
    let valid = add(&db, resource("gate", "A", "X", "C1", "note")).await;
    let wrong_chapter = add(&db, resource("gate", "A", "X", "C2", "note")).await;
    let wrong_subject = add(&db, resource("gate", "B", "X", "C1", "note")).await;

    let orphans = shelf_scan_orphans(&db, "gate".into()).await.data.unwrap();
    assert_eq!(
        ids(&orphans),
        ids(&[wrong_chapter.clone(), wrong_subject.clone()])
    );
    assert!(!ids(&orphans).contains(&valid.id));

    // 移动修复
    let moved = shelf_move_resource(
        &db,
        MoveResourceInput {
            id: wrong_chapter.id.clone(),
            subject: "A".into(),
            class_name: "X".into(),
            chapter: "C1".into(),
        },
    )
    .await;
    assert!(moved.success);
    let orphans = shelf_scan_orphans(&db, "gate".into()).await.data.unwrap();
    assert_eq!(ids(&orphans), ids(&[wrong_subject.clone()]));

    // 批量删除
    let extra = vec![
        add(&db, resource("gate", "B", "Y", "C9", "pyq")).await,
        add(&db, resource("gate", "A", "Z", "C1", "pyq")).await,
    ];
    let before = shelf_scan_orphans(&db, "gate".into()).await.data.unwrap();
    assert_eq!(before.len(), 3);

    let doomed: Vec<String> = extra.iter().map(|r| r.id.clone()).collect();
    let deleted = shelf_delete_resources(&db, doomed.clone()).await;
    assert_eq!(deleted.data, Some(2));
    for id in doomed {
        let fetched = shelf_get_resource(&db, id).await;
        assert_eq!(fetched.code.as_deref(), Some("ItemNotFound"));
    }
    let after = shelf_scan_orphans(&db, "gate".into()).await.data.unwrap();
    assert_eq!(ids(&after), ids(&[wrong_subject.clone()]));

    let single = shelf_delete_resource(&db, wrong_subject.id.clone()).await;
    assert!(single.success);
    assert!(shelf_scan_orphans(&db, "gate".into()).await.data.unwrap().is_empty());
}

#[tokio::test]
async fn deleted_exam_leaves_resources_as_orphans() {
    let (_temp_dir, db) = setup();
    save(&db, "jee", jee_structure()).await;
    let r = add(&db, resource("jee", "Maths", "Class 11", "Sets", "note")).await;

    assert!(shelf_delete_exam(&db, "jee".into()).await.success);
    assert!(shelf_get_structure(&db, "jee".into()).await.data.unwrap().subjects.is_empty());

    let orphans = shelf_scan_orphans(&db, "jee".into()).await.data.unwrap();
    assert_eq!(ids(&orphans), ids(&[r]));
}

#[tokio::test]
async fn resource_type_rename_touches_only_matching_resources() {
    let (_temp_dir, db) = setup();
    let note_a = add(&db, resource("jee", "Maths", "Class 11", "Sets", "note")).await;
    let note_b = add(&db, resource("neet", "Biology", "Class 12", "Cells", "note")).await;
    let practice = add(&db, resource("jee", "Maths", "Class 11", "Sets", "practice")).await;

    let outcome = shelf_rename_resource_type(
        &db,
        RenameTypeInput {
            old_name: "note".into(),
            new_name: "notes".into(),
        },
    )
    .await;
    assert!(outcome.success);
    assert_eq!(
        shelf_get_resource_types(&db).await.data,
        Some(vec!["notes".to_string(), "pyq".to_string(), "practice".to_string()])
    );

    for id in [note_a.id, note_b.id] {
        let r = shelf_get_resource(&db, id).await.data.unwrap();
        assert_eq!(r.resource_type, "notes");
    }
    assert_eq!(
        shelf_get_resource(&db, practice.id.clone()).await.data,
        Some(practice)
    );

    let missing = shelf_rename_resource_type(
        &db,
        RenameTypeInput {
            old_name: "video".into(),
            new_name: "videos".into(),
        },
    )
    .await;
    assert_eq!(missing.code.as_deref(), Some("ItemNotFound"));
}

#[tokio::test]
async fn duplicate_sibling_names_are_rejected() {
    let (_temp_dir, db) = setup();
    let result = shelf_save_structure(
        &db,
        SaveStructureInput {
            exam_id: "jee".into(),
            structure: ExamStructure {
                subjects: vec![Subject::new("Maths", vec![]), Subject::new("Maths", vec![])],
            },
        },
    )
    .await;
    assert!(!result.success);
    assert_eq!(result.code.as_deref(), Some("ValidationError"));

    save(&db, "jee", jee_structure()).await;
    let conflict = shelf_rename_subject(
        &db,
        RenameSubjectInput {
            exam_id: "jee".into(),
            old_name: "Maths".into(),
            new_name: "Physics".into(),
        },
    )
    .await;
    assert_eq!(conflict.code.as_deref(), Some("ValidationError"));
}

#[tokio::test]
async fn chapter_groups_follow_chapter_type_order() {
    let (_temp_dir, db) = setup();
    save(&db, "jee", jee_structure()).await;
    add(&db, resource("jee", "Maths", "Class 11", "Sets", "note")).await;
    add(&db, resource("jee", "Maths", "Class 11", "Sets", "pyq")).await;
    add(&db, resource("jee", "Maths", "Class 11", "Sets", "flashcards")).await;

    let chapter = || ChapterInput {
        exam_id: "jee".into(),
        subject: "Maths".into(),
        class_name: "Class 11".into(),
        chapter: "Sets".into(),
        resource_type: None,
    };

    let groups = shelf_list_chapter_groups(&db, chapter()).await.data.unwrap();
    let order: Vec<&str> = groups.iter().map(|g| g.resource_type.as_str()).collect();
    assert_eq!(order, vec!["note", "pyq", "flashcards"]);

    let saved = shelf_save_chapter_type_order(
        &db,
        SaveChapterTypeOrderInput {
            exam_id: "jee".into(),
            subject: "Maths".into(),
            class_name: "Class 11".into(),
            chapter: "Sets".into(),
            type_order: vec!["pyq".into(), "note".into()],
        },
    )
    .await;
    assert!(saved.success);

    assert_eq!(
        shelf_get_chapter_type_order(&db, chapter()).await.data,
        Some(vec!["pyq".to_string(), "note".to_string()])
    );
    let groups = shelf_list_chapter_groups(&db, chapter()).await.data.unwrap();
    let order: Vec<&str> = groups.iter().map(|g| g.resource_type.as_str()).collect();
    assert_eq!(order, vec!["pyq", "note", "flashcards"]);

    let mut only_pyq = chapter();
    only_pyq.resource_type = Some("pyq".into());
    let listed = shelf_list_chapter_resources(&db, only_pyq).await.data.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn events_and_suggestions() {
    let (_temp_dir, db) = setup();
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
    let event = |title: &str, date| EventInput {
        title: title.into(),
        date,
        event_type: EventType::Registration,
        description: None,
        exam_id: Some("jee".into()),
    };

    assert!(shelf_add_event(&db, event("Closed", now - Duration::days(3))).await.success);
    let open = shelf_add_event(&db, event("Opens", now + Duration::days(3))).await.data.unwrap();

    let upcoming = shelf_upcoming_events(
        &db,
        UpcomingEventsInput {
            now: Some(now),
            limit: 10,
            exam_id: Some("jee".into()),
        },
    )
    .await
    .data
    .unwrap();
    assert_eq!(upcoming, vec![open.clone()]);

    let all = shelf_list_events(&db, EventFilterInput::default()).await.data.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].date < all[1].date);

    let missing = shelf_delete_event(&db, "evt_missing".into()).await;
    assert_eq!(missing.code.as_deref(), Some("ItemNotFound"));

    let suggestion = shelf_add_suggestion(&db, "More PYQs for NEET".into()).await;
    assert!(suggestion.success);
    let empty = shelf_add_suggestion(&db, "   ".into()).await;
    assert_eq!(empty.code.as_deref(), Some("ValidationError"));
    assert_eq!(shelf_list_suggestions(&db).await.data.map(|s| s.len()), Some(1));
}

#[tokio::test]
async fn validation_happens_before_any_write() {
    let (_temp_dir, db) = setup();
    let mut input = resource("jee", "Maths", "Class 11", "Sets", "note");
    input.chapter = "  ".into();
    let result = shelf_add_resource(&db, input).await;
    assert_eq!(result.code.as_deref(), Some("ValidationError"));
    assert_matches!(ResourceRepo::list_exam_resources(&db, "jee"), Ok(v) if v.is_empty());
}
