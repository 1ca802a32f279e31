//! 孤儿资源扫描
//!
//! 资源的 科目/年级/章节 名称在当前结构树中找不到时即为孤儿。
//! 按层级依次检查：科目 → 年级 → 章节，第一个缺失的层级就是原因。
//! 考试不存在时结构树视为空，该考试下所有资源都是孤儿。
//!
//! 修复动作（移动、删除、批量删除）由 `ResourceRepo` 提供。

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::shelf::database::ShelfDatabase;
use crate::shelf::error::ShelfResult;
use crate::shelf::repos::{ExamRepo, ResourceRepo};
use crate::shelf::types::{ExamStructure, Resource, ResourcePath};

/// 孤儿原因：第一个缺失的层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OrphanReason {
    MissingSubject,
    MissingClass,
    MissingChapter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedResource {
    pub resource: Resource,
    pub reason: OrphanReason,
}

/// 结构树的名称索引
///
/// 同级重名（旧数据）时只索引第一个，和改名的取值规则一致。
struct StructureIndex<'a> {
    subjects: HashMap<&'a str, HashMap<&'a str, HashSet<&'a str>>>,
}

impl<'a> StructureIndex<'a> {
    fn build(structure: &'a ExamStructure) -> Self {
        let mut subjects: HashMap<&str, HashMap<&str, HashSet<&str>>> = HashMap::new();
        for subject in &structure.subjects {
            if subjects.contains_key(subject.name.as_str()) {
                continue;
            }
            let mut classes: HashMap<&str, HashSet<&str>> = HashMap::new();
            for class in &subject.classes {
                classes
                    .entry(class.name.as_str())
                    .or_insert_with(|| class.chapters.iter().map(String::as_str).collect());
            }
            subjects.insert(subject.name.as_str(), classes);
        }
        Self { subjects }
    }

    fn classify(&self, path: &ResourcePath) -> Option<OrphanReason> {
        let Some(classes) = self.subjects.get(path.subject.as_str()) else {
            return Some(OrphanReason::MissingSubject);
        };
        let Some(chapters) = classes.get(path.class_name.as_str()) else {
            return Some(OrphanReason::MissingClass);
        };
        if chapters.contains(path.chapter.as_str()) {
            None
        } else {
            Some(OrphanReason::MissingChapter)
        }
    }
}

/// 判断单个路径在结构树中缺失的层级
pub fn classify_path(structure: &ExamStructure, path: &ResourcePath) -> Option<OrphanReason> {
    StructureIndex::build(structure).classify(path)
}

/// 找出结构树中不存在路径的资源（纯函数）
pub fn find_orphans(structure: &ExamStructure, resources: Vec<Resource>) -> Vec<OrphanedResource> {
    let index = StructureIndex::build(structure);
    resources
        .into_iter()
        .filter_map(|resource| {
            index
                .classify(&resource.path())
                .map(|reason| OrphanedResource { resource, reason })
        })
        .collect()
}

pub struct OrphanScanner;

impl OrphanScanner {
    /// 扫描考试下的孤儿资源，附带缺失层级
    pub fn scan_detailed(db: &ShelfDatabase, exam_id: &str) -> ShelfResult<Vec<OrphanedResource>> {
        let structure = ExamRepo::get_structure(db, exam_id)?;
        let resources = ResourceRepo::list_exam_resources(db, exam_id)?;
        let total = resources.len();

        let orphans = find_orphans(&structure, resources);
        if orphans.is_empty() {
            debug!(
                "[Shelf::OrphanScanner] No orphans in {} ({} resources)",
                exam_id, total
            );
        } else {
            info!(
                "[Shelf::OrphanScanner] Found {}/{} orphaned resources in {}",
                orphans.len(),
                total,
                exam_id
            );
        }
        Ok(orphans)
    }

    /// 扫描考试下的孤儿资源（完整记录）
    pub fn scan_orphans(db: &ShelfDatabase, exam_id: &str) -> ShelfResult<Vec<Resource>> {
        Ok(Self::scan_detailed(db, exam_id)?
            .into_iter()
            .map(|o| o.resource)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shelf::repos::resource_repo::tests::new_resource;
    use crate::shelf::types::{ClassLevel, Subject};
    use tempfile::TempDir;

    fn setup_test_db() -> (TempDir, ShelfDatabase) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = ShelfDatabase::new(temp_dir.path()).expect("Failed to create database");
        (temp_dir, db)
    }

    /// A/X/C1 结构 + 三条资源：只有第一条路径有效
    fn seed(db: &ShelfDatabase) -> Vec<Resource> {
        let structure = ExamStructure {
            subjects: vec![Subject::new("A", vec![ClassLevel::new("X", vec!["C1".into()])])],
        };
        ExamRepo::save_structure(db, "gate", &structure).unwrap();
        vec![
            ResourceRepo::add_resource(db, &new_resource("gate", "A", "X", "C1", "note")).unwrap(),
            ResourceRepo::add_resource(db, &new_resource("gate", "A", "X", "C2", "note")).unwrap(),
            ResourceRepo::add_resource(db, &new_resource("gate", "B", "X", "C1", "note")).unwrap(),
        ]
    }

    fn ids(resources: &[Resource]) -> HashSet<String> {
        resources.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_scan_finds_exactly_the_broken_paths() {
        let (_temp_dir, db) = setup_test_db();
        let seeded = seed(&db);

        let orphans = OrphanScanner::scan_orphans(&db, "gate").unwrap();
        assert_eq!(ids(&orphans), ids(&seeded[1..]));

        let detailed = OrphanScanner::scan_detailed(&db, "gate").unwrap();
        let reasons: HashMap<String, OrphanReason> = detailed
            .into_iter()
            .map(|o| (o.resource.id, o.reason))
            .collect();
        assert_eq!(reasons[&seeded[1].id], OrphanReason::MissingChapter);
        assert_eq!(reasons[&seeded[2].id], OrphanReason::MissingSubject);
    }

    #[test]
    fn test_move_repairs_orphan() {
        let (_temp_dir, db) = setup_test_db();
        let seeded = seed(&db);

        ResourceRepo::move_resource(&db, &seeded[2].id, &ResourcePath::new("A", "X", "C1")).unwrap();
        let orphans = OrphanScanner::scan_orphans(&db, "gate").unwrap();
        assert_eq!(ids(&orphans), ids(&seeded[1..2]));
    }

    #[test]
    fn test_bulk_delete_removes_exactly_those_orphans() {
        let (_temp_dir, db) = setup_test_db();
        seed(&db);
        let extra: Vec<Resource> = (0..3)
            .map(|i| {
                ResourceRepo::add_resource(
                    &db,
                    &new_resource("gate", "A", &format!("Y{}", i), "C1", "pyq"),
                )
                .unwrap()
            })
            .collect();

        let before = OrphanScanner::scan_orphans(&db, "gate").unwrap();
        assert_eq!(before.len(), 5);

        let doomed: Vec<String> = extra.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ResourceRepo::delete_resources(&db, &doomed).unwrap(), 3);
        for id in &doomed {
            assert!(ResourceRepo::get_resource(&db, id).unwrap().is_none());
        }

        let after = OrphanScanner::scan_orphans(&db, "gate").unwrap();
        let expected: HashSet<String> = ids(&before)
            .difference(&ids(&extra))
            .cloned()
            .collect();
        assert_eq!(ids(&after), expected);
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_missing_exam_makes_every_resource_an_orphan() {
        let (_temp_dir, db) = setup_test_db();
        let seeded = seed(&db);
        ExamRepo::delete_exam(&db, "gate").unwrap();

        let orphans = OrphanScanner::scan_detailed(&db, "gate").unwrap();
        assert_eq!(orphans.len(), seeded.len());
        assert!(orphans
            .iter()
            .all(|o| o.reason == OrphanReason::MissingSubject));
    }

    #[test]
    fn test_classify_uses_first_duplicate() {
        let structure = ExamStructure {
            subjects: vec![
                Subject::new("Maths", vec![ClassLevel::new("A", vec!["Sets".into()])]),
                Subject::new("Maths", vec![ClassLevel::new("B", vec!["Limits".into()])]),
            ],
        };
        assert_eq!(
            classify_path(&structure, &ResourcePath::new("Maths", "A", "Sets")),
            None
        );
        assert_eq!(
            classify_path(&structure, &ResourcePath::new("Maths", "B", "Limits")),
            Some(OrphanReason::MissingClass)
        );
    }
}
