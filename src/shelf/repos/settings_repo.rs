//! 设置表：资源类型列表 + 章节级类型显示顺序
//!
//! - `settings` 表中 `resource-types` 一行保存全局有序类型列表 `{ "types": [...] }`
//! - `chapter_settings` 表按 (exam_id, 章节复合键) 保存类型顺序覆盖
//!
//! 章节复合键由三个名称各自 URL 编码后以 `|` 连接（`|` 在编码后的片段中不会出现）。

use chrono::Utc;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

use crate::shelf::database::ShelfDatabase;
use crate::shelf::error::{ShelfError, ShelfResult};
use crate::shelf::repos::resource_repo::ResourceRepo;
use crate::shelf::structure::{validate_name, RenameTarget};
use crate::shelf::types::{Resource, ResourceGroup, ResourcePath};

/// 未配置时的默认资源类型
pub const DEFAULT_RESOURCE_TYPES: [&str; 3] = ["note", "pyq", "practice"];

const RESOURCE_TYPES_KEY: &str = "resource-types";

const CHAPTER_KEY_SEPARATOR: char = '|';

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

#[derive(Debug, Serialize, Deserialize)]
struct ResourceTypesDoc {
    types: Vec<String>,
}

/// 格式化类型名：去首尾空白、小写、连续空白替换为 `-`
pub fn format_type_name(raw: &str) -> ShelfResult<String> {
    validate_name("type", raw)?;
    Ok(WHITESPACE_RUN
        .replace_all(&raw.trim().to_lowercase(), "-")
        .into_owned())
}

/// 章节复合键
pub fn chapter_key(path: &ResourcePath) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        urlencoding::encode(&path.subject),
        urlencoding::encode(&path.class_name),
        urlencoding::encode(&path.chapter),
        sep = CHAPTER_KEY_SEPARATOR
    )
}

/// 解析章节复合键；格式不对时返回 None
pub fn parse_chapter_key(key: &str) -> Option<ResourcePath> {
    let mut parts = key.split(CHAPTER_KEY_SEPARATOR);
    let subject = urlencoding::decode(parts.next()?).ok()?;
    let class_name = urlencoding::decode(parts.next()?).ok()?;
    let chapter = urlencoding::decode(parts.next()?).ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(ResourcePath::new(subject, class_name, chapter))
}

/// 决定类型显示顺序
///
/// 章节覆盖存在且过滤掉未知类型后非空时使用覆盖，否则使用全局顺序。
pub fn resolve_type_order(global: &[String], chapter_order: Option<&[String]>) -> Vec<String> {
    if let Some(order) = chapter_order {
        let filtered: Vec<String> = order
            .iter()
            .filter(|t| global.contains(t))
            .cloned()
            .collect();
        if !filtered.is_empty() {
            return filtered;
        }
    }
    global.to_vec()
}

/// 按类型分组并排序分组
///
/// 在顺序表中的类型按位置排列，不在表中的排在后面并按字母序。组内保持输入顺序。
pub fn group_resources_by_type(resources: Vec<Resource>, order: &[String]) -> Vec<ResourceGroup> {
    let mut grouped: BTreeMap<String, Vec<Resource>> = BTreeMap::new();
    for resource in resources {
        grouped
            .entry(resource.resource_type.clone())
            .or_default()
            .push(resource);
    }

    let mut groups: Vec<ResourceGroup> = grouped
        .into_iter()
        .map(|(resource_type, resources)| ResourceGroup {
            resource_type,
            resources,
        })
        .collect();

    // BTreeMap 已按字母序，稳定排序只需把已知类型按位置提前
    groups.sort_by_key(|g| {
        order
            .iter()
            .position(|t| *t == g.resource_type)
            .unwrap_or(usize::MAX)
    });
    groups
}

/// 类型重命名结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRenameOutcome {
    pub types: Vec<String>,
    pub resources_updated: usize,
    pub chapter_orders_updated: usize,
}

/// 设置表 Repo
pub struct SettingsRepo;

impl SettingsRepo {
    // ========================================================================
    // 资源类型
    // ========================================================================

    /// 全局类型列表（未配置时返回默认值）
    pub fn get_resource_types(db: &ShelfDatabase) -> ShelfResult<Vec<String>> {
        let conn = db.get_conn()?;
        Self::get_resource_types_with_conn(&conn)
    }

    pub fn get_resource_types_with_conn(conn: &Connection) -> ShelfResult<Vec<String>> {
        let json: Option<String> = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?1",
                params![RESOURCE_TYPES_KEY],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(serde_json::from_str::<ResourceTypesDoc>(&json)?.types),
            None => Ok(DEFAULT_RESOURCE_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect()),
        }
    }

    fn write_resource_types_with_conn(conn: &Connection, types: &[String]) -> ShelfResult<()> {
        let doc = ResourceTypesDoc {
            types: types.to_vec(),
        };
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json,
                                            updated_at = excluded.updated_at",
            params![RESOURCE_TYPES_KEY, serde_json::to_string(&doc)?, Utc::now()],
        )?;
        Ok(())
    }

    /// 整体替换类型列表（拖拽排序）；名称被格式化并去重
    pub fn set_resource_types(db: &ShelfDatabase, types: &[String]) -> ShelfResult<Vec<String>> {
        let mut formatted: Vec<String> = Vec::with_capacity(types.len());
        for raw in types {
            let name = format_type_name(raw)?;
            if !formatted.contains(&name) {
                formatted.push(name);
            }
        }

        let conn = db.get_conn()?;
        Self::write_resource_types_with_conn(&conn, &formatted)?;
        info!("[Shelf::SettingsRepo] Resource types set: {:?}", formatted);
        Ok(formatted)
    }

    /// 追加新类型
    pub fn add_resource_type(db: &ShelfDatabase, raw: &str) -> ShelfResult<Vec<String>> {
        let name = format_type_name(raw)?;

        let mut conn = db.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut types = Self::get_resource_types_with_conn(&tx)?;
        if types.contains(&name) {
            return Err(ShelfError::validation(format!(
                "type '{}' already exists",
                name
            )));
        }
        types.push(name.clone());
        Self::write_resource_types_with_conn(&tx, &types)?;
        tx.commit()?;

        info!("[Shelf::SettingsRepo] Added resource type '{}'", name);
        Ok(types)
    }

    /// 删除类型；已有资源保留该标签，只是不再可选
    pub fn delete_resource_type(db: &ShelfDatabase, name: &str) -> ShelfResult<Vec<String>> {
        let mut conn = db.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut types = Self::get_resource_types_with_conn(&tx)?;
        let idx = types
            .iter()
            .position(|t| t == name)
            .ok_or_else(|| ShelfError::ResourceTypeNotFound(name.to_string()))?;
        types.remove(idx);
        Self::write_resource_types_with_conn(&tx, &types)?;
        tx.commit()?;

        info!("[Shelf::SettingsRepo] Deleted resource type '{}'", name);
        Ok(types)
    }

    /// 重命名类型并级联到资源
    ///
    /// 1. 事务内更新类型列表（原位置替换）
    /// 2. 单独的批量写：改写所有 `type == old` 的资源和章节顺序覆盖
    ///
    /// 第 2 步失败时第 1 步已提交，返回 Internal。
    pub fn rename_resource_type(
        db: &ShelfDatabase,
        old: &str,
        new_raw: &str,
    ) -> ShelfResult<TypeRenameOutcome> {
        let new_name = format_type_name(new_raw)?;

        let mut conn = db.get_conn()?;

        let types = {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut types = Self::get_resource_types_with_conn(&tx)?;
            let idx = types
                .iter()
                .position(|t| t == old)
                .ok_or_else(|| ShelfError::ResourceTypeNotFound(old.to_string()))?;
            if new_name != old && types.contains(&new_name) {
                return Err(ShelfError::validation(format!(
                    "type '{}' already exists",
                    new_name
                )));
            }
            types[idx] = new_name.clone();
            Self::write_resource_types_with_conn(&tx, &types)?;
            tx.commit()?;
            types
        };

        if new_name == old {
            return Ok(TypeRenameOutcome {
                types,
                resources_updated: 0,
                chapter_orders_updated: 0,
            });
        }

        let cascade = (|| -> ShelfResult<(usize, usize)> {
            let tx = conn.transaction()?;
            let ids = ResourceRepo::find_ids_by_type_with_conn(&tx, old)?;
            let resources_updated = ResourceRepo::rewrite_type_with_conn(&tx, &ids, &new_name)?;
            let chapter_orders_updated =
                Self::rename_type_in_chapter_orders_with_conn(&tx, old, &new_name)?;
            tx.commit()?;
            Ok((resources_updated, chapter_orders_updated))
        })();

        match cascade {
            Ok((resources_updated, chapter_orders_updated)) => {
                info!(
                    "[Shelf::SettingsRepo] Renamed type '{}' -> '{}' ({} resources, {} chapter orders)",
                    old, new_name, resources_updated, chapter_orders_updated
                );
                Ok(TypeRenameOutcome {
                    types,
                    resources_updated,
                    chapter_orders_updated,
                })
            }
            Err(e) => {
                error!(
                    "[Shelf::SettingsRepo] Type list renamed '{}' -> '{}' but resource rewrite failed: {}",
                    old, new_name, e
                );
                Err(ShelfError::Internal(format!(
                    "type list updated but resources still use '{}': {}",
                    old, e
                )))
            }
        }
    }

    fn rename_type_in_chapter_orders_with_conn(
        conn: &Connection,
        old: &str,
        new_name: &str,
    ) -> ShelfResult<usize> {
        let rows: Vec<(String, String, String)> = {
            let mut stmt =
                conn.prepare("SELECT exam_id, chapter_key, type_order_json FROM chapter_settings")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut updated = 0usize;
        for (exam_id, key, json) in rows {
            let mut order: Vec<String> = serde_json::from_str(&json)?;
            if !order.iter().any(|t| t == old) {
                continue;
            }
            for t in order.iter_mut().filter(|t| t.as_str() == old) {
                *t = new_name.to_string();
            }
            let mut seen = HashSet::new();
            order.retain(|t| seen.insert(t.clone()));
            conn.execute(
                "UPDATE chapter_settings SET type_order_json = ?1, updated_at = ?2
                 WHERE exam_id = ?3 AND chapter_key = ?4",
                params![serde_json::to_string(&order)?, Utc::now(), exam_id, key],
            )?;
            updated += 1;
        }
        Ok(updated)
    }

    // ========================================================================
    // 章节类型顺序
    // ========================================================================

    /// 读取章节类型顺序覆盖
    pub fn get_chapter_type_order(
        db: &ShelfDatabase,
        exam_id: &str,
        path: &ResourcePath,
    ) -> ShelfResult<Option<Vec<String>>> {
        let conn = db.get_conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT type_order_json FROM chapter_settings
                 WHERE exam_id = ?1 AND chapter_key = ?2",
                params![exam_id, chapter_key(path)],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|s| serde_json::from_str(&s).map_err(ShelfError::from))
            .transpose()
    }

    /// 保存章节类型顺序覆盖
    pub fn save_chapter_type_order(
        db: &ShelfDatabase,
        exam_id: &str,
        path: &ResourcePath,
        order: &[String],
    ) -> ShelfResult<()> {
        validate_name("exam id", exam_id)?;
        validate_name("subject", &path.subject)?;
        validate_name("class", &path.class_name)?;
        validate_name("chapter", &path.chapter)?;

        let conn = db.get_conn()?;
        conn.execute(
            "INSERT INTO chapter_settings (exam_id, chapter_key, type_order_json, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(exam_id, chapter_key) DO UPDATE SET
                type_order_json = excluded.type_order_json,
                updated_at = excluded.updated_at",
            params![exam_id, chapter_key(path), serde_json::to_string(order)?, Utc::now()],
        )?;
        debug!(
            "[Shelf::SettingsRepo] Saved chapter type order for {}/{}: {:?}",
            exam_id,
            chapter_key(path),
            order
        );
        Ok(())
    }

    /// 章节实际使用的类型顺序
    pub fn resolved_type_order(
        db: &ShelfDatabase,
        exam_id: &str,
        path: &ResourcePath,
    ) -> ShelfResult<Vec<String>> {
        let global = Self::get_resource_types(db)?;
        let chapter = Self::get_chapter_type_order(db, exam_id, path)?;
        Ok(resolve_type_order(&global, chapter.as_deref()))
    }

    /// 结构重命名后重建受影响的章节复合键
    ///
    /// 新键已存在时以被重命名的一行为准。
    pub fn rekey_chapter_settings_with_conn(
        conn: &Connection,
        exam_id: &str,
        target: &RenameTarget,
        new_name: &str,
    ) -> ShelfResult<usize> {
        let keys: Vec<String> = {
            let mut stmt =
                conn.prepare("SELECT chapter_key FROM chapter_settings WHERE exam_id = ?1")?;
            let keys = stmt
                .query_map(params![exam_id], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            keys
        };

        let mut rekeyed = 0usize;
        for key in keys {
            let Some(path) = parse_chapter_key(&key) else {
                warn!(
                    "[Shelf::SettingsRepo] Skipping malformed chapter key: {}/{}",
                    exam_id, key
                );
                continue;
            };
            if !target.matches(&path) {
                continue;
            }
            let new_key = chapter_key(&target.rewrite(&path, new_name));
            conn.execute(
                "UPDATE OR REPLACE chapter_settings SET chapter_key = ?1, updated_at = ?2
                 WHERE exam_id = ?3 AND chapter_key = ?4",
                params![new_key, Utc::now(), exam_id, key],
            )?;
            rekeyed += 1;
        }
        Ok(rekeyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shelf::repos::resource_repo::tests::new_resource;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn setup_test_db() -> (TempDir, ShelfDatabase) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = ShelfDatabase::new(temp_dir.path()).expect("Failed to create database");
        (temp_dir, db)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_format_type_name() {
        assert_eq!(format_type_name("  Mock   Test ").unwrap(), "mock-test");
        assert_eq!(format_type_name("PYQ").unwrap(), "pyq");
        assert!(format_type_name("   ").is_err());
    }

    #[test]
    fn test_chapter_key_round_trip_with_separator_chars() {
        let path = ResourcePath::new("Maths | Stats", "Class 11/12", "Sets & Relations");
        let key = chapter_key(&path);
        assert_eq!(key.matches('|').count(), 2);
        assert_eq!(parse_chapter_key(&key), Some(path));
        assert_eq!(parse_chapter_key("only|two"), None);
    }

    #[test]
    fn test_default_types_when_unset() {
        let (_temp_dir, db) = setup_test_db();
        assert_eq!(
            SettingsRepo::get_resource_types(&db).unwrap(),
            strings(&["note", "pyq", "practice"])
        );
    }

    #[test]
    fn test_add_delete_and_set_types() {
        let (_temp_dir, db) = setup_test_db();
        let types = SettingsRepo::add_resource_type(&db, "Video Lectures").unwrap();
        assert_eq!(types.last().map(String::as_str), Some("video-lectures"));

        assert_matches!(
            SettingsRepo::add_resource_type(&db, "video lectures"),
            Err(ShelfError::Validation(_))
        );

        let types = SettingsRepo::delete_resource_type(&db, "practice").unwrap();
        assert!(!types.contains(&"practice".to_string()));
        assert_matches!(
            SettingsRepo::delete_resource_type(&db, "practice"),
            Err(ShelfError::ResourceTypeNotFound(_))
        );

        let types =
            SettingsRepo::set_resource_types(&db, &strings(&["PYQ", "note", "pyq"])).unwrap();
        assert_eq!(types, strings(&["pyq", "note"]));
        assert_eq!(SettingsRepo::get_resource_types(&db).unwrap(), types);
    }

    #[test]
    fn test_rename_type_cascades_only_matching_resources() {
        let (_temp_dir, db) = setup_test_db();
        let note = ResourceRepo::add_resource(
            &db,
            &new_resource("jee", "Physics", "Class 11", "Work", "note"),
        )
        .unwrap();
        let other_note = ResourceRepo::add_resource(
            &db,
            &new_resource("neet", "Biology", "Class 12", "Cells", "note"),
        )
        .unwrap();
        let pyq = ResourceRepo::add_resource(
            &db,
            &new_resource("jee", "Physics", "Class 11", "Work", "pyq"),
        )
        .unwrap();
        let path = ResourcePath::new("Physics", "Class 11", "Work");
        SettingsRepo::save_chapter_type_order(&db, "jee", &path, &strings(&["pyq", "note"]))
            .unwrap();

        let outcome = SettingsRepo::rename_resource_type(&db, "note", "notes").unwrap();
        assert_eq!(outcome.types, strings(&["notes", "pyq", "practice"]));
        assert_eq!(outcome.resources_updated, 2);
        assert_eq!(outcome.chapter_orders_updated, 1);

        for id in [&note.id, &other_note.id] {
            let r = ResourceRepo::get_resource(&db, id).unwrap().unwrap();
            assert_eq!(r.resource_type, "notes");
        }
        let untouched = ResourceRepo::get_resource(&db, &pyq.id).unwrap().unwrap();
        assert_eq!(untouched, pyq);

        assert_eq!(
            SettingsRepo::get_chapter_type_order(&db, "jee", &path).unwrap(),
            Some(strings(&["pyq", "notes"]))
        );
    }

    #[test]
    fn test_rename_type_errors() {
        let (_temp_dir, db) = setup_test_db();
        assert_matches!(
            SettingsRepo::rename_resource_type(&db, "video", "videos"),
            Err(ShelfError::ResourceTypeNotFound(_))
        );
        assert_matches!(
            SettingsRepo::rename_resource_type(&db, "note", "PYQ"),
            Err(ShelfError::Validation(_))
        );
        assert_eq!(
            SettingsRepo::get_resource_types(&db).unwrap(),
            strings(&["note", "pyq", "practice"])
        );
    }

    #[test]
    fn test_rename_type_drops_later_duplicates_in_chapter_order() {
        let (_temp_dir, db) = setup_test_db();
        let path = ResourcePath::new("Physics", "Class 11", "Work");
        // "notes" is a stale type the chapter still lists
        SettingsRepo::save_chapter_type_order(&db, "jee", &path, &strings(&["notes", "pyq", "note"]))
            .unwrap();

        let outcome = SettingsRepo::rename_resource_type(&db, "note", "notes").unwrap();
        assert_eq!(outcome.chapter_orders_updated, 1);
        assert_eq!(
            SettingsRepo::get_chapter_type_order(&db, "jee", &path).unwrap(),
            Some(strings(&["notes", "pyq"]))
        );
    }

    #[test]
    fn test_rename_type_resource_failure_keeps_type_list() {
        let (_temp_dir, db) = setup_test_db();
        let note = ResourceRepo::add_resource(
            &db,
            &new_resource("jee", "Physics", "Class 11", "Work", "note"),
        )
        .unwrap();
        {
            let conn = db.get_conn().unwrap();
            conn.execute_batch(
                "CREATE TRIGGER block_resource_updates BEFORE UPDATE ON resources
                 BEGIN SELECT RAISE(ABORT, 'simulated outage'); END;",
            )
            .unwrap();
        }

        assert_matches!(
            SettingsRepo::rename_resource_type(&db, "note", "notes"),
            Err(ShelfError::Internal(_))
        );

        // 类型列表已提交，资源仍是旧标签
        assert_eq!(
            SettingsRepo::get_resource_types(&db).unwrap(),
            strings(&["notes", "pyq", "practice"])
        );
        let unchanged = ResourceRepo::get_resource(&db, &note.id).unwrap().unwrap();
        assert_eq!(unchanged.resource_type, "note");
    }

    #[test]
    fn test_resolve_type_order() {
        let global = strings(&["note", "pyq", "practice"]);
        assert_eq!(resolve_type_order(&global, None), global);

        let chapter = strings(&["practice", "retired", "note"]);
        assert_eq!(
            resolve_type_order(&global, Some(&chapter)),
            strings(&["practice", "note"])
        );

        let unknown_only = strings(&["retired"]);
        assert_eq!(resolve_type_order(&global, Some(&unknown_only)), global);
    }

    #[test]
    fn test_group_resources_by_type() {
        let mk = |t: &str| Resource {
            id: format!("res_{}", t),
            exam_id: "jee".into(),
            subject: "Physics".into(),
            class_name: "Class 11".into(),
            chapter: "Work".into(),
            resource_type: t.into(),
            title: format!("{} title", t),
            subtitle: None,
            year: None,
            file_url: "https://example.com".into(),
            order: None,
            created_at: Utc::now(),
        };
        let resources = vec![mk("video"), mk("note"), mk("audio"), mk("pyq"), mk("note")];
        let groups = group_resources_by_type(resources, &strings(&["pyq", "note"]));
        let types: Vec<&str> = groups.iter().map(|g| g.resource_type.as_str()).collect();
        assert_eq!(types, vec!["pyq", "note", "audio", "video"]);
        assert_eq!(groups[1].resources.len(), 2);
    }

    #[test]
    fn test_rekey_chapter_settings() {
        let (_temp_dir, db) = setup_test_db();
        let path = ResourcePath::new("Physics", "Class 11", "Work");
        let other = ResourcePath::new("Physics", "Class 12", "Work");
        SettingsRepo::save_chapter_type_order(&db, "jee", &path, &strings(&["pyq"])).unwrap();
        SettingsRepo::save_chapter_type_order(&db, "jee", &other, &strings(&["note"])).unwrap();

        let conn = db.get_conn().unwrap();
        let n = SettingsRepo::rekey_chapter_settings_with_conn(
            &conn,
            "jee",
            &RenameTarget::class("Physics", "Class 11"),
            "XI",
        )
        .unwrap();
        assert_eq!(n, 1);
        drop(conn);

        let moved = ResourcePath::new("Physics", "XI", "Work");
        assert_eq!(
            SettingsRepo::get_chapter_type_order(&db, "jee", &moved).unwrap(),
            Some(strings(&["pyq"]))
        );
        assert_eq!(
            SettingsRepo::get_chapter_type_order(&db, "jee", &path).unwrap(),
            None
        );
        assert_eq!(
            SettingsRepo::get_chapter_type_order(&db, "jee", &other).unwrap(),
            Some(strings(&["note"]))
        );
    }
}
