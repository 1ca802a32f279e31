//! 重命名级联服务
//!
//! 科目/年级/章节只以名称作为标识，资源记录冗余保存这些名称，
//! 所以改名需要两步：
//!
//! 1. **结构树改名**（`BEGIN IMMEDIATE` 事务）：事务内重读结构树，定位目标并原地改名，
//!    整体写回，同时写入一条 `pending` 级联日志。任一层级缺失则回滚并返回对应层级的 NotFound。
//! 2. **依赖记录改写**（单独事务）：按旧路径查询资源并批量改写对应字段，
//!    重建受影响的章节设置键，标记日志为 `completed`。
//!
//! 第 2 步失败时第 1 步已提交，日志记为 `failed` 并返回 Internal；
//! `resume_pending_cascades` 会重放所有未完成的第 2 步。
//! 重放前在同一事务内重读结构树：旧路径又出现了，或新名称已不在原位置，
//! 说明之后有人编辑过结构树，此时不改写任何资源，日志记为 `superseded`。
//!
//! 同一改名调用两次，第二次会在第 1 步返回 NotFound（旧名称已不存在）。

use rusqlite::TransactionBehavior;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::shelf::database::ShelfDatabase;
use crate::shelf::error::{ShelfError, ShelfResult};
use crate::shelf::repos::{
    CascadeJournalEntry, CascadeJournalRepo, ExamRepo, ResourceRepo, SettingsRepo,
};
use crate::shelf::structure::{apply_rename, target_exists, validate_name, RenameTarget};
use crate::shelf::types::ExamStructure;

/// 一次成功改名的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOutcome {
    pub journal_id: String,
    pub resources_updated: usize,
    pub chapter_settings_rekeyed: usize,
}

/// 第 2 步的改写数量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DependentUpdates {
    resources: usize,
    chapter_settings: usize,
}

/// 第 2 步的结果
#[derive(Debug, Clone, PartialEq, Eq)]
enum DependentOutcome {
    Applied(DependentUpdates),
    Superseded(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeFailure {
    pub journal_id: String,
    pub error: String,
}

/// 重放报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeReport {
    pub attempted: usize,
    pub completed: Vec<String>,
    pub failed: Vec<CascadeFailure>,
    /// 结构树已变化而放弃的记录，`error` 为原因
    pub superseded: Vec<CascadeFailure>,
}

/// 日志记录与当前结构树不再一致的原因
fn stale_reason(structure: Option<&ExamStructure>, entry: &CascadeJournalEntry) -> Option<String> {
    let Some(structure) = structure else {
        return Some(format!("superseded: exam '{}' no longer exists", entry.exam_id));
    };
    let target = &entry.payload.target;
    let new_name = &entry.payload.new_name;
    if target_exists(structure, target) {
        return Some(format!(
            "superseded: {} '{}' exists again",
            target.kind(),
            target.old_name()
        ));
    }
    if !target_exists(structure, &target.renamed(new_name)) {
        return Some(format!(
            "superseded: renamed {} '{}' no longer exists",
            target.kind(),
            new_name
        ));
    }
    None
}

pub struct RenameCascadeService;

impl RenameCascadeService {
    pub fn rename_subject(
        db: &ShelfDatabase,
        exam_id: &str,
        old_name: &str,
        new_name: &str,
    ) -> ShelfResult<RenameOutcome> {
        Self::rename(db, exam_id, &RenameTarget::subject(old_name), new_name)
    }

    pub fn rename_class(
        db: &ShelfDatabase,
        exam_id: &str,
        subject: &str,
        old_name: &str,
        new_name: &str,
    ) -> ShelfResult<RenameOutcome> {
        Self::rename(db, exam_id, &RenameTarget::class(subject, old_name), new_name)
    }

    pub fn rename_chapter(
        db: &ShelfDatabase,
        exam_id: &str,
        subject: &str,
        class_name: &str,
        old_name: &str,
        new_name: &str,
    ) -> ShelfResult<RenameOutcome> {
        Self::rename(
            db,
            exam_id,
            &RenameTarget::chapter(subject, class_name, old_name),
            new_name,
        )
    }

    /// 执行两步改名
    pub fn rename(
        db: &ShelfDatabase,
        exam_id: &str,
        target: &RenameTarget,
        new_name: &str,
    ) -> ShelfResult<RenameOutcome> {
        validate_name("exam id", exam_id)?;
        target.validate()?;
        validate_name("new name", new_name)?;
        let new_name = new_name.trim();
        if new_name == target.old_name() {
            return Err(ShelfError::validation(format!(
                "new {} name is the same as the old one",
                target.kind()
            )));
        }

        let entry = Self::commit_structure_rename(db, exam_id, target, new_name)?;
        info!(
            "[Shelf::RenameCascade] Renamed {} '{}' -> '{}' in {} (journal {})",
            target.kind(),
            target.old_name(),
            new_name,
            exam_id,
            entry.id
        );

        let updates = match Self::finish_dependent_updates(db, &entry, false)? {
            DependentOutcome::Applied(updates) => updates,
            DependentOutcome::Superseded(reason) => return Err(ShelfError::Internal(reason)),
        };
        Ok(RenameOutcome {
            journal_id: entry.id,
            resources_updated: updates.resources,
            chapter_settings_rekeyed: updates.chapter_settings,
        })
    }

    /// 第 1 步：事务内改结构树 + 写日志
    fn commit_structure_rename(
        db: &ShelfDatabase,
        exam_id: &str,
        target: &RenameTarget,
        new_name: &str,
    ) -> ShelfResult<CascadeJournalEntry> {
        let mut conn = db.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut structure = ExamRepo::get_structure_with_conn(&tx, exam_id)?
            .ok_or_else(|| ShelfError::ExamNotFound(exam_id.to_string()))?;
        apply_rename(&mut structure, exam_id, target, new_name)?;
        ExamRepo::write_structure_with_conn(&tx, exam_id, &structure)?;
        let entry = CascadeJournalRepo::insert_with_conn(&tx, exam_id, target, new_name)?;

        tx.commit()?;
        Ok(entry)
    }

    /// 第 2 步：改写资源和章节设置；失败时记录到日志
    ///
    /// `check_structure` 为真时（重放）先确认结构树仍与日志一致。
    fn finish_dependent_updates(
        db: &ShelfDatabase,
        entry: &CascadeJournalEntry,
        check_structure: bool,
    ) -> ShelfResult<DependentOutcome> {
        match Self::rewrite_dependents(db, entry, check_structure) {
            Ok(DependentOutcome::Applied(updates)) => {
                info!(
                    "[Shelf::RenameCascade] Cascade {} completed: {} resources, {} chapter settings",
                    entry.id, updates.resources, updates.chapter_settings
                );
                Ok(DependentOutcome::Applied(updates))
            }
            Ok(DependentOutcome::Superseded(reason)) => {
                warn!(
                    "[Shelf::RenameCascade] Cascade {} skipped, structure changed since rename: {}",
                    entry.id, reason
                );
                Ok(DependentOutcome::Superseded(reason))
            }
            Err(e) => {
                error!(
                    "[Shelf::RenameCascade] Cascade {} failed after structure rename: {}",
                    entry.id, e
                );
                if let Err(mark_err) = CascadeJournalRepo::mark_failed(db, &entry.id, &e.to_string())
                {
                    warn!(
                        "[Shelf::RenameCascade] Could not record failure for {}: {}",
                        entry.id, mark_err
                    );
                }
                Err(ShelfError::Internal(format!(
                    "{} renamed but dependent records not updated (journal {}): {}",
                    entry.kind, entry.id, e
                )))
            }
        }
    }

    fn rewrite_dependents(
        db: &ShelfDatabase,
        entry: &CascadeJournalEntry,
        check_structure: bool,
    ) -> ShelfResult<DependentOutcome> {
        let target = &entry.payload.target;
        let new_name = entry.payload.new_name.as_str();

        let mut conn = db.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if check_structure {
            let structure = ExamRepo::get_structure_with_conn(&tx, &entry.exam_id)?;
            if let Some(reason) = stale_reason(structure.as_ref(), entry) {
                CascadeJournalRepo::mark_superseded_with_conn(&tx, &entry.id, &reason)?;
                tx.commit()?;
                return Ok(DependentOutcome::Superseded(reason));
            }
        }

        let ids = ResourceRepo::find_ids_for_target_with_conn(&tx, &entry.exam_id, target)?;
        let resources = ResourceRepo::rewrite_target_with_conn(&tx, &ids, target, new_name)?;
        let chapter_settings =
            SettingsRepo::rekey_chapter_settings_with_conn(&tx, &entry.exam_id, target, new_name)?;
        CascadeJournalRepo::mark_completed_with_conn(&tx, &entry.id)?;

        tx.commit()?;
        Ok(DependentOutcome::Applied(DependentUpdates {
            resources,
            chapter_settings,
        }))
    }

    /// 未完成的级联（pending + failed）
    pub fn list_pending_cascades(db: &ShelfDatabase) -> ShelfResult<Vec<CascadeJournalEntry>> {
        CascadeJournalRepo::list_pending(db)
    }

    /// 按时间顺序重放所有未完成的第 2 步
    ///
    /// 第 2 步按旧路径查询，已改写过的资源不会被再次匹配；
    /// 结构树在改名后又被编辑过的记录不会重放。
    pub fn resume_pending_cascades(db: &ShelfDatabase) -> ShelfResult<ResumeReport> {
        let pending = CascadeJournalRepo::list_pending(db)?;
        let mut report = ResumeReport {
            attempted: pending.len(),
            ..Default::default()
        };

        for entry in &pending {
            match Self::finish_dependent_updates(db, entry, true) {
                Ok(DependentOutcome::Applied(_)) => report.completed.push(entry.id.clone()),
                Ok(DependentOutcome::Superseded(reason)) => {
                    report.superseded.push(CascadeFailure {
                        journal_id: entry.id.clone(),
                        error: reason,
                    })
                }
                Err(e) => report.failed.push(CascadeFailure {
                    journal_id: entry.id.clone(),
                    error: e.to_string(),
                }),
            }
        }

        if report.attempted > 0 {
            info!(
                "[Shelf::RenameCascade] Resumed {} cascades: {} completed, {} still failing, {} superseded",
                report.attempted,
                report.completed.len(),
                report.failed.len(),
                report.superseded.len()
            );
        }
        Ok(report)
    }
}
