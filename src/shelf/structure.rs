//! 结构树的纯内存操作
//!
//! - 名称校验（空名、超长、同级重名）
//! - 按路径定位并原地重命名（同名时取存储顺序中的第一个）
//!
//! 这里不碰数据库；事务与级联在 `rename_cascade` 中完成。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::error::{ShelfError, ShelfResult};
use super::types::{ExamStructure, ResourcePath};

/// 名称最大长度（字符）
pub const MAX_NAME_LEN: usize = 200;

/// 校验单个名称：去除首尾空白后非空，且不超长
pub fn validate_name(field: &str, value: &str) -> ShelfResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ShelfError::validation(format!("{} cannot be empty", field)));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ShelfError::validation(format!(
            "{} exceeds {} characters",
            field, MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn ensure_unique<'a>(
    level: &str,
    parent: &str,
    names: impl Iterator<Item = &'a str>,
) -> ShelfResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        validate_name(level, name)?;
        if !seen.insert(name) {
            return Err(ShelfError::validation(format!(
                "duplicate {} '{}' in {}",
                level, name, parent
            )));
        }
    }
    Ok(())
}

/// 保存前校验整棵树：所有名称合法，同级不重名
pub fn validate_structure(structure: &ExamStructure) -> ShelfResult<()> {
    ensure_unique(
        "subject",
        "exam",
        structure.subjects.iter().map(|s| s.name.as_str()),
    )?;
    for subject in &structure.subjects {
        ensure_unique(
            "class",
            &subject.name,
            subject.classes.iter().map(|c| c.name.as_str()),
        )?;
        for class in &subject.classes {
            ensure_unique(
                "chapter",
                &format!("{}/{}", subject.name, class.name),
                class.chapters.iter().map(String::as_str),
            )?;
        }
    }
    Ok(())
}

/// 重命名目标：目标层级 + 消歧所需的父级名称 + 旧名称
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "camelCase")]
pub enum RenameTarget {
    Subject {
        name: String,
    },
    Class {
        subject: String,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    Chapter {
        subject: String,
        #[serde(rename = "class")]
        class_name: String,
        name: String,
    },
}

impl RenameTarget {
    pub fn subject(name: impl Into<String>) -> Self {
        RenameTarget::Subject { name: name.into() }
    }

    pub fn class(subject: impl Into<String>, name: impl Into<String>) -> Self {
        RenameTarget::Class {
            subject: subject.into(),
            name: name.into(),
        }
    }

    pub fn chapter(
        subject: impl Into<String>,
        class_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        RenameTarget::Chapter {
            subject: subject.into(),
            class_name: class_name.into(),
            name: name.into(),
        }
    }

    /// 层级名（用于日志和日志表）
    pub fn kind(&self) -> &'static str {
        match self {
            RenameTarget::Subject { .. } => "subject",
            RenameTarget::Class { .. } => "class",
            RenameTarget::Chapter { .. } => "chapter",
        }
    }

    pub fn old_name(&self) -> &str {
        match self {
            RenameTarget::Subject { name }
            | RenameTarget::Class { name, .. }
            | RenameTarget::Chapter { name, .. } => name,
        }
    }

    /// 所有名称参数都必须非空
    pub fn validate(&self) -> ShelfResult<()> {
        match self {
            RenameTarget::Subject { name } => validate_name("subject", name),
            RenameTarget::Class { subject, name } => {
                validate_name("subject", subject)?;
                validate_name("class", name)
            }
            RenameTarget::Chapter {
                subject,
                class_name,
                name,
            } => {
                validate_name("subject", subject)?;
                validate_name("class", class_name)?;
                validate_name("chapter", name)
            }
        }
    }

    /// 判断资源路径是否落在旧名称之下
    pub fn matches(&self, path: &ResourcePath) -> bool {
        match self {
            RenameTarget::Subject { name } => path.subject == *name,
            RenameTarget::Class { subject, name } => {
                path.subject == *subject && path.class_name == *name
            }
            RenameTarget::Chapter {
                subject,
                class_name,
                name,
            } => {
                path.subject == *subject
                    && path.class_name == *class_name
                    && path.chapter == *name
            }
        }
    }

    /// 同一位置换成新名称后的目标
    pub fn renamed(&self, new_name: &str) -> RenameTarget {
        let mut renamed = self.clone();
        match &mut renamed {
            RenameTarget::Subject { name }
            | RenameTarget::Class { name, .. }
            | RenameTarget::Chapter { name, .. } => *name = new_name.to_string(),
        }
        renamed
    }

    /// 把旧路径改写为新路径（调用方需先确认 `matches`）
    pub fn rewrite(&self, path: &ResourcePath, new_name: &str) -> ResourcePath {
        let mut renamed = path.clone();
        match self {
            RenameTarget::Subject { .. } => renamed.subject = new_name.to_string(),
            RenameTarget::Class { .. } => renamed.class_name = new_name.to_string(),
            RenameTarget::Chapter { .. } => renamed.chapter = new_name.to_string(),
        }
        renamed
    }
}

/// 目标节点在结构树中是否存在（父级按第一个同名节点查找）
pub fn target_exists(structure: &ExamStructure, target: &RenameTarget) -> bool {
    let first_subject = |name: &str| structure.subjects.iter().find(|s| s.name == name);
    match target {
        RenameTarget::Subject { name } => first_subject(name).is_some(),
        RenameTarget::Class { subject, name } => first_subject(subject)
            .is_some_and(|s| s.classes.iter().any(|c| c.name == *name)),
        RenameTarget::Chapter {
            subject,
            class_name,
            name,
        } => first_subject(subject)
            .and_then(|s| s.classes.iter().find(|c| c.name == *class_name))
            .is_some_and(|c| c.chapters.iter().any(|ch| ch == name)),
    }
}

fn sibling_conflict(new_name: &str, level: &str) -> ShelfError {
    ShelfError::validation(format!("{} '{}' already exists", level, new_name))
}

/// 在结构树中原地重命名
///
/// 按存储顺序取第一个同名节点；任一层级缺失时返回对应层级的 NotFound。
/// 新名称与同级其他节点重名时拒绝。
pub fn apply_rename(
    structure: &mut ExamStructure,
    exam_id: &str,
    target: &RenameTarget,
    new_name: &str,
) -> ShelfResult<()> {
    let subject_missing = |subject: &str| ShelfError::SubjectNotFound {
        exam_id: exam_id.to_string(),
        subject: subject.to_string(),
    };

    match target {
        RenameTarget::Subject { name } => {
            let idx = structure
                .subjects
                .iter()
                .position(|s| s.name == *name)
                .ok_or_else(|| subject_missing(name))?;
            if structure
                .subjects
                .iter()
                .enumerate()
                .any(|(i, s)| i != idx && s.name == new_name)
            {
                return Err(sibling_conflict(new_name, "subject"));
            }
            structure.subjects[idx].name = new_name.to_string();
        }
        RenameTarget::Class { subject, name } => {
            let subject_node = structure
                .subjects
                .iter_mut()
                .find(|s| s.name == *subject)
                .ok_or_else(|| subject_missing(subject))?;
            let idx = subject_node
                .classes
                .iter()
                .position(|c| c.name == *name)
                .ok_or_else(|| ShelfError::ClassNotFound {
                    exam_id: exam_id.to_string(),
                    subject: subject.clone(),
                    class_name: name.clone(),
                })?;
            if subject_node
                .classes
                .iter()
                .enumerate()
                .any(|(i, c)| i != idx && c.name == new_name)
            {
                return Err(sibling_conflict(new_name, "class"));
            }
            subject_node.classes[idx].name = new_name.to_string();
        }
        RenameTarget::Chapter {
            subject,
            class_name,
            name,
        } => {
            let subject_node = structure
                .subjects
                .iter_mut()
                .find(|s| s.name == *subject)
                .ok_or_else(|| subject_missing(subject))?;
            let class_node = subject_node
                .classes
                .iter_mut()
                .find(|c| c.name == *class_name)
                .ok_or_else(|| ShelfError::ClassNotFound {
                    exam_id: exam_id.to_string(),
                    subject: subject.clone(),
                    class_name: class_name.clone(),
                })?;
            let idx = class_node
                .chapters
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| ShelfError::ChapterNotFound {
                    exam_id: exam_id.to_string(),
                    subject: subject.clone(),
                    class_name: class_name.clone(),
                    chapter: name.clone(),
                })?;
            if class_node
                .chapters
                .iter()
                .enumerate()
                .any(|(i, c)| i != idx && c == new_name)
            {
                return Err(sibling_conflict(new_name, "chapter"));
            }
            class_node.chapters[idx] = new_name.to_string();
        }
    }
    Ok(())
}
