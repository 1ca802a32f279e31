//! Shelf 统一错误类型
//!
//! 所有仓储（repo）和服务返回 `ShelfResult<T>`。对外边界（handlers）只暴露三个错误码：
//! `ItemNotFound`、`ValidationError`、`Internal`；内部仍保留"缺的是哪一层"的区分，便于测试。

use serde::Serialize;
use thiserror::Error;

/// Shelf 操作结果类型别名
pub type ShelfResult<T> = Result<T, ShelfError>;

/// 对外错误码：未找到
pub const CODE_ITEM_NOT_FOUND: &str = "ItemNotFound";
/// 对外错误码：校验失败
pub const CODE_VALIDATION: &str = "ValidationError";
/// 对外错误码：内部错误
pub const CODE_INTERNAL: &str = "Internal";

/// Shelf 统一错误类型
#[derive(Debug, Error, Serialize)]
pub enum ShelfError {
    /// 考试不存在
    #[error("Exam not found: {0}")]
    ExamNotFound(String),

    /// 科目不存在
    #[error("Subject not found: {exam_id}/{subject}")]
    SubjectNotFound { exam_id: String, subject: String },

    /// 年级不存在
    #[error("Class not found: {exam_id}/{subject}/{class_name}")]
    ClassNotFound {
        exam_id: String,
        subject: String,
        class_name: String,
    },

    /// 章节不存在
    #[error("Chapter not found: {exam_id}/{subject}/{class_name}/{chapter}")]
    ChapterNotFound {
        exam_id: String,
        subject: String,
        class_name: String,
        chapter: String,
    },

    /// 资源不存在
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// 日历事件不存在
    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// 建议不存在
    #[error("Suggestion not found: {0}")]
    SuggestionNotFound(String),

    /// 资源类型不存在
    #[error("Resource type not found: {0}")]
    ResourceTypeNotFound(String),

    /// 校验错误（空字段、超长、重名等，在任何存储调用之前检查）
    #[error("Validation error: {0}")]
    Validation(String),

    /// 数据库错误
    #[error("Database error: {0}")]
    Database(String),

    /// 连接池错误
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(String),

    /// 迁移错误
    #[error("Migration error: {0}")]
    Migration(String),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),

    /// 其他内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShelfError {
    /// 构造校验错误
    pub fn validation(message: impl Into<String>) -> Self {
        ShelfError::Validation(message.into())
    }

    /// 是否属于"未找到"类错误（任意层级）
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ShelfError::ExamNotFound(_)
                | ShelfError::SubjectNotFound { .. }
                | ShelfError::ClassNotFound { .. }
                | ShelfError::ChapterNotFound { .. }
                | ShelfError::ResourceNotFound(_)
                | ShelfError::EventNotFound(_)
                | ShelfError::SuggestionNotFound(_)
                | ShelfError::ResourceTypeNotFound(_)
        )
    }

    /// 对外错误码
    ///
    /// 所有"未找到"折叠为 `ItemNotFound`，其余非校验错误都是 `Internal`。
    pub fn code(&self) -> &'static str {
        if self.is_not_found() {
            CODE_ITEM_NOT_FOUND
        } else if matches!(self, ShelfError::Validation(_)) {
            CODE_VALIDATION
        } else {
            CODE_INTERNAL
        }
    }
}

impl From<rusqlite::Error> for ShelfError {
    fn from(e: rusqlite::Error) -> Self {
        ShelfError::Database(format!("{:#}", e))
    }
}

impl From<r2d2::Error> for ShelfError {
    fn from(e: r2d2::Error) -> Self {
        ShelfError::Pool(e.to_string())
    }
}

impl From<serde_json::Error> for ShelfError {
    fn from(e: serde_json::Error) -> Self {
        ShelfError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for ShelfError {
    fn from(e: std::io::Error) -> Self {
        ShelfError::Io(e.to_string())
    }
}

impl From<refinery::Error> for ShelfError {
    fn from(e: refinery::Error) -> Self {
        ShelfError::Migration(e.to_string())
    }
}

impl From<config::ConfigError> for ShelfError {
    fn from(e: config::ConfigError) -> Self {
        ShelfError::Config(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ShelfError {
    fn from(e: tokio::task::JoinError) -> Self {
        ShelfError::Internal(format!("Blocking task failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShelfError::ClassNotFound {
            exam_id: "jee-mains".to_string(),
            subject: "Physics".to_string(),
            class_name: "Class 11".to_string(),
        };
        assert_eq!(err.to_string(), "Class not found: jee-mains/Physics/Class 11");

        let err = ShelfError::validation("title cannot be empty");
        assert_eq!(err.to_string(), "Validation error: title cannot be empty");
    }

    #[test]
    fn test_not_found_levels_collapse_to_one_code() {
        let errors = [
            ShelfError::ExamNotFound("neet".into()),
            ShelfError::SubjectNotFound {
                exam_id: "neet".into(),
                subject: "Biology".into(),
            },
            ShelfError::ChapterNotFound {
                exam_id: "neet".into(),
                subject: "Biology".into(),
                class_name: "Class 12".into(),
                chapter: "Genetics".into(),
            },
            ShelfError::ResourceTypeNotFound("video".into()),
        ];
        for err in &errors {
            assert!(err.is_not_found());
            assert_eq!(err.code(), CODE_ITEM_NOT_FOUND);
        }
    }

    #[test]
    fn test_other_codes() {
        assert_eq!(ShelfError::validation("x").code(), CODE_VALIDATION);
        assert_eq!(ShelfError::Database("locked".into()).code(), CODE_INTERNAL);
        assert_eq!(ShelfError::Pool("timeout".into()).code(), CODE_INTERNAL);
        assert!(!ShelfError::Internal("boom".into()).is_not_found());
    }
}
