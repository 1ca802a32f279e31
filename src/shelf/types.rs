//! Shelf 核心类型定义
//!
//! 结构树（科目 → 年级 → 章节）只用名称作为标识，没有生成 ID；
//! 资源记录冗余保存这些名称，因此重命名需要级联（见 `rename_cascade`）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ShelfError;

// ============================================================================
// 结构树
// ============================================================================

/// 年级：名称在所属科目内唯一，章节是裸字符串
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLevel {
    pub name: String,
    #[serde(default)]
    pub chapters: Vec<String>,
}

impl ClassLevel {
    pub fn new(name: impl Into<String>, chapters: Vec<String>) -> Self {
        Self {
            name: name.into(),
            chapters,
        }
    }
}

/// 科目：名称在考试内唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(default)]
    pub classes: Vec<ClassLevel>,
}

impl Subject {
    pub fn new(name: impl Into<String>, classes: Vec<ClassLevel>) -> Self {
        Self {
            name: name.into(),
            classes,
        }
    }
}

/// 考试结构树，作为一个整体读写
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamStructure {
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

/// 考试
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    /// slug，创建后不可变
    pub id: String,
    pub name: String,
    pub structure: ExamStructure,
}

// ============================================================================
// 资源
// ============================================================================

/// 资源记录
///
/// `exam_id/subject/class_name/chapter` 是结构树名称的冗余拷贝。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub exam_id: String,
    pub subject: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub chapter: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// 生成资源 ID
    ///
    /// 格式：res_{nanoid(10)}
    pub fn generate_id() -> String {
        format!("res_{}", nanoid::nanoid!(10))
    }

    /// 资源所在路径
    pub fn path(&self) -> ResourcePath {
        ResourcePath {
            subject: self.subject.clone(),
            class_name: self.class_name.clone(),
            chapter: self.chapter.clone(),
        }
    }
}

/// 新建资源输入（来自上传表单）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResource {
    pub exam_id: String,
    pub subject: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub chapter: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    pub file_url: String,
}

/// 考试内的 科目/年级/章节 路径
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePath {
    pub subject: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub chapter: String,
}

impl ResourcePath {
    pub fn new(
        subject: impl Into<String>,
        class_name: impl Into<String>,
        chapter: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            class_name: class_name.into(),
            chapter: chapter.into(),
        }
    }
}

/// 拖拽排序后的单条更新
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOrderUpdate {
    pub id: String,
    pub order: i64,
}

/// 按类型分组后的资源（公开浏览页使用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub resources: Vec<Resource>,
}

// ============================================================================
// 日历事件
// ============================================================================

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Exam,
    Registration,
    Result,
    Other,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Exam => "exam",
            EventType::Registration => "registration",
            EventType::Result => "result",
            EventType::Other => "other",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exam" => Ok(EventType::Exam),
            "registration" => Ok(EventType::Registration),
            "result" => Ok(EventType::Result),
            "other" => Ok(EventType::Other),
            other => Err(ShelfError::validation(format!(
                "unknown event type '{}'",
                other
            ))),
        }
    }
}

/// 考试日历事件
///
/// `exam_id` 是按 ID 的弱引用，不参与级联。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamEvent {
    pub id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExamEvent {
    /// 格式：evt_{nanoid(10)}
    pub fn generate_id() -> String {
        format!("evt_{}", nanoid::nanoid!(10))
    }
}

/// 新建/更新事件输入
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub title: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub exam_id: Option<String>,
}

// ============================================================================
// 建议
// ============================================================================

/// 用户建议
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Suggestion {
    /// 格式：sug_{nanoid(10)}
    pub fn generate_id() -> String {
        format!("sug_{}", nanoid::nanoid!(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_json_uses_document_field_names() {
        let resource = Resource {
            id: "res_abc".into(),
            exam_id: "jee-mains".into(),
            subject: "Physics".into(),
            class_name: "Class 11".into(),
            chapter: "Kinematics".into(),
            resource_type: "pyq".into(),
            title: "2019 Paper".into(),
            subtitle: None,
            year: Some("2019".into()),
            file_url: "https://example.com/a.pdf".into(),
            order: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(value["examId"], "jee-mains");
        assert_eq!(value["class"], "Class 11");
        assert_eq!(value["type"], "pyq");
        assert_eq!(value["fileUrl"], "https://example.com/a.pdf");
        assert!(value.get("subtitle").is_none());
        assert!(value.get("order").is_none());
    }

    #[test]
    fn test_structure_defaults_missing_lists() {
        let structure: ExamStructure =
            serde_json::from_str(r#"{"subjects":[{"name":"Maths"}]}"#).unwrap();
        assert_eq!(structure.subjects[0].name, "Maths");
        assert!(structure.subjects[0].classes.is_empty());

        let empty: ExamStructure = serde_json::from_str("{}").unwrap();
        assert!(empty.subjects.is_empty());
    }

    #[test]
    fn test_event_type_parse() {
        assert_eq!("result".parse::<EventType>().unwrap(), EventType::Result);
        assert!("holiday".parse::<EventType>().is_err());
        assert_eq!(EventType::Registration.to_string(), "registration");
    }
}
