//! Shelf 命令处理器
//!
//! 每个公开操作一个 async 函数：同步的 Repo/服务调用放到 `spawn_blocking` 上执行，
//! 结果统一转换为 `ActionResult<T>`，错误不会越过边界。
//!
//! `ShelfCommand` 是所有命令的 JSON 形式（`{"command": "scan_orphans", "examId": "jee"}`），
//! `dispatch` 按命令分发并返回 `ActionResult` 的 JSON。
//!
//! ## 命令分类
//! - **考试/结构树**：create_exam, get_exam, list_exams, get_structure, save_structure, ...
//! - **重命名级联**：rename_subject, rename_class, rename_chapter, resume_pending_cascades
//! - **孤儿修复**：scan_orphans, move_resource, delete_resource, delete_resources
//! - **资源/类型/日历/建议**：其余 CRUD

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::shelf::database::ShelfDatabase;
use crate::shelf::error::{ShelfError, ShelfResult, CODE_INTERNAL};
use crate::shelf::orphan_scanner::{OrphanScanner, OrphanedResource};
use crate::shelf::rename_cascade::{RenameCascadeService, RenameOutcome, ResumeReport};
use crate::shelf::repos::settings_repo::{group_resources_by_type, TypeRenameOutcome};
use crate::shelf::repos::{
    CascadeJournalEntry, EventRepo, ExamRepo, ResourceRepo, SettingsRepo, SuggestionRepo,
};
use crate::shelf::types::*;

/// 默认返回的即将到来事件数
const DEFAULT_UPCOMING_LIMIT: usize = 5;

// ============================================================================
// 统一返回结构
// ============================================================================

/// 所有命令的返回形状
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn from_error(err: &ShelfError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
        }
    }

    pub fn from_result(result: ShelfResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }
}

/// 在阻塞线程池上执行同步操作并转换结果
async fn run_blocking<T, F>(db: &Arc<ShelfDatabase>, op: &'static str, f: F) -> ActionResult<T>
where
    T: Send + 'static,
    F: FnOnce(&ShelfDatabase) -> ShelfResult<T> + Send + 'static,
{
    let db = Arc::clone(db);
    let result = match tokio::task::spawn_blocking(move || f(&db)).await {
        Ok(result) => result,
        Err(join_err) => Err(ShelfError::from(join_err)),
    };

    match &result {
        Ok(_) => debug!("[Shelf::Handlers] {} ok", op),
        Err(e) if e.is_not_found() => warn!("[Shelf::Handlers] {} not found: {}", op, e),
        Err(e) => error!("[Shelf::Handlers] {} failed: {}", op, e),
    }
    ActionResult::from_result(result)
}

// ============================================================================
// 输入类型（接收 JSON，camelCase）
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamInput {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamIdInput {
    pub exam_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStructureInput {
    pub exam_id: String,
    pub structure: ExamStructure,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameExamInput {
    pub exam_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameSubjectInput {
    pub exam_id: String,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameClassInput {
    pub exam_id: String,
    pub subject: String,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameChapterInput {
    pub exam_id: String,
    pub subject: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdInput {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdsInput {
    pub ids: Vec<String>,
}

/// 孤儿修复：移动到新路径
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResourceInput {
    pub id: String,
    pub subject: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub chapter: String,
}

/// 章节定位（可选类型过滤）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterInput {
    pub exam_id: String,
    pub subject: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub chapter: String,
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,
}

impl ChapterInput {
    fn path(&self) -> ResourcePath {
        ResourcePath::new(&self.subject, &self.class_name, &self.chapter)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderInput {
    pub updates: Vec<ResourceOrderUpdate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeNameInput {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTypesInput {
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameTypeInput {
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChapterTypeOrderInput {
    pub exam_id: String,
    pub subject: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub chapter: String,
    pub type_order: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventInput {
    pub id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub exam_id: Option<String>,
}

impl UpdateEventInput {
    fn into_parts(self) -> (String, EventInput) {
        (
            self.id,
            EventInput {
                title: self.title,
                date: self.date,
                event_type: self.event_type,
                description: self.description,
                exam_id: self.exam_id,
            },
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilterInput {
    #[serde(default)]
    pub exam_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingEventsInput {
    /// 缺省为当前时间
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
    #[serde(default = "default_upcoming_limit")]
    pub limit: usize,
    #[serde(default)]
    pub exam_id: Option<String>,
}

fn default_upcoming_limit() -> usize {
    DEFAULT_UPCOMING_LIMIT
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionInput {
    pub content: String,
}

// ============================================================================
// 考试 / 结构树
// ============================================================================

pub async fn shelf_create_exam(db: &Arc<ShelfDatabase>, input: CreateExamInput) -> ActionResult<Exam> {
    run_blocking(db, "create_exam", move |db| {
        ExamRepo::create_exam(db, &input.id, &input.name)
    })
    .await
}

pub async fn shelf_get_exam(db: &Arc<ShelfDatabase>, exam_id: String) -> ActionResult<Exam> {
    run_blocking(db, "get_exam", move |db| {
        ExamRepo::get_exam(db, &exam_id)?.ok_or(ShelfError::ExamNotFound(exam_id))
    })
    .await
}

pub async fn shelf_list_exams(db: &Arc<ShelfDatabase>) -> ActionResult<Vec<Exam>> {
    run_blocking(db, "list_exams", ExamRepo::list_exams).await
}

pub async fn shelf_list_exam_ids(db: &Arc<ShelfDatabase>) -> ActionResult<Vec<String>> {
    run_blocking(db, "list_exam_ids", ExamRepo::list_exam_ids).await
}

/// 考试不存在时返回空树
pub async fn shelf_get_structure(
    db: &Arc<ShelfDatabase>,
    exam_id: String,
) -> ActionResult<ExamStructure> {
    run_blocking(db, "get_structure", move |db| {
        ExamRepo::get_structure(db, &exam_id)
    })
    .await
}

pub async fn shelf_save_structure(
    db: &Arc<ShelfDatabase>,
    input: SaveStructureInput,
) -> ActionResult<()> {
    run_blocking(db, "save_structure", move |db| {
        ExamRepo::save_structure(db, &input.exam_id, &input.structure)
    })
    .await
}

pub async fn shelf_rename_exam(db: &Arc<ShelfDatabase>, input: RenameExamInput) -> ActionResult<()> {
    run_blocking(db, "rename_exam", move |db| {
        ExamRepo::rename_exam(db, &input.exam_id, &input.name)
    })
    .await
}

pub async fn shelf_delete_exam(db: &Arc<ShelfDatabase>, exam_id: String) -> ActionResult<()> {
    run_blocking(db, "delete_exam", move |db| ExamRepo::delete_exam(db, &exam_id)).await
}

// ============================================================================
// 重命名级联
// ============================================================================

pub async fn shelf_rename_subject(
    db: &Arc<ShelfDatabase>,
    input: RenameSubjectInput,
) -> ActionResult<RenameOutcome> {
    run_blocking(db, "rename_subject", move |db| {
        RenameCascadeService::rename_subject(db, &input.exam_id, &input.old_name, &input.new_name)
    })
    .await
}

pub async fn shelf_rename_class(
    db: &Arc<ShelfDatabase>,
    input: RenameClassInput,
) -> ActionResult<RenameOutcome> {
    run_blocking(db, "rename_class", move |db| {
        RenameCascadeService::rename_class(
            db,
            &input.exam_id,
            &input.subject,
            &input.old_name,
            &input.new_name,
        )
    })
    .await
}

pub async fn shelf_rename_chapter(
    db: &Arc<ShelfDatabase>,
    input: RenameChapterInput,
) -> ActionResult<RenameOutcome> {
    run_blocking(db, "rename_chapter", move |db| {
        RenameCascadeService::rename_chapter(
            db,
            &input.exam_id,
            &input.subject,
            &input.class_name,
            &input.old_name,
            &input.new_name,
        )
    })
    .await
}

pub async fn shelf_list_pending_cascades(
    db: &Arc<ShelfDatabase>,
) -> ActionResult<Vec<CascadeJournalEntry>> {
    run_blocking(
        db,
        "list_pending_cascades",
        RenameCascadeService::list_pending_cascades,
    )
    .await
}

pub async fn shelf_resume_pending_cascades(db: &Arc<ShelfDatabase>) -> ActionResult<ResumeReport> {
    run_blocking(
        db,
        "resume_pending_cascades",
        RenameCascadeService::resume_pending_cascades,
    )
    .await
}

// ============================================================================
// 孤儿扫描与修复
// ============================================================================

pub async fn shelf_scan_orphans(db: &Arc<ShelfDatabase>, exam_id: String) -> ActionResult<Vec<Resource>> {
    run_blocking(db, "scan_orphans", move |db| {
        OrphanScanner::scan_orphans(db, &exam_id)
    })
    .await
}

pub async fn shelf_scan_orphans_detailed(
    db: &Arc<ShelfDatabase>,
    exam_id: String,
) -> ActionResult<Vec<OrphanedResource>> {
    run_blocking(db, "scan_orphans_detailed", move |db| {
        OrphanScanner::scan_detailed(db, &exam_id)
    })
    .await
}

pub async fn shelf_move_resource(
    db: &Arc<ShelfDatabase>,
    input: MoveResourceInput,
) -> ActionResult<Resource> {
    run_blocking(db, "move_resource", move |db| {
        let target = ResourcePath::new(input.subject, input.class_name, input.chapter);
        ResourceRepo::move_resource(db, &input.id, &target)
    })
    .await
}

pub async fn shelf_delete_resource(db: &Arc<ShelfDatabase>, id: String) -> ActionResult<()> {
    run_blocking(db, "delete_resource", move |db| {
        ResourceRepo::delete_resource(db, &id)
    })
    .await
}

/// 批量删除（孤儿清理）；返回删除数量
pub async fn shelf_delete_resources(db: &Arc<ShelfDatabase>, ids: Vec<String>) -> ActionResult<usize> {
    run_blocking(db, "delete_resources", move |db| {
        ResourceRepo::delete_resources(db, &ids)
    })
    .await
}

// ============================================================================
// 资源
// ============================================================================

pub async fn shelf_add_resource(db: &Arc<ShelfDatabase>, input: NewResource) -> ActionResult<Resource> {
    run_blocking(db, "add_resource", move |db| {
        ResourceRepo::add_resource(db, &input)
    })
    .await
}

pub async fn shelf_get_resource(db: &Arc<ShelfDatabase>, id: String) -> ActionResult<Resource> {
    run_blocking(db, "get_resource", move |db| {
        ResourceRepo::get_resource(db, &id)?.ok_or(ShelfError::ResourceNotFound(id))
    })
    .await
}

pub async fn shelf_list_exam_resources(
    db: &Arc<ShelfDatabase>,
    exam_id: String,
) -> ActionResult<Vec<Resource>> {
    run_blocking(db, "list_exam_resources", move |db| {
        ResourceRepo::list_exam_resources(db, &exam_id)
    })
    .await
}

pub async fn shelf_list_chapter_resources(
    db: &Arc<ShelfDatabase>,
    input: ChapterInput,
) -> ActionResult<Vec<Resource>> {
    run_blocking(db, "list_chapter_resources", move |db| {
        ResourceRepo::list_chapter_resources(
            db,
            &input.exam_id,
            &input.path(),
            input.resource_type.as_deref(),
        )
    })
    .await
}

/// 公开浏览页：章节资源按生效的类型顺序分组
pub async fn shelf_list_chapter_groups(
    db: &Arc<ShelfDatabase>,
    input: ChapterInput,
) -> ActionResult<Vec<ResourceGroup>> {
    run_blocking(db, "list_chapter_groups", move |db| {
        let path = input.path();
        let resources = ResourceRepo::list_chapter_resources(db, &input.exam_id, &path, None)?;
        let order = SettingsRepo::resolved_type_order(db, &input.exam_id, &path)?;
        Ok(group_resources_by_type(resources, &order))
    })
    .await
}

pub async fn shelf_update_resource_order(
    db: &Arc<ShelfDatabase>,
    updates: Vec<ResourceOrderUpdate>,
) -> ActionResult<usize> {
    run_blocking(db, "update_resource_order", move |db| {
        ResourceRepo::update_resource_order(db, &updates)
    })
    .await
}

// ============================================================================
// 资源类型 / 章节类型顺序
// ============================================================================

pub async fn shelf_get_resource_types(db: &Arc<ShelfDatabase>) -> ActionResult<Vec<String>> {
    run_blocking(db, "get_resource_types", SettingsRepo::get_resource_types).await
}

pub async fn shelf_add_resource_type(db: &Arc<ShelfDatabase>, name: String) -> ActionResult<Vec<String>> {
    run_blocking(db, "add_resource_type", move |db| {
        SettingsRepo::add_resource_type(db, &name)
    })
    .await
}

pub async fn shelf_delete_resource_type(
    db: &Arc<ShelfDatabase>,
    name: String,
) -> ActionResult<Vec<String>> {
    run_blocking(db, "delete_resource_type", move |db| {
        SettingsRepo::delete_resource_type(db, &name)
    })
    .await
}

pub async fn shelf_set_resource_types(
    db: &Arc<ShelfDatabase>,
    types: Vec<String>,
) -> ActionResult<Vec<String>> {
    run_blocking(db, "set_resource_types", move |db| {
        SettingsRepo::set_resource_types(db, &types)
    })
    .await
}

pub async fn shelf_rename_resource_type(
    db: &Arc<ShelfDatabase>,
    input: RenameTypeInput,
) -> ActionResult<TypeRenameOutcome> {
    run_blocking(db, "rename_resource_type", move |db| {
        SettingsRepo::rename_resource_type(db, &input.old_name, &input.new_name)
    })
    .await
}

/// 章节实际使用的类型顺序（覆盖或全局）
pub async fn shelf_get_chapter_type_order(
    db: &Arc<ShelfDatabase>,
    input: ChapterInput,
) -> ActionResult<Vec<String>> {
    run_blocking(db, "get_chapter_type_order", move |db| {
        SettingsRepo::resolved_type_order(db, &input.exam_id, &input.path())
    })
    .await
}

pub async fn shelf_save_chapter_type_order(
    db: &Arc<ShelfDatabase>,
    input: SaveChapterTypeOrderInput,
) -> ActionResult<()> {
    run_blocking(db, "save_chapter_type_order", move |db| {
        let path = ResourcePath::new(input.subject, input.class_name, input.chapter);
        SettingsRepo::save_chapter_type_order(db, &input.exam_id, &path, &input.type_order)
    })
    .await
}

// ============================================================================
// 日历事件
// ============================================================================

pub async fn shelf_add_event(db: &Arc<ShelfDatabase>, input: EventInput) -> ActionResult<ExamEvent> {
    run_blocking(db, "add_event", move |db| EventRepo::add_event(db, &input)).await
}

pub async fn shelf_update_event(
    db: &Arc<ShelfDatabase>,
    input: UpdateEventInput,
) -> ActionResult<ExamEvent> {
    run_blocking(db, "update_event", move |db| {
        let (id, event) = input.into_parts();
        EventRepo::update_event(db, &id, &event)
    })
    .await
}

pub async fn shelf_get_event(db: &Arc<ShelfDatabase>, id: String) -> ActionResult<ExamEvent> {
    run_blocking(db, "get_event", move |db| {
        EventRepo::get_event(db, &id)?.ok_or(ShelfError::EventNotFound(id))
    })
    .await
}

pub async fn shelf_delete_event(db: &Arc<ShelfDatabase>, id: String) -> ActionResult<()> {
    run_blocking(db, "delete_event", move |db| EventRepo::delete_event(db, &id)).await
}

pub async fn shelf_list_events(
    db: &Arc<ShelfDatabase>,
    input: EventFilterInput,
) -> ActionResult<Vec<ExamEvent>> {
    run_blocking(db, "list_events", move |db| {
        EventRepo::list_events(db, input.exam_id.as_deref())
    })
    .await
}

pub async fn shelf_upcoming_events(
    db: &Arc<ShelfDatabase>,
    input: UpcomingEventsInput,
) -> ActionResult<Vec<ExamEvent>> {
    run_blocking(db, "upcoming_events", move |db| {
        let now = input.now.unwrap_or_else(Utc::now);
        EventRepo::upcoming_events(db, now, input.limit, input.exam_id.as_deref())
    })
    .await
}

// ============================================================================
// 建议
// ============================================================================

pub async fn shelf_add_suggestion(db: &Arc<ShelfDatabase>, content: String) -> ActionResult<Suggestion> {
    run_blocking(db, "add_suggestion", move |db| {
        SuggestionRepo::add_suggestion(db, &content)
    })
    .await
}

pub async fn shelf_list_suggestions(db: &Arc<ShelfDatabase>) -> ActionResult<Vec<Suggestion>> {
    run_blocking(db, "list_suggestions", SuggestionRepo::list_suggestions).await
}

pub async fn shelf_delete_suggestion(db: &Arc<ShelfDatabase>, id: String) -> ActionResult<()> {
    run_blocking(db, "delete_suggestion", move |db| {
        SuggestionRepo::delete_suggestion(db, &id)
    })
    .await
}

// ============================================================================
// JSON 命令分发
// ============================================================================

/// 所有命令的 JSON 形式，`command` 字段为 snake_case 命令名
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ShelfCommand {
    CreateExam(CreateExamInput),
    GetExam(ExamIdInput),
    ListExams,
    ListExamIds,
    GetStructure(ExamIdInput),
    SaveStructure(SaveStructureInput),
    RenameExam(RenameExamInput),
    DeleteExam(ExamIdInput),

    RenameSubject(RenameSubjectInput),
    RenameClass(RenameClassInput),
    RenameChapter(RenameChapterInput),
    ListPendingCascades,
    ResumePendingCascades,

    ScanOrphans(ExamIdInput),
    ScanOrphansDetailed(ExamIdInput),
    MoveResource(MoveResourceInput),
    DeleteResource(IdInput),
    DeleteResources(IdsInput),

    AddResource(NewResource),
    GetResource(IdInput),
    ListExamResources(ExamIdInput),
    ListChapterResources(ChapterInput),
    ListChapterGroups(ChapterInput),
    UpdateResourceOrder(UpdateOrderInput),

    GetResourceTypes,
    AddResourceType(TypeNameInput),
    DeleteResourceType(TypeNameInput),
    SetResourceTypes(SetTypesInput),
    RenameResourceType(RenameTypeInput),
    GetChapterTypeOrder(ChapterInput),
    SaveChapterTypeOrder(SaveChapterTypeOrderInput),

    AddEvent(EventInput),
    UpdateEvent(UpdateEventInput),
    GetEvent(IdInput),
    DeleteEvent(IdInput),
    ListEvents(EventFilterInput),
    UpcomingEvents(UpcomingEventsInput),

    AddSuggestion(SuggestionInput),
    ListSuggestions,
    DeleteSuggestion(IdInput),
}

fn to_json<T: Serialize>(result: ActionResult<T>) -> Value {
    serde_json::to_value(&result).unwrap_or_else(|e| {
        error!("[Shelf::Handlers] Failed to serialize result: {}", e);
        json!({
            "success": false,
            "error": format!("Serialization error: {}", e),
            "code": CODE_INTERNAL,
        })
    })
}

/// 执行一条命令，返回 `ActionResult` 的 JSON
pub async fn dispatch(db: &Arc<ShelfDatabase>, command: ShelfCommand) -> Value {
    use ShelfCommand as C;

    match command {
        C::CreateExam(input) => to_json(shelf_create_exam(db, input).await),
        C::GetExam(input) => to_json(shelf_get_exam(db, input.exam_id).await),
        C::ListExams => to_json(shelf_list_exams(db).await),
        C::ListExamIds => to_json(shelf_list_exam_ids(db).await),
        C::GetStructure(input) => to_json(shelf_get_structure(db, input.exam_id).await),
        C::SaveStructure(input) => to_json(shelf_save_structure(db, input).await),
        C::RenameExam(input) => to_json(shelf_rename_exam(db, input).await),
        C::DeleteExam(input) => to_json(shelf_delete_exam(db, input.exam_id).await),

        C::RenameSubject(input) => to_json(shelf_rename_subject(db, input).await),
        C::RenameClass(input) => to_json(shelf_rename_class(db, input).await),
        C::RenameChapter(input) => to_json(shelf_rename_chapter(db, input).await),
        C::ListPendingCascades => to_json(shelf_list_pending_cascades(db).await),
        C::ResumePendingCascades => to_json(shelf_resume_pending_cascades(db).await),

        C::ScanOrphans(input) => to_json(shelf_scan_orphans(db, input.exam_id).await),
        C::ScanOrphansDetailed(input) => {
            to_json(shelf_scan_orphans_detailed(db, input.exam_id).await)
        }
        C::MoveResource(input) => to_json(shelf_move_resource(db, input).await),
        C::DeleteResource(input) => to_json(shelf_delete_resource(db, input.id).await),
        C::DeleteResources(input) => to_json(shelf_delete_resources(db, input.ids).await),

        C::AddResource(input) => to_json(shelf_add_resource(db, input).await),
        C::GetResource(input) => to_json(shelf_get_resource(db, input.id).await),
        C::ListExamResources(input) => to_json(shelf_list_exam_resources(db, input.exam_id).await),
        C::ListChapterResources(input) => to_json(shelf_list_chapter_resources(db, input).await),
        C::ListChapterGroups(input) => to_json(shelf_list_chapter_groups(db, input).await),
        C::UpdateResourceOrder(input) => {
            to_json(shelf_update_resource_order(db, input.updates).await)
        }

        C::GetResourceTypes => to_json(shelf_get_resource_types(db).await),
        C::AddResourceType(input) => to_json(shelf_add_resource_type(db, input.name).await),
        C::DeleteResourceType(input) => to_json(shelf_delete_resource_type(db, input.name).await),
        C::SetResourceTypes(input) => to_json(shelf_set_resource_types(db, input.types).await),
        C::RenameResourceType(input) => to_json(shelf_rename_resource_type(db, input).await),
        C::GetChapterTypeOrder(input) => to_json(shelf_get_chapter_type_order(db, input).await),
        C::SaveChapterTypeOrder(input) => to_json(shelf_save_chapter_type_order(db, input).await),

        C::AddEvent(input) => to_json(shelf_add_event(db, input).await),
        C::UpdateEvent(input) => to_json(shelf_update_event(db, input).await),
        C::GetEvent(input) => to_json(shelf_get_event(db, input.id).await),
        C::DeleteEvent(input) => to_json(shelf_delete_event(db, input.id).await),
        C::ListEvents(input) => to_json(shelf_list_events(db, input).await),
        C::UpcomingEvents(input) => to_json(shelf_upcoming_events(db, input).await),

        C::AddSuggestion(input) => to_json(shelf_add_suggestion(db, input.content).await),
        C::ListSuggestions => to_json(shelf_list_suggestions(db).await),
        C::DeleteSuggestion(input) => to_json(shelf_delete_suggestion(db, input.id).await),
    }
}
