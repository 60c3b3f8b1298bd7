use crate::ai::{AiAssistant, MAX_TAGS};
use crate::models::{CreateTaskRequest, NewTask, Task, TaskChanges, UpdateTaskRequest};
use crate::store::Repository;
use super::error::ServiceError;
use tracing::info;
use uuid::Uuid;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2000;

// Limits apply to the trimmed text; the title is stored as sent.
fn check_title(raw: String) -> Result<String, ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid("title", "Title is required"));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(ServiceError::invalid(
            "title",
            format!("Title must be at most {} characters", MAX_TITLE_LEN),
        ));
    }
    Ok(raw)
}

fn check_description(raw: Option<String>) -> Result<Option<String>, ServiceError> {
    if let Some(ref d) = raw {
        if d.trim().chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ServiceError::invalid(
                "description",
                format!("Description must be at most {} characters", MAX_DESCRIPTION_LEN),
            ));
        }
    }
    Ok(raw)
}

// Unparseable ids cannot name an existing task.
fn parse_task_id(item_id_str: &str) -> Option<Uuid> {
    Uuid::parse_str(item_id_str).ok()
}

pub fn list_tasks(repo: &dyn Repository, user_id: Uuid) -> Result<Vec<Task>, ServiceError> {
    Ok(repo.list_tasks(user_id)?)
}

/// Validates the request, asks the assistant for tags and persists the task.
pub async fn create_task(
    repo: &dyn Repository,
    ai: &AiAssistant,
    user_id: Uuid,
    create_req: CreateTaskRequest,
) -> Result<Task, ServiceError> {
    let title = check_title(create_req.title)?;
    let description = check_description(create_req.description)?;

    let mut tags = ai.suggest_tags(title.trim(), description.as_deref().map(str::trim)).await;
    tags.truncate(MAX_TAGS);

    let task = repo.create_task(NewTask {
        id: Uuid::new_v4(),
        user_id,
        title,
        description,
        priority: create_req.priority,
        due_date: create_req.due_date,
        tags: Some(tags),
    })?;
    info!(task_id = %task.id, user_id = %user_id, "task created");
    Ok(task)
}

pub fn update_task(
    repo: &dyn Repository,
    user_id: Uuid,
    item_id_str: &str,
    update_req: UpdateTaskRequest,
) -> Result<Task, ServiceError> {
    let not_found = || ServiceError::NotFound("Task not found".to_string());
    let task_id = parse_task_id(item_id_str).ok_or_else(not_found)?;

    let changes = TaskChanges {
        title: update_req.title.map(check_title).transpose()?,
        description: update_req.description.map(check_description).transpose()?,
        priority: update_req.priority,
        due_date: update_req.due_date,
        completed: update_req.completed,
        ai_notes: update_req.ai_notes,
    };

    repo.update_task(user_id, task_id, &changes)?
        .ok_or_else(not_found)
}

/// Deleting an absent task is not an error.
pub fn delete_task(repo: &dyn Repository, user_id: Uuid, item_id_str: &str) -> Result<(), ServiceError> {
    if let Some(task_id) = parse_task_id(item_id_str) {
        if repo.delete_task(user_id, task_id)? {
            info!(task_id = %task_id, user_id = %user_id, "task deleted");
        }
    }
    Ok(())
}
