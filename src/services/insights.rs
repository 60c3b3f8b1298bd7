use crate::ai::AiAssistant;
use crate::models::{Insights, Report};
use crate::store::Repository;
use super::error::ServiceError;
use uuid::Uuid;

pub const NO_TASKS_MESSAGE: &str = "No tasks found. Add some tasks before generating a report.";

pub async fn insights_for(
    repo: &dyn Repository,
    ai: &AiAssistant,
    user_id: Uuid,
) -> Result<Insights, ServiceError> {
    let tasks = repo.list_tasks(user_id)?;
    Ok(ai.generate_insights(&tasks).await)
}

/// Insights are computed first and fed into the report.
pub async fn report_for(
    repo: &dyn Repository,
    ai: &AiAssistant,
    user_id: Uuid,
) -> Result<Report, ServiceError> {
    let tasks = repo.list_tasks(user_id)?;
    if tasks.is_empty() {
        return Err(ServiceError::InvalidInput {
            field: None,
            message: NO_TASKS_MESSAGE.to_string(),
        });
    }
    let insights = ai.generate_insights(&tasks).await;
    Ok(ai.generate_report(&tasks, &insights).await)
}
