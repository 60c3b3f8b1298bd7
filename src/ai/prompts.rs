use crate::models::{Insights, Priority, Task};
use chrono::NaiveDate;
use rocket::serde::Serialize;

/// The slice of a task the model gets to see.
#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
struct TaskDigest<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<NaiveDate>,
    completed: bool,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a [String],
}

impl<'a> From<&'a Task> for TaskDigest<'a> {
    fn from(task: &'a Task) -> Self {
        TaskDigest {
            title: &task.title,
            description: task.description.as_deref(),
            priority: task.priority,
            due_date: task.due_date,
            completed: task.completed,
            tags: task.tags.as_deref().unwrap_or(&[]),
        }
    }
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

fn tasks_as_json(tasks: &[Task]) -> String {
    let digests: Vec<TaskDigest<'_>> = tasks.iter().map(TaskDigest::from).collect();
    serde_json::to_string_pretty(&digests).unwrap_or_else(|_| "[]".to_string())
}

pub fn tags_prompt(title: &str, description: Option<&str>) -> String {
    format!(
        "Suggest up to 3 short tags (one or two words each) that categorize this task.\n\
         Respond with the tags only, comma-separated, no numbering or explanation.\n\n\
         Title: {}\nDescription: {}",
        title,
        description.unwrap_or("(none)")
    )
}

pub fn insights_prompt(tasks: &[Task]) -> String {
    format!(
        "You are a productivity assistant. Analyze the user's tasks below.\n\
         Group related task titles into a few named categories, give 2-4 concrete \
         recommendations, and state the completion rate as a percentage string.\n\n\
         Respond with a single JSON object in a ```json code block, shaped exactly like:\n\
         {{\"categories\": [{{\"name\": \"...\", \"tasks\": [\"task title\"]}}], \
         \"recommendations\": [\"...\"], \"completion_rate\": \"NN%\"}}\n\n\
         Tasks:\n{}",
        tasks_as_json(tasks)
    )
}

pub fn report_prompt(tasks: &[Task], insights: &Insights) -> String {
    let insights_json = serde_json::to_string_pretty(insights).unwrap_or_else(|_| "{}".to_string());
    format!(
        "You are a productivity coach writing a progress report for the user.\n\
         Use the tasks and the previously computed insights below.\n\n\
         Respond with a single JSON object in a ```json code block, shaped exactly like:\n\
         {{\"executive_summary\": {{\"overview\": \"...\", \"key_metrics\": \
         [{{\"label\": \"...\", \"value\": \"...\"}}]}}, \
         \"sections\": [{{\"title\": \"...\", \"content\": \"...\"}}], \
         \"recommendations\": [\"...\"]}}\n\n\
         Tasks:\n{}\n\nInsights:\n{}",
        tasks_as_json(tasks),
        insights_json
    )
}
