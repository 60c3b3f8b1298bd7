//! AI-derived tags, insights and reports.
//!
//! Every operation is best effort: one model call, no retries, and a
//! deterministic local fallback whenever the call or its output is unusable.
//! Callers never see an error.

pub mod client;
pub mod extract;
pub mod fallback;
pub mod prompts;

use crate::models::{Insights, Report, Task};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

pub use client::{AiError, ChatCompletionsClient, TextGenerator};
pub use fallback::DEFAULT_TAG;

pub const MAX_TAGS: usize = 3;
pub const MAX_TAG_LEN: usize = 24;

/// The model-backed assistant, built once at startup and shared through
/// Rocket managed state.
#[derive(Clone)]
pub struct AiAssistant {
    generator: Arc<dyn TextGenerator>,
}

impl AiAssistant {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        AiAssistant { generator }
    }

    /// Up to [`MAX_TAGS`] short tags for a task, `["general"]` on failure.
    pub async fn suggest_tags(&self, title: &str, description: Option<&str>) -> Vec<String> {
        let prompt = prompts::tags_prompt(title, description);
        match self.generator.generate(&prompt).await {
            Ok(text) => {
                let tags = parse_tags(&text);
                if tags.is_empty() {
                    warn!(operation = "tags", failure = "output", "model returned no usable tags");
                    vec![DEFAULT_TAG.to_string()]
                } else {
                    tags
                }
            }
            Err(err) => {
                warn!(operation = "tags", failure = err.failure_class(), error = %err, "falling back to default tag");
                vec![DEFAULT_TAG.to_string()]
            }
        }
    }

    pub async fn generate_insights(&self, tasks: &[Task]) -> Insights {
        let today = Utc::now().date_naive();
        if tasks.is_empty() {
            return fallback::insights(tasks, today);
        }
        let prompt = prompts::insights_prompt(tasks);
        match self.structured::<Insights>(&prompt).await.and_then(validate_insights) {
            Ok(insights) => insights,
            Err(err) => {
                warn!(operation = "insights", failure = err.failure_class(), error = %err, "using local insights");
                fallback::insights(tasks, today)
            }
        }
    }

    pub async fn generate_report(&self, tasks: &[Task], insights: &Insights) -> Report {
        let today = Utc::now().date_naive();
        if tasks.is_empty() {
            return fallback::report(tasks, insights, today);
        }
        let prompt = prompts::report_prompt(tasks, insights);
        match self.structured::<Report>(&prompt).await.and_then(validate_report) {
            Ok(mut report) => {
                report.generated_at = Utc::now();
                report
            }
            Err(err) => {
                warn!(operation = "report", failure = err.failure_class(), error = %err, "using local report");
                fallback::report(tasks, insights, today)
            }
        }
    }

    async fn structured<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, AiError> {
        let text = self.generator.generate(prompt).await?;
        debug!(chars = text.len(), "model answered");
        let json = extract::extract_json_object(&text).ok_or(AiError::NoJson)?;
        Ok(serde_json::from_str(json)?)
    }
}

fn validate_insights(insights: Insights) -> Result<Insights, AiError> {
    if insights.categories.is_empty() {
        return Err(AiError::InvalidShape("no categories".to_string()));
    }
    if insights.categories.iter().any(|c| c.name.trim().is_empty()) {
        return Err(AiError::InvalidShape("unnamed category".to_string()));
    }
    if !insights.completion_rate.trim_end().ends_with('%') {
        return Err(AiError::InvalidShape(format!(
            "completion rate `{}` is not a percentage",
            insights.completion_rate
        )));
    }
    Ok(insights)
}

fn validate_report(report: Report) -> Result<Report, AiError> {
    if report.sections.is_empty() {
        return Err(AiError::InvalidShape("no sections".to_string()));
    }
    if report.executive_summary.overview.trim().is_empty() {
        return Err(AiError::InvalidShape("empty overview".to_string()));
    }
    Ok(report)
}

/// Splits a comma- or newline-separated model answer into at most
/// [`MAX_TAGS`] clean, lowercase, de-duplicated tags. A leading `label:`
/// such as `Tags:` is dropped.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for piece in raw.split(|c: char| c == ',' || c == '\n') {
        let unlabelled = piece.rsplit(':').next().unwrap_or(piece);
        let cleaned = unlabelled
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '#' | '*' | '.' | '-') || c.is_whitespace())
            .to_lowercase();
        if cleaned.is_empty() {
            continue;
        }
        let tag: String = cleaned.chars().take(MAX_TAG_LEN).collect();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
        if tags.len() == MAX_TAGS {
            break;
        }
    }
    tags
}
