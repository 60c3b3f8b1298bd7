//! Locally computed substitutes for model output. Deterministic for a given
//! task set and date.

use crate::models::{
    ExecutiveSummary, InsightCategory, Insights, Metric, Priority, Report, ReportSection, Task,
};
use chrono::{NaiveDate, Utc};

pub const DEFAULT_TAG: &str = "general";

struct Counts {
    total: usize,
    completed: usize,
    high_pending: usize,
    overdue: usize,
}

impl Counts {
    fn of(tasks: &[Task], today: NaiveDate) -> Self {
        let completed = tasks.iter().filter(|t| t.completed).count();
        let high_pending = tasks
            .iter()
            .filter(|t| !t.completed && t.priority == Priority::High)
            .count();
        let overdue = tasks
            .iter()
            .filter(|t| !t.completed && t.due_date.map_or(false, |due| due < today))
            .count();
        Counts {
            total: tasks.len(),
            completed,
            high_pending,
            overdue,
        }
    }

    fn pending(&self) -> usize {
        self.total - self.completed
    }
}

/// `completed / total` as a rounded percentage string, `"0%"` for no tasks.
pub fn completion_rate(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "0%".to_string();
    }
    let completed = tasks.iter().filter(|t| t.completed).count();
    let rate = (completed as f64 / tasks.len() as f64 * 100.0).round() as u32;
    format!("{}%", rate)
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub fn insights(tasks: &[Task], today: NaiveDate) -> Insights {
    if tasks.is_empty() {
        return Insights {
            categories: Vec::new(),
            recommendations: vec!["Add a few tasks to start receiving insights.".to_string()],
            completion_rate: "0%".to_string(),
        };
    }

    let mut categories: Vec<InsightCategory> = Priority::ALL
        .iter()
        .map(|priority| InsightCategory {
            name: priority.label().to_string(),
            tasks: tasks
                .iter()
                .filter(|t| !t.completed && t.priority == *priority)
                .map(|t| t.title.clone())
                .collect(),
        })
        .collect();
    categories.push(InsightCategory {
        name: "Completed".to_string(),
        tasks: tasks
            .iter()
            .filter(|t| t.completed)
            .map(|t| t.title.clone())
            .collect(),
    });
    categories.retain(|c| !c.tasks.is_empty());

    let counts = Counts::of(tasks, today);
    let mut recommendations = Vec::new();
    if counts.high_pending > 0 {
        recommendations.push(format!(
            "Focus on your {} high-priority task{} first.",
            counts.high_pending,
            plural(counts.high_pending)
        ));
    }
    if counts.overdue > 0 {
        recommendations.push(format!(
            "You have {} overdue task{}; reschedule or finish {} soon.",
            counts.overdue,
            plural(counts.overdue),
            if counts.overdue == 1 { "it" } else { "them" }
        ));
    }
    if counts.pending() == 0 {
        recommendations.push("Everything is done. Plan what comes next.".to_string());
    } else {
        recommendations.push("Break large tasks into smaller, concrete steps.".to_string());
    }
    recommendations.push("Review your task list at the start of each day.".to_string());

    Insights {
        categories,
        recommendations,
        completion_rate: completion_rate(tasks),
    }
}

pub fn report(tasks: &[Task], insights: &Insights, today: NaiveDate) -> Report {
    let counts = Counts::of(tasks, today);
    let rate = completion_rate(tasks);

    let overview = if counts.total == 0 {
        "You have no tasks yet. Add some to start tracking your progress.".to_string()
    } else {
        format!(
            "You have {} task{}: {} completed and {} pending, a completion rate of {}.",
            counts.total,
            plural(counts.total),
            counts.completed,
            counts.pending(),
            rate
        )
    };

    let metric = |label: &str, value: String| Metric {
        label: label.to_string(),
        value,
    };
    let key_metrics = vec![
        metric("Total Tasks", counts.total.to_string()),
        metric("Completed", counts.completed.to_string()),
        metric("Pending", counts.pending().to_string()),
        metric("Completion Rate", rate.clone()),
        metric("High Priority Pending", counts.high_pending.to_string()),
        metric("Overdue", counts.overdue.to_string()),
    ];

    let breakdown = Priority::ALL
        .iter()
        .map(|priority| {
            let of_priority: Vec<&Task> = tasks.iter().filter(|t| t.priority == *priority).collect();
            let done = of_priority.iter().filter(|t| t.completed).count();
            format!("{}: {} total, {} completed.", priority.label(), of_priority.len(), done)
        })
        .collect::<Vec<_>>()
        .join(" ");

    let insight_text = if insights.categories.is_empty() {
        "No task groups could be identified yet.".to_string()
    } else {
        insights
            .categories
            .iter()
            .map(|c| format!("{} ({})", c.name, c.tasks.len()))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let sections = vec![
        ReportSection {
            title: "Task Overview".to_string(),
            content: overview.clone(),
        },
        ReportSection {
            title: "Priority Breakdown".to_string(),
            content: breakdown,
        },
        ReportSection {
            title: "Insights".to_string(),
            content: format!("Task groups: {}.", insight_text.trim_end_matches('.')),
        },
    ];

    let recommendations = if insights.recommendations.is_empty() {
        vec!["Keep adding and completing tasks to build momentum.".to_string()]
    } else {
        insights.recommendations.clone()
    };

    Report {
        executive_summary: ExecutiveSummary {
            overview,
            key_metrics,
        },
        sections,
        recommendations,
        generated_at: Utc::now(),
    }
}
