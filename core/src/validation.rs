use crate::{
    error::{Result, TaskError},
    models::{FeedbackInput, FileRef, SuccessCriterion, TaskPriority},
};

/// Validation utilities for task fields (§3, §7 `InvalidInput`).
pub struct TaskValidator;

impl TaskValidator {
    pub fn validate_title(title: &str) -> Result<()> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(TaskError::invalid_input("title must not be empty"));
        }
        if title.chars().count() > 500 {
            return Err(TaskError::invalid_input("title must be at most 500 characters"));
        }
        Ok(())
    }

    pub fn validate_description(description: &str) -> Result<()> {
        if description.chars().count() > 10_000 {
            return Err(TaskError::invalid_input("description is too long"));
        }
        Ok(())
    }

    /// §3: ≤10 criteria, each criterion/measurable ≤500 chars.
    pub fn validate_success_criteria(criteria: &[SuccessCriterion]) -> Result<()> {
        if criteria.len() > 10 {
            return Err(TaskError::invalid_input("success_criteria accepts at most 10 items"));
        }
        for c in criteria {
            if c.criterion.trim().is_empty() {
                return Err(TaskError::invalid_input("criterion must not be empty"));
            }
            if c.criterion.chars().count() > 500 || c.measurable.chars().count() > 500 {
                return Err(TaskError::invalid_input(
                    "criterion and measurable must be at most 500 characters",
                ));
            }
            crate::criteria::parse_measurable(&c.measurable)?;
        }
        Ok(())
    }

    /// §3: completion_summary is 20-2000 chars when present.
    pub fn validate_completion_summary(summary: &str) -> Result<()> {
        let len = summary.chars().count();
        if !(20..=2000).contains(&len) {
            return Err(TaskError::invalid_input(
                "completion_summary must be between 20 and 2000 characters",
            ));
        }
        Ok(())
    }

    pub fn validate_feedback_notes(notes: &str) -> Result<()> {
        if notes.chars().count() > 500 {
            return Err(TaskError::invalid_input("feedback_notes must be at most 500 characters"));
        }
        Ok(())
    }

    /// §3: feedback scores are integers in [1,5] when present.
    pub fn validate_feedback(feedback: &FeedbackInput) -> Result<()> {
        if let Some(q) = feedback.quality {
            if !(1..=5).contains(&q) {
                return Err(TaskError::invalid_input("feedback quality must be in 1..=5"));
            }
        }
        if let Some(t) = feedback.timeliness {
            if !(1..=5).contains(&t) {
                return Err(TaskError::invalid_input("feedback timeliness must be in 1..=5"));
            }
        }
        if let Some(note) = &feedback.note {
            Self::validate_feedback_notes(note)?;
        }
        Ok(())
    }

    pub fn validate_hours(hours: f64, field: &str) -> Result<()> {
        if hours < 0.0 || !hours.is_finite() {
            return Err(TaskError::invalid_input(format!("{field} must be a non-negative number")));
        }
        Ok(())
    }

    pub fn validate_file_ref(file_ref: &FileRef) -> Result<()> {
        if file_ref.path.trim().is_empty() {
            return Err(TaskError::invalid_input("file_ref path must not be empty"));
        }
        if let (Some(start), Some(end)) = (file_ref.line_start, file_ref.line_end) {
            if end < start {
                return Err(TaskError::invalid_input("file_ref line_end must be >= line_start"));
            }
        }
        Ok(())
    }

    pub fn validate_priority_str(value: &str) -> Result<TaskPriority> {
        match value.to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            other => Err(TaskError::invalid_input(format!("unknown priority '{other}'"))),
        }
    }
}
