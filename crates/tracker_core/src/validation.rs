//! crates/tracker_core/src/validation.rs
//!
//! Client-side checks applied before an entity is submitted to the backend.

use crate::domain::{
    Assignment, Event, Grade, Notification, Semester, Subject, Teacher, TimetableEntry, User,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Points achieved ({achieved}) cannot exceed points possible ({possible})")]
    PointsExceedPossible { achieved: f64, possible: f64 },
    #[error("Points possible must be greater than zero, got {0}")]
    NonPositivePossible(f64),
    #[error("Points achieved cannot be negative, got {0}")]
    NegativeAchieved(f64),
    #[error("Points must be finite numbers")]
    NotFinite,
    #[error("All fields are required: missing {0}")]
    MissingField(&'static str),
    #[error("Target grade must be between 0 and 100, got {0}")]
    TargetOutOfRange(f64),
    #[error("End date cannot be before start date")]
    EndBeforeStart,
    #[error("A class cannot end before it starts")]
    EndsBeforeItStarts,
}

/// Entities that can be checked before submission.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for Grade {
    fn validate(&self) -> Result<(), ValidationError> {
        let (achieved, possible) = (self.points_achieved, self.points_possible);
        if !achieved.is_finite() || !possible.is_finite() {
            return Err(ValidationError::NotFinite);
        }
        if possible <= 0.0 {
            return Err(ValidationError::NonPositivePossible(possible));
        }
        if achieved < 0.0 {
            return Err(ValidationError::NegativeAchieved(achieved));
        }
        if achieved > possible {
            return Err(ValidationError::PointsExceedPossible { achieved, possible });
        }
        Ok(())
    }
}

impl Validate for Assignment {
    fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        if self.due_date.is_none() {
            return Err(ValidationError::MissingField("dueDate"));
        }
        Ok(())
    }
}

impl Validate for Subject {
    fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        let target = self.target_grade_percent;
        if !target.is_finite() || !(0.0..=100.0).contains(&target) {
            return Err(ValidationError::TargetOutOfRange(target));
        }
        Ok(())
    }
}

impl Validate for Semester {
    fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end < start => Err(ValidationError::EndBeforeStart),
            _ => Ok(()),
        }
    }
}

impl Validate for Teacher {
    fn validate(&self) -> Result<(), ValidationError> {
        require("firstName", &self.first_name)?;
        require("lastName", &self.last_name)
    }
}

impl Validate for Notification {
    fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)
    }
}

impl Validate for Event {
    fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        if self.date.is_none() {
            return Err(ValidationError::MissingField("date"));
        }
        Ok(())
    }
}

impl Validate for TimetableEntry {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.subject_ref.as_ref().map_or(true, |r| r.id().is_empty()) {
            return Err(ValidationError::MissingField("subjectRef"));
        }
        if self.day.is_none() {
            return Err(ValidationError::MissingField("day"));
        }
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if end <= start => Err(ValidationError::EndsBeforeItStarts),
            (Some(_), Some(_)) => Ok(()),
            (None, _) => Err(ValidationError::MissingField("startTime")),
            (_, None) => Err(ValidationError::MissingField("endTime")),
        }
    }
}

impl Validate for User {
    fn validate(&self) -> Result<(), ValidationError> {
        require("email", &self.email)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}
