//! crates/tracker_core/src/progress.rs
//!
//! The progress aggregator: joins subjects, assignments and grades fetched for
//! one user into per-subject progress metrics and an assignment list annotated
//! with grades.
//!
//! Both operations are pure. They borrow their inputs, never mutate them, and
//! are recomputed from scratch on every fetch.

use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::domain::{Assignment, Grade, Subject};

//=========================================================================================
// Derived Types
//=========================================================================================

/// Point totals of one subject, summed over the grades that reference it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProgress {
    pub subject: Subject,
    pub total_assignments: usize,
    pub total_achieved: f64,
    pub total_lost: f64,
    pub total_possible: f64,
}

/// An assignment paired with its grade, if one has been recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentWithGrade {
    pub assignment: Assignment,
    pub grade: Option<Grade>,
}

//=========================================================================================
// Aggregation
//=========================================================================================

/// Computes one [`SubjectProgress`] per subject, in the order of `subjects`.
///
/// Assignments and grades without a subject reference are skipped. A subject
/// with no grades yields zero totals.
pub fn compute_subject_progress(
    subjects: &[Subject],
    assignments: &[Assignment],
    grades: &[Grade],
) -> Vec<SubjectProgress> {
    subjects
        .iter()
        .map(|subject| {
            let total_assignments = assignments
                .iter()
                .filter(|a| {
                    a.subject_ref
                        .as_ref()
                        .is_some_and(|r| r.points_to(&subject.id))
                })
                .count();

            let (total_achieved, total_possible) = grades
                .iter()
                .filter(|g| {
                    g.subject_ref
                        .as_ref()
                        .is_some_and(|r| r.points_to(&subject.id))
                })
                .fold((0.0, 0.0), |(achieved, possible), g| {
                    (achieved + g.points_achieved, possible + g.points_possible)
                });

            SubjectProgress {
                subject: subject.clone(),
                total_assignments,
                total_achieved,
                total_lost: total_possible - total_achieved,
                total_possible,
            }
        })
        .collect()
}

/// Pairs every assignment with the first grade whose assignment reference
/// matches it.
///
/// The grade index is built once, keeping the first occurrence per
/// assignment, so the result equals a per-assignment linear search.
pub fn annotate_assignments_with_grades(
    assignments: &[Assignment],
    grades: &[Grade],
) -> Vec<AssignmentWithGrade> {
    let mut by_assignment: HashMap<&str, &Grade> = HashMap::with_capacity(grades.len());
    for grade in grades {
        if let Some(assignment_ref) = &grade.assignment_ref {
            let key = assignment_ref.id();
            if !key.is_empty() {
                by_assignment.entry(key).or_insert(grade);
            }
        }
    }

    assignments
        .iter()
        .map(|assignment| AssignmentWithGrade {
            assignment: assignment.clone(),
            grade: by_assignment
                .get(assignment.id.as_str())
                .map(|g| (*g).clone()),
        })
        .collect()
}

//=========================================================================================
// Progress Bar Rendering
//=========================================================================================

/// How point totals are turned into bar segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarScale {
    /// Achieved and lost as a share of the points possible so far.
    #[default]
    Normalized,
    /// Raw point sums read directly as course percentages; whatever is not yet
    /// possible is outstanding.
    RawPoints,
}

impl FromStr for BarScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normalized" | "normalised" => Ok(BarScale::Normalized),
            "raw_points" | "raw" => Ok(BarScale::RawPoints),
            other => Err(format!("'{other}' is not a valid progress bar scale")),
        }
    }
}

/// The three segments of a subject's progress bar, each in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressBar {
    pub achieved: f64,
    pub lost: f64,
    pub outstanding: f64,
}

impl ProgressBar {
    pub const NEUTRAL: ProgressBar = ProgressBar {
        achieved: 0.0,
        lost: 0.0,
        outstanding: 100.0,
    };
}

impl SubjectProgress {
    /// Achieved points as a percentage of points possible, once anything is graded.
    pub fn percentage(&self) -> Option<f64> {
        (self.total_possible > 0.0).then(|| self.total_achieved / self.total_possible * 100.0)
    }

    pub fn meets_target(&self) -> Option<bool> {
        self.percentage()
            .map(|pct| pct >= self.subject.target_grade_percent)
    }

    pub fn bar(&self, scale: BarScale) -> ProgressBar {
        if self.total_possible <= 0.0 {
            return ProgressBar::NEUTRAL;
        }
        match scale {
            BarScale::Normalized => ProgressBar {
                achieved: self.total_achieved / self.total_possible * 100.0,
                lost: self.total_lost / self.total_possible * 100.0,
                outstanding: 0.0,
            },
            BarScale::RawPoints => ProgressBar {
                achieved: clamp_pct(self.total_achieved),
                lost: clamp_pct(self.total_lost),
                outstanding: clamp_pct(100.0 - self.total_possible),
            },
        }
    }
}

fn clamp_pct(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}
