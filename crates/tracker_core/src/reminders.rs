//! crates/tracker_core/src/reminders.rs
//!
//! Builds "assignment due soon" notifications.

use chrono::{Duration, NaiveDate};

use crate::domain::{Assignment, Notification, NotificationKind};

pub const REMINDER_TITLE: &str = "Assignment Reminder";

pub fn reminder_message(assignment: &Assignment, due: NaiveDate) -> String {
    format!(
        "Don't forget! Your assignment \"{}\" is due on {}.",
        assignment.name,
        due.format("%Y-%m-%d")
    )
}

/// Returns a reminder for each assignment due within `window_days` of `today`
/// (both ends inclusive) that has not been reminded about yet.
///
/// A window reaching past the last representable date is clamped to it.
///
/// An assignment counts as reminded when `existing` already holds a
/// notification with the same owner, title and message.
pub fn due_soon_reminders(
    assignments: &[Assignment],
    existing: &[Notification],
    today: NaiveDate,
    window_days: i64,
) -> Vec<Notification> {
    let horizon = Duration::try_days(window_days.max(0))
        .and_then(|window| today.checked_add_signed(window))
        .unwrap_or(NaiveDate::MAX);

    assignments
        .iter()
        .filter_map(|assignment| {
            let due = assignment.due_date?;
            if due < today || due > horizon {
                return None;
            }
            let message = reminder_message(assignment, due);
            let already_sent = existing.iter().any(|n| {
                n.title == REMINDER_TITLE
                    && n.message == message
                    && n.owner_ref == assignment.owner_ref
            });
            (!already_sent).then(|| Notification {
                id: String::new(),
                owner_ref: assignment.owner_ref.clone(),
                title: REMINDER_TITLE.to_string(),
                message,
                kind: NotificationKind::Reminder,
                read: false,
                created_at: None,
            })
        })
        .collect()
}
