//! crates/tracker_core/src/domain.rs
//!
//! Defines the core data structures of the academic tracker.
//! These structs are independent of the backend's wire format; adapters map
//! their own records into them.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned identifier of any backend entity.
pub type EntityId = String;

//=========================================================================================
// Entity Kinds and the Entity Trait
//=========================================================================================

/// The entity collections exposed by the academic backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Subject,
    Assignment,
    Grade,
    Semester,
    Teacher,
    Notification,
    Event,
    TimetableEntry,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Subject => "subject",
            EntityKind::Assignment => "assignment",
            EntityKind::Grade => "grade",
            EntityKind::Semester => "semester",
            EntityKind::Teacher => "teacher",
            EntityKind::Notification => "notification",
            EntityKind::Event => "event",
            EntityKind::TimetableEntry => "timetable entry",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common surface of every entity that has its own id and CRUD endpoints.
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    /// The user owning this record, if the record carries one.
    fn owner_id(&self) -> Option<&str>;

    /// Stamps the owning user on a record about to be created.
    fn set_owner(&mut self, user_id: &str);
}

//=========================================================================================
// Foreign Keys
//=========================================================================================

/// A reference to another entity.
///
/// The backend returns joined foreign keys either as a raw id or as the
/// populated object. Both shapes are kept explicit here; consumers that only
/// need the key call [`Ref::id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ref<T> {
    Id { id: EntityId },
    Populated { value: T },
}

impl<T: Entity> Ref<T> {
    pub fn to(id: impl Into<EntityId>) -> Self {
        Ref::Id { id: id.into() }
    }

    /// The referenced id, whichever shape the reference arrived in.
    pub fn id(&self) -> &str {
        match self {
            Ref::Id { id } => id,
            Ref::Populated { value } => value.id(),
        }
    }

    pub fn populated(&self) -> Option<&T> {
        match self {
            Ref::Id { .. } => None,
            Ref::Populated { value } => Some(value),
        }
    }

    pub fn points_to(&self, id: &str) -> bool {
        !id.is_empty() && self.id() == id
    }
}

//=========================================================================================
// Academic Entities
//=========================================================================================

/// A course a student is enrolled in, with a target grade threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub target_grade_percent: f64,
    #[serde(default)]
    pub teacher_ref: Option<Ref<Teacher>>,
    #[serde(default)]
    pub semester_ref: Option<Ref<Semester>>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub owner_ref: Option<EntityId>,
}

/// A gradable unit of work belonging to exactly one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subject_ref: Option<Ref<Subject>>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub owner_ref: Option<EntityId>,
}

/// A recorded achieved/possible point pair, optionally linked to an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    #[serde(default)]
    pub id: EntityId,
    pub points_achieved: f64,
    pub points_possible: f64,
    #[serde(default)]
    pub subject_ref: Option<Ref<Subject>>,
    #[serde(default)]
    pub assignment_ref: Option<Ref<Assignment>>,
    #[serde(default)]
    pub owner_ref: Option<EntityId>,
}

/// A named term with optional start and end dates that subjects are filed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub owner_ref: Option<EntityId>,
}

/// Contact card for someone teaching one of the user's subjects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub owner_ref: Option<EntityId>,
}

impl Teacher {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Student,
    Teacher,
    Admin,
}

/// A signed-up account. Users own every other record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[default]
    Info,
    Reminder,
    Alert,
    Success,
}

/// A message in the user's inbox, such as a due-soon reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub owner_ref: Option<EntityId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A calendar entry on the agenda that is not graded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub owner_ref: Option<EntityId>,
}

/// A weekly class slot.
///
/// Times are wall-clock times of day; `day` is serialised as `"Mon"`..`"Sun"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub subject_ref: Option<Ref<Subject>>,
    #[serde(default)]
    pub day: Option<Weekday>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub owner_ref: Option<EntityId>,
}

/// Per-user preferences. Keyed by the owning user rather than an own id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default)]
    pub owner_ref: EntityId,
    #[serde(default = "enabled")]
    pub email_notifications: bool,
    #[serde(default)]
    pub sms_notifications: bool,
    #[serde(default = "enabled")]
    pub push_notifications: bool,
    #[serde(default)]
    pub private_profile: bool,
    #[serde(default)]
    pub location_access: bool,
    #[serde(default = "enabled")]
    pub two_factor: bool,
}

fn enabled() -> bool {
    true
}

impl UserSettings {
    pub fn defaults_for(user_id: impl Into<EntityId>) -> Self {
        Self {
            owner_ref: user_id.into(),
            email_notifications: true,
            sms_notifications: false,
            push_notifications: true,
            private_profile: false,
            location_access: false,
            two_factor: true,
        }
    }
}

//=========================================================================================
// Entity Trait Implementations
//=========================================================================================

macro_rules! owned_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn owner_id(&self) -> Option<&str> {
                self.owner_ref.as_deref()
            }

            fn set_owner(&mut self, user_id: &str) {
                self.owner_ref = Some(user_id.to_string());
            }
        }
    };
}

owned_entity!(Subject, EntityKind::Subject);
owned_entity!(Assignment, EntityKind::Assignment);
owned_entity!(Grade, EntityKind::Grade);
owned_entity!(Semester, EntityKind::Semester);
owned_entity!(Teacher, EntityKind::Teacher);
owned_entity!(Notification, EntityKind::Notification);
owned_entity!(Event, EntityKind::Event);
owned_entity!(TimetableEntry, EntityKind::TimetableEntry);

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> &str {
        &self.id
    }

    // A user record is owned by itself.
    fn owner_id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn set_owner(&mut self, _user_id: &str) {}
}

//=========================================================================================
// Authentication Context
//=========================================================================================

/// An opaque credential issued by the backend at sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// The signed-in user on whose behalf backend calls are made.
///
/// Passed explicitly to every port call instead of being read from global state.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: EntityId,
    pub display_name: Option<String>,
    pub token: BearerToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teacher(id: &str) -> Teacher {
        Teacher {
            id: id.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
            email: None,
            owner_ref: None,
        }
    }

    #[test]
    fn ref_id_is_the_same_for_both_shapes() {
        let by_id: Ref<Teacher> = Ref::to("t1");
        let populated = Ref::Populated { value: teacher("t1") };
        assert_eq!(by_id.id(), "t1");
        assert_eq!(populated.id(), "t1");
        assert_eq!(populated.id(), by_id.id());
        assert!(by_id.populated().is_none());
        assert!(populated.populated().is_some());
    }

    #[test]
    fn empty_ids_never_match() {
        let r: Ref<Teacher> = Ref::to("");
        assert!(!r.points_to(""));
    }

    #[test]
    fn ref_serializes_as_tagged_union() {
        let r: Ref<Teacher> = Ref::to("t9");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "id", "id": "t9" }));
    }

    #[test]
    fn bearer_token_debug_is_redacted() {
        let token = BearerToken::new("secret.jwt.value");
        assert!(!format!("{token:?}").contains("secret"));
    }
}
