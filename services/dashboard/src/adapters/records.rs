//! services/dashboard/src/adapters/records.rs
//!
//! "Impure" wire records exchanged with the academic backend, and their
//! mapping to and from the core domain types.
//!
//! The backend names keys the way its document store does (`_id`, `uid`,
//! `s_id`, ...), sometimes populates foreign keys, and may send numbers typed
//! into form fields as strings. All of that is absorbed here.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracker_core::domain::{
    Assignment, Event, Grade, Notification, NotificationKind, Ref, Semester, Subject, Teacher,
    TimetableEntry, User, UserRole, UserSettings,
};
use tracker_core::Entity;

use crate::adapters::backend::{Resource, ResourcePaths};

//=========================================================================================
// Shared Wire Helpers
//=========================================================================================

/// A foreign key as the backend sends it: a raw id (string or number) or the
/// populated document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireRef<R> {
    Id(String),
    Number(i64),
    Populated(R),
}

impl<R> WireRef<R> {
    fn into_ref<T, F>(self, to_domain: F) -> Ref<T>
    where
        F: FnOnce(R) -> T,
    {
        match self {
            WireRef::Id(id) => Ref::Id { id },
            WireRef::Number(n) => Ref::Id { id: n.to_string() },
            WireRef::Populated(record) => Ref::Populated {
                value: to_domain(record),
            },
        }
    }

    fn into_id<F>(self, id_of: F) -> String
    where
        F: FnOnce(&R) -> &str,
    {
        match self {
            WireRef::Id(id) => id,
            WireRef::Number(n) => n.to_string(),
            WireRef::Populated(record) => id_of(&record).to_string(),
        }
    }
}

fn wire_ref<T: Entity, R>(r: &Ref<T>) -> WireRef<R> {
    WireRef::Id(r.id().to_string())
}

fn owner_wire(owner: &Option<String>) -> Option<WireRef<UserRecord>> {
    owner.as_ref().map(|id| WireRef::Id(id.clone()))
}

fn owner_domain(owner: Option<WireRef<UserRecord>>) -> Option<String> {
    owner
        .map(|r| r.into_id(|u| &u.id))
        .filter(|id| !id.is_empty())
}

/// Accepts `"2024-05-01"` as well as full timestamps such as `"2024-05-01T00:00:00.000Z"`.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn format_day(day: &Option<NaiveDate>) -> Option<String> {
    day.map(|d| d.format("%Y-%m-%d").to_string())
}

/// Deserializes a number that may arrive as a JSON number, a numeric string, or null.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom("number out of range")),
        Value::String(s) if s.trim().is_empty() => Ok(0.0),
        Value::String(s) => s.trim().parse::<f64>().map_err(de::Error::custom),
        Value::Null => Ok(0.0),
        other => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}

//=========================================================================================
// Users
//=========================================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "firstName", alias = "first_name", default)]
    pub first_name: String,
    #[serde(rename = "lastName", alias = "last_name", default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

fn role_from_wire(role: Option<&str>) -> UserRole {
    match role.map(str::to_ascii_lowercase).as_deref() {
        Some("teacher") => UserRole::Teacher,
        Some("admin") => UserRole::Admin,
        _ => UserRole::Student,
    }
}

pub fn role_to_wire(role: UserRole) -> &'static str {
    match role {
        UserRole::Student => "student",
        UserRole::Teacher => "teacher",
        UserRole::Admin => "admin",
    }
}

impl UserRecord {
    pub fn to_domain(self) -> User {
        User {
            role: role_from_wire(self.role.as_deref()),
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
        }
    }
}

impl Resource for User {
    type Record = UserRecord;
    const PATHS: ResourcePaths = ResourcePaths {
        create: "/api/user",
        collection: "/api/users",
        by_user: false,
    };

    fn from_record(record: UserRecord) -> Self {
        record.to_domain()
    }

    fn to_record(&self) -> UserRecord {
        UserRecord {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            role: Some(role_to_wire(self.role).to_string()),
        }
    }
}

//=========================================================================================
// Teachers and Semesters
//=========================================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeacherRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(alias = "firstName", default)]
    pub first_name: String,
    #[serde(alias = "lastName", default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(alias = "email", default, skip_serializing_if = "Option::is_none")]
    pub school_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<WireRef<UserRecord>>,
}

impl TeacherRecord {
    pub fn to_domain(self) -> Teacher {
        Teacher {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            email: self.school_email,
            owner_ref: owner_domain(self.uid),
        }
    }
}

impl Resource for Teacher {
    type Record = TeacherRecord;
    const PATHS: ResourcePaths = ResourcePaths {
        create: "/api/teacher",
        collection: "/api/teachers",
        by_user: true,
    };

    fn from_record(record: TeacherRecord) -> Self {
        record.to_domain()
    }

    fn to_record(&self) -> TeacherRecord {
        TeacherRecord {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            school_email: self.email.clone(),
            uid: owner_wire(&self.owner_ref),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemesterRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "startDate", default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<WireRef<UserRecord>>,
}

impl SemesterRecord {
    pub fn to_domain(self) -> Semester {
        Semester {
            id: self.id,
            title: self.title,
            start_date: self.start_date.as_deref().and_then(parse_day),
            end_date: self.end_date.as_deref().and_then(parse_day),
            owner_ref: owner_domain(self.uid),
        }
    }
}

impl Resource for Semester {
    type Record = SemesterRecord;
    const PATHS: ResourcePaths = ResourcePaths {
        create: "/api/semester",
        collection: "/api/semesters",
        by_user: true,
    };

    fn from_record(record: SemesterRecord) -> Self {
        record.to_domain()
    }

    fn to_record(&self) -> SemesterRecord {
        SemesterRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            start_date: format_day(&self.start_date),
            end_date: format_day(&self.end_date),
            uid: owner_wire(&self.owner_ref),
        }
    }
}

//=========================================================================================
// Subjects, Assignments and Grades
//=========================================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "subjectTitle", alias = "title", default)]
    pub title: String,
    #[serde(rename = "targetGrade", default, deserialize_with = "lenient_f64")]
    pub target_grade: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t_uid: Option<WireRef<TeacherRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sem_id: Option<WireRef<SemesterRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<WireRef<UserRecord>>,
}

impl SubjectRecord {
    pub fn to_domain(self) -> Subject {
        Subject {
            id: self.id,
            title: self.title,
            target_grade_percent: self.target_grade,
            teacher_ref: self.t_uid.map(|r| r.into_ref(TeacherRecord::to_domain)),
            semester_ref: self.sem_id.map(|r| r.into_ref(SemesterRecord::to_domain)),
            room: self.room,
            owner_ref: owner_domain(self.uid),
        }
    }
}

impl Resource for Subject {
    type Record = SubjectRecord;
    const PATHS: ResourcePaths = ResourcePaths {
        create: "/api/subject",
        collection: "/api/subjects",
        by_user: true,
    };

    fn from_record(record: SubjectRecord) -> Self {
        record.to_domain()
    }

    fn to_record(&self) -> SubjectRecord {
        SubjectRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            target_grade: self.target_grade_percent,
            t_uid: self.teacher_ref.as_ref().map(wire_ref),
            sem_id: self.semester_ref.as_ref().map(wire_ref),
            room: self.room.clone(),
            uid: owner_wire(&self.owner_ref),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_id: Option<WireRef<SubjectRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<WireRef<UserRecord>>,
}

impl AssignmentRecord {
    pub fn to_domain(self) -> Assignment {
        Assignment {
            id: self.id,
            name: self.name,
            subject_ref: self.s_id.map(|r| r.into_ref(SubjectRecord::to_domain)),
            due_date: self.due_date.as_deref().and_then(parse_day),
            owner_ref: owner_domain(self.uid),
        }
    }
}

impl Resource for Assignment {
    type Record = AssignmentRecord;
    const PATHS: ResourcePaths = ResourcePaths {
        create: "/api/assignment",
        collection: "/api/assignments",
        by_user: true,
    };

    fn from_record(record: AssignmentRecord) -> Self {
        record.to_domain()
    }

    fn to_record(&self) -> AssignmentRecord {
        AssignmentRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            s_id: self.subject_ref.as_ref().map(wire_ref),
            due_date: format_day(&self.due_date),
            uid: owner_wire(&self.owner_ref),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradeRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(
        rename = "pointsAchieved",
        alias = "points_achieved",
        default,
        deserialize_with = "lenient_f64"
    )]
    pub points_achieved: f64,
    #[serde(
        rename = "pointsPossible",
        alias = "points_possible",
        default,
        deserialize_with = "lenient_f64"
    )]
    pub points_possible: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_id: Option<WireRef<SubjectRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a_id: Option<WireRef<AssignmentRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<WireRef<UserRecord>>,
}

impl GradeRecord {
    pub fn to_domain(self) -> Grade {
        Grade {
            id: self.id,
            points_achieved: self.points_achieved,
            points_possible: self.points_possible,
            subject_ref: self.s_id.map(|r| r.into_ref(SubjectRecord::to_domain)),
            assignment_ref: self.a_id.map(|r| r.into_ref(AssignmentRecord::to_domain)),
            owner_ref: owner_domain(self.uid),
        }
    }
}

impl Resource for Grade {
    type Record = GradeRecord;
    const PATHS: ResourcePaths = ResourcePaths {
        create: "/api/grade",
        collection: "/api/grades",
        by_user: true,
    };

    fn from_record(record: GradeRecord) -> Self {
        record.to_domain()
    }

    fn to_record(&self) -> GradeRecord {
        GradeRecord {
            id: self.id.clone(),
            points_achieved: self.points_achieved,
            points_possible: self.points_possible,
            s_id: self.subject_ref.as_ref().map(wire_ref),
            a_id: self.assignment_ref.as_ref().map(wire_ref),
            uid: owner_wire(&self.owner_ref),
        }
    }
}

//=========================================================================================
// Agenda Events and Timetable
//=========================================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<WireRef<UserRecord>>,
}

impl EventRecord {
    pub fn to_domain(self) -> Event {
        Event {
            id: self.id,
            title: self.title,
            description: self.description.filter(|d| !d.is_empty()),
            date: self.date.as_deref().and_then(parse_day),
            owner_ref: owner_domain(self.uid),
        }
    }
}

// The events API has no per-user listing; ownership is filtered locally.
impl Resource for Event {
    type Record = EventRecord;
    const PATHS: ResourcePaths = ResourcePaths {
        create: "/api/events",
        collection: "/api/events",
        by_user: false,
    };

    fn from_record(record: EventRecord) -> Self {
        record.to_domain()
    }

    fn to_record(&self) -> EventRecord {
        EventRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            date: format_day(&self.date),
            uid: owner_wire(&self.owner_ref),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "s_id", default, skip_serializing_if = "Option::is_none")]
    pub s_id: Option<WireRef<SubjectRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<WireRef<UserRecord>>,
}

/// Accepts `"09:30"` and `"09:30:00"`.
fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

impl TimetableRecord {
    pub fn to_domain(self) -> TimetableEntry {
        TimetableEntry {
            id: self.id,
            subject_ref: self.s_id.map(|r| r.into_ref(SubjectRecord::to_domain)),
            day: self.day.and_then(|d| d.trim().parse::<Weekday>().ok()),
            start_time: self.start_time.as_deref().and_then(parse_clock),
            end_time: self.end_time.as_deref().and_then(parse_clock),
            room: self.room.filter(|r| !r.is_empty()),
            owner_ref: owner_domain(self.uid),
        }
    }
}

impl Resource for TimetableEntry {
    type Record = TimetableRecord;
    const PATHS: ResourcePaths = ResourcePaths {
        create: "/api/timetable",
        collection: "/api/timetable",
        by_user: true,
    };

    fn from_record(record: TimetableRecord) -> Self {
        record.to_domain()
    }

    fn to_record(&self) -> TimetableRecord {
        let clock = |t: &Option<NaiveTime>| t.map(|t| t.format("%H:%M").to_string());
        TimetableRecord {
            id: self.id.clone(),
            s_id: self.subject_ref.as_ref().map(wire_ref),
            day: self.day.map(|d| d.to_string()),
            start_time: clock(&self.start_time),
            end_time: clock(&self.end_time),
            room: self.room.clone(),
            uid: owner_wire(&self.owner_ref),
        }
    }
}

//=========================================================================================
// Notifications and Settings
//=========================================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<WireRef<UserRecord>>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(alias = "isRead", default)]
    pub read: bool,
    #[serde(rename = "createdAt", default, skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
}

fn kind_from_wire(kind: Option<&str>) -> NotificationKind {
    match kind.map(str::to_ascii_lowercase).as_deref() {
        Some("reminder") => NotificationKind::Reminder,
        Some("alert") => NotificationKind::Alert,
        Some("success") => NotificationKind::Success,
        _ => NotificationKind::Info,
    }
}

fn kind_to_wire(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Info => "info",
        NotificationKind::Reminder => "reminder",
        NotificationKind::Alert => "alert",
        NotificationKind::Success => "success",
    }
}

impl NotificationRecord {
    pub fn to_domain(self) -> Notification {
        Notification {
            kind: kind_from_wire(self.kind.as_deref()),
            id: self.id,
            owner_ref: owner_domain(self.uid),
            title: self.title,
            message: self.message,
            read: self.read,
            created_at: self.created_at,
        }
    }
}

impl Resource for Notification {
    type Record = NotificationRecord;
    const PATHS: ResourcePaths = ResourcePaths {
        create: "/api/notification",
        collection: "/api/notifications",
        by_user: true,
    };

    fn from_record(record: NotificationRecord) -> Self {
        record.to_domain()
    }

    fn to_record(&self) -> NotificationRecord {
        NotificationRecord {
            id: self.id.clone(),
            uid: owner_wire(&self.owner_ref),
            title: self.title.clone(),
            message: self.message.clone(),
            kind: Some(kind_to_wire(self.kind).to_string()),
            read: self.read,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    pub uid: String,
    #[serde(default)]
    pub email_notifications: Option<bool>,
    #[serde(default)]
    pub sms_notifications: Option<bool>,
    #[serde(default)]
    pub push_notifications: Option<bool>,
    #[serde(default)]
    pub private_profile: Option<bool>,
    #[serde(default)]
    pub location_access: Option<bool>,
    #[serde(alias = "twoFactorAuth", default)]
    pub two_factor: Option<bool>,
}

impl SettingsRecord {
    /// Fields the backend omitted keep their defaults.
    pub fn to_domain(self) -> UserSettings {
        let defaults = UserSettings::defaults_for(self.uid.clone());
        UserSettings {
            owner_ref: self.uid,
            email_notifications: self
                .email_notifications
                .unwrap_or(defaults.email_notifications),
            sms_notifications: self.sms_notifications.unwrap_or(defaults.sms_notifications),
            push_notifications: self
                .push_notifications
                .unwrap_or(defaults.push_notifications),
            private_profile: self.private_profile.unwrap_or(defaults.private_profile),
            location_access: self.location_access.unwrap_or(defaults.location_access),
            two_factor: self.two_factor.unwrap_or(defaults.two_factor),
        }
    }

    pub fn from_domain(settings: &UserSettings) -> Self {
        Self {
            uid: settings.owner_ref.clone(),
            email_notifications: Some(settings.email_notifications),
            sms_notifications: Some(settings.sms_notifications),
            push_notifications: Some(settings.push_notifications),
            private_profile: Some(settings.private_profile),
            location_access: Some(settings.location_access),
            two_factor: Some(settings.two_factor),
        }
    }
}

//=========================================================================================
// Auth Payloads
//=========================================================================================

#[derive(Debug, Serialize)]
pub struct SignInRecord<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenRecord {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRecord<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub role: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subject_with_populated_teacher_and_string_target() {
        let record: SubjectRecord = serde_json::from_value(json!({
            "_id": "s1",
            "subjectTitle": "Physics",
            "targetGrade": "85",
            "t_uid": { "_id": "t1", "firstName": "Marie", "lastName": "Curie", "email": "mc@school" },
            "uid": "u1"
        }))
        .unwrap();
        let subject = record.to_domain();
        assert_eq!(subject.target_grade_percent, 85.0);
        assert_eq!(subject.owner_ref.as_deref(), Some("u1"));
        let teacher = subject.teacher_ref.as_ref().unwrap();
        assert_eq!(teacher.id(), "t1");
        assert_eq!(
            teacher.populated().map(Teacher::display_name).as_deref(),
            Some("Marie Curie")
        );
    }

    #[test]
    fn numeric_subject_ids_and_timestamps() {
        let record: AssignmentRecord = serde_json::from_value(json!({
            "_id": "a1",
            "name": "Essay",
            "s_id": 1,
            "due_date": "2024-05-01T00:00:00.000Z",
            "uid": "u1"
        }))
        .unwrap();
        let assignment = record.to_domain();
        assert_eq!(assignment.subject_ref.as_ref().map(|r| r.id()), Some("1"));
        assert_eq!(assignment.due_date, NaiveDate::from_ymd_opt(2024, 5, 1));
    }

    #[test]
    fn outgoing_records_carry_plain_ids() {
        let grade = Grade {
            id: String::new(),
            points_achieved: 8.0,
            points_possible: 10.0,
            subject_ref: Some(Ref::to("s1")),
            assignment_ref: Some(Ref::to("a1")),
            owner_ref: Some("u1".to_string()),
        };
        let wire = serde_json::to_value(grade.to_record()).unwrap();
        assert_eq!(
            wire,
            json!({
                "pointsAchieved": 8.0,
                "pointsPossible": 10.0,
                "s_id": "s1",
                "a_id": "a1",
                "uid": "u1"
            })
        );
    }

    #[test]
    fn grade_without_links_is_kept_with_missing_refs() {
        let record: GradeRecord =
            serde_json::from_value(json!({ "_id": "g1", "points_achieved": 3, "points_possible": 4 }))
                .unwrap();
        let grade = record.to_domain();
        assert_eq!((grade.points_achieved, grade.points_possible), (3.0, 4.0));
        assert!(grade.subject_ref.is_none());
        assert!(grade.assignment_ref.is_none());
    }

    #[test]
    fn settings_fill_missing_switches_with_defaults() {
        let record: SettingsRecord =
            serde_json::from_value(json!({ "uid": "u1", "smsNotifications": true })).unwrap();
        let settings = record.to_domain();
        assert!(settings.sms_notifications);
        assert!(settings.email_notifications);
        assert!(!settings.private_profile);
    }

    #[test]
    fn timetable_slots_accept_long_day_names_and_short_times() {
        let record: TimetableRecord = serde_json::from_value(json!({
            "_id": "tt1",
            "s_id": { "_id": "s1", "subjectTitle": "Physics" },
            "day": "wednesday",
            "startTime": "09:30",
            "endTime": "10:15:00",
            "uid": "u1"
        }))
        .unwrap();
        let entry = record.to_domain();
        assert_eq!(entry.day, Some(Weekday::Wed));
        assert_eq!(entry.start_time, NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(entry.end_time, NaiveTime::from_hms_opt(10, 15, 0));
        assert_eq!(entry.subject_ref.as_ref().map(|r| r.id()), Some("s1"));

        let wire = serde_json::to_value(entry.to_record()).unwrap();
        assert_eq!(wire["s_id"], "s1");
        assert_eq!(wire["day"], "Wed");
        assert_eq!(wire["endTime"], "10:15");
    }
}
