pub mod domain;
pub mod ports;
pub mod progress;
pub mod reminders;
pub mod validation;

pub use domain::{
    Assignment, AuthContext, BearerToken, Entity, EntityId, EntityKind, Event, Grade,
    Notification, NotificationKind, Ref, Semester, Subject, Teacher, TimetableEntry, User,
    UserRole, UserSettings,
};
pub use ports::{
    AuthService, Credentials, EntityService, NotificationInbox, PortError, PortResult,
    SettingsService, SignUp, TokenClaims, TokenDecoder,
};
pub use progress::{
    annotate_assignments_with_grades, compute_subject_progress, AssignmentWithGrade, BarScale,
    ProgressBar, SubjectProgress,
};
pub use validation::{Validate, ValidationError};
