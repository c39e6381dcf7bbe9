//! services/dashboard/src/web/refresh.rs
//!
//! Fetch-and-aggregate cycles for the progress views.
//!
//! A cycle fetches subjects, assignments and grades for the signed-in user
//! concurrently, fails as a whole if any fetch fails, and only then runs the
//! aggregator. Each sign-in session owns one refresh slot: starting a cycle
//! cancels the one in flight, and a cycle only commits its snapshot while it is
//! still the most recently started one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracker_core::domain::{Assignment, AuthContext, Grade, Subject};
use tracker_core::ports::{EntityService, PortError};
use tracker_core::progress::{
    annotate_assignments_with_grades, compute_subject_progress, AssignmentWithGrade, BarScale,
    ProgressBar, SubjectProgress,
};

//=========================================================================================
// Snapshots and Outcomes
//=========================================================================================

/// One subject's totals together with its rendered bar.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProgressView {
    #[serde(flatten)]
    pub progress: SubjectProgress,
    pub bar: ProgressBar,
    pub percentage: Option<f64>,
    pub meets_target: Option<bool>,
}

impl SubjectProgressView {
    fn new(progress: SubjectProgress, scale: BarScale) -> Self {
        Self {
            bar: progress.bar(scale),
            percentage: progress.percentage(),
            meets_target: progress.meets_target(),
            progress,
        }
    }
}

/// The result of one complete, consistent fetch-and-aggregate cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub generation: u64,
    pub fetched_at: DateTime<Utc>,
    pub subjects: Vec<SubjectProgressView>,
    pub assignments: Vec<AssignmentWithGrade>,
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// This cycle committed a new snapshot.
    Fresh(Arc<ProgressSnapshot>),
    /// A newer cycle was started; this one's data was discarded.
    Superseded(Option<Arc<ProgressSnapshot>>),
    /// A fetch failed; the last committed snapshot is left untouched.
    Unavailable {
        error: PortError,
        last_good: Option<Arc<ProgressSnapshot>>,
    },
}

//=========================================================================================
// Refresh Slots
//=========================================================================================

#[derive(Default)]
struct RefreshSlot {
    started: AtomicU64,
    in_flight: Mutex<CancellationToken>,
    last_good: RwLock<Option<Arc<ProgressSnapshot>>>,
}

impl RefreshSlot {
    /// Starts a new generation, cancelling the previous in-flight cycle.
    fn begin(&self) -> (u64, CancellationToken) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.cancel();
        *in_flight = CancellationToken::new();
        let generation = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        (generation, in_flight.clone())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.started.load(Ordering::SeqCst) == generation
    }

    fn cancel(&self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    async fn last_good(&self) -> Option<Arc<ProgressSnapshot>> {
        self.last_good.read().await.clone()
    }
}

struct Cycle {
    slot: Arc<RefreshSlot>,
    generation: u64,
    cancelled: CancellationToken,
}

//=========================================================================================
// The Loader
//=========================================================================================

pub struct ProgressLoader {
    subjects: Arc<dyn EntityService<Subject>>,
    assignments: Arc<dyn EntityService<Assignment>>,
    grades: Arc<dyn EntityService<Grade>>,
    scale: BarScale,
    slots: Mutex<HashMap<String, Arc<RefreshSlot>>>,
}

impl ProgressLoader {
    pub fn new(
        subjects: Arc<dyn EntityService<Subject>>,
        assignments: Arc<dyn EntityService<Assignment>>,
        grades: Arc<dyn EntityService<Grade>>,
        scale: BarScale,
    ) -> Self {
        Self {
            subjects,
            assignments,
            grades,
            scale,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, session_key: &str) -> Arc<RefreshSlot> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session_key.to_string())
            .or_default()
            .clone()
    }

    /// The last committed snapshot for a session, without fetching.
    ///
    /// Looking up a session that never refreshed does not create a slot for it.
    pub async fn snapshot(&self, session_key: &str) -> Option<Arc<ProgressSnapshot>> {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_key)
            .cloned()?;
        slot.last_good().await
    }

    /// Claims the next generation for the session, cancelling the cycle in flight.
    fn start(&self, session_key: &str) -> Cycle {
        let slot = self.slot(session_key);
        let (generation, cancelled) = slot.begin();
        Cycle {
            slot,
            generation,
            cancelled,
        }
    }

    /// Runs a full fetch-and-aggregate cycle for the session.
    pub async fn refresh(&self, session_key: &str, ctx: &AuthContext) -> RefreshOutcome {
        let cycle = self.start(session_key);
        self.run(cycle, ctx).await
    }

    /// Starts a refresh in the background, e.g. after a mutation.
    ///
    /// The generation is claimed before returning, so any refresh requested
    /// afterwards supersedes this one.
    pub fn schedule(self: &Arc<Self>, session_key: String, ctx: AuthContext) {
        let cycle = self.start(&session_key);
        let loader = Arc::clone(self);
        tokio::spawn(async move {
            loader.run(cycle, &ctx).await;
        });
    }

    async fn run(&self, cycle: Cycle, ctx: &AuthContext) -> RefreshOutcome {
        let Cycle {
            slot,
            generation,
            cancelled,
        } = cycle;
        let user_id = ctx.user_id.as_str();

        let fetch = async {
            tokio::try_join!(
                self.subjects.list_by_user(ctx, user_id),
                self.assignments.list_by_user(ctx, user_id),
                self.grades.list_by_user(ctx, user_id),
            )
        };

        let result = tokio::select! {
            _ = cancelled.cancelled() => None,
            result = fetch => Some(result),
        };

        let Some(result) = result else {
            debug!("Progress cycle {} for user {} was superseded", generation, user_id);
            return RefreshOutcome::Superseded(slot.last_good().await);
        };

        match result {
            Err(error) => {
                let last_good = slot.last_good().await;
                if !slot.is_current(generation) {
                    return RefreshOutcome::Superseded(last_good);
                }
                warn!(
                    "Progress cycle {} for user {} failed: {}",
                    generation, user_id, error
                );
                RefreshOutcome::Unavailable { error, last_good }
            }
            Ok((subjects, assignments, grades)) => {
                let snapshot = Arc::new(self.aggregate(generation, &subjects, &assignments, &grades));
                let mut last_good = slot.last_good.write().await;
                if !slot.is_current(generation) {
                    debug!("Discarding stale progress cycle {} for user {}", generation, user_id);
                    return RefreshOutcome::Superseded(last_good.clone());
                }
                *last_good = Some(snapshot.clone());
                info!(
                    "Progress cycle {} for user {} committed ({} subjects, {} assignments)",
                    generation,
                    user_id,
                    snapshot.subjects.len(),
                    snapshot.assignments.len()
                );
                RefreshOutcome::Fresh(snapshot)
            }
        }
    }

    /// Tears down a session's slot, cancelling any cycle in flight.
    pub fn forget(&self, session_key: &str) {
        let removed = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_key);
        if let Some(slot) = removed {
            slot.cancel();
        }
    }

    /// Drops every slot whose session `keep` rejects, cancelling its cycle.
    /// Returns how many slots were dropped.
    pub fn retain<F>(&self, keep: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|key, slot| {
            let kept = keep(key);
            if !kept {
                slot.cancel();
            }
            kept
        });
        before - slots.len()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn aggregate(
        &self,
        generation: u64,
        subjects: &[Subject],
        assignments: &[Assignment],
        grades: &[Grade],
    ) -> ProgressSnapshot {
        ProgressSnapshot {
            generation,
            fetched_at: Utc::now(),
            subjects: compute_subject_progress(subjects, assignments, grades)
                .into_iter()
                .map(|p| SubjectProgressView::new(p, self.scale))
                .collect(),
            assignments: annotate_assignments_with_grades(assignments, grades),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio::sync::Notify;
    use tracker_core::domain::{BearerToken, Entity, Ref};
    use tracker_core::ports::PortResult;

    struct FakeCollection<T> {
        items: Mutex<Vec<T>>,
        fail: AtomicBool,
        hold_first_call: bool,
        entered: Notify,
        release: Notify,
        calls: AtomicUsize,
    }

    impl<T> FakeCollection<T> {
        fn new(items: Vec<T>) -> Arc<Self> {
            Arc::new(Self {
                items: Mutex::new(items),
                fail: AtomicBool::new(false),
                hold_first_call: false,
                entered: Notify::new(),
                release: Notify::new(),
                calls: AtomicUsize::new(0),
            })
        }

        fn holding_first_call(items: Vec<T>) -> Arc<Self> {
            Arc::new(Self {
                items: Mutex::new(items),
                fail: AtomicBool::new(false),
                hold_first_call: true,
                entered: Notify::new(),
                release: Notify::new(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl<T: Entity> EntityService<T> for FakeCollection<T> {
        async fn create(&self, _ctx: &AuthContext, _entity: &T) -> PortResult<T> {
            Err(PortError::Unexpected("unused".to_string()))
        }

        async fn get_by_id(&self, _ctx: &AuthContext, id: &str) -> PortResult<T> {
            Err(PortError::NotFound(id.to_string()))
        }

        async fn update(&self, _ctx: &AuthContext, _id: &str, _entity: &T) -> PortResult<T> {
            Err(PortError::Unexpected("unused".to_string()))
        }

        async fn delete(&self, _ctx: &AuthContext, _id: &str) -> PortResult<()> {
            Err(PortError::Unexpected("unused".to_string()))
        }

        async fn list_all(&self, _ctx: &AuthContext) -> PortResult<Vec<T>> {
            Ok(self.items.lock().unwrap().clone())
        }

        async fn list_by_user(&self, _ctx: &AuthContext, user_id: &str) -> PortResult<Vec<T>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 && self.hold_first_call {
                self.entered.notify_one();
                self.release.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(PortError::Unexpected("backend down".to_string()));
            }
            let items = self.items.lock().unwrap();
            Ok(items
                .iter()
                .filter(|item| item.owner_id() == Some(user_id))
                .cloned()
                .collect())
        }
    }

    fn ctx() -> AuthContext {
        AuthContext {
            user_id: "u1".to_string(),
            display_name: None,
            token: BearerToken::new("token"),
        }
    }

    fn subject(id: &str) -> Subject {
        Subject {
            id: id.to_string(),
            title: id.to_uppercase(),
            target_grade_percent: 70.0,
            teacher_ref: None,
            semester_ref: None,
            room: None,
            owner_ref: Some("u1".to_string()),
        }
    }

    fn assignment(id: &str, subject_id: &str) -> Assignment {
        Assignment {
            id: id.to_string(),
            name: id.to_string(),
            subject_ref: Some(Ref::to(subject_id)),
            due_date: None,
            owner_ref: Some("u1".to_string()),
        }
    }

    fn grade(id: &str, subject_id: &str, assignment_id: &str, achieved: f64, possible: f64) -> Grade {
        Grade {
            id: id.to_string(),
            points_achieved: achieved,
            points_possible: possible,
            subject_ref: Some(Ref::to(subject_id)),
            assignment_ref: Some(Ref::to(assignment_id)),
            owner_ref: Some("u1".to_string()),
        }
    }

    #[tokio::test]
    async fn fresh_cycle_aggregates_joined_collections() {
        let loader = ProgressLoader::new(
            FakeCollection::new(vec![subject("s1")]),
            FakeCollection::new(vec![assignment("a1", "s1")]),
            FakeCollection::new(vec![grade("g1", "s1", "a1", 80.0, 100.0)]),
            BarScale::Normalized,
        );

        let RefreshOutcome::Fresh(snapshot) = loader.refresh("session", &ctx()).await else {
            panic!("expected a fresh snapshot");
        };
        assert_eq!(snapshot.generation, 1);
        let view = &snapshot.subjects[0];
        assert_eq!(view.progress.total_assignments, 1);
        assert_eq!(view.progress.total_achieved, 80.0);
        assert_eq!(view.progress.total_lost, 20.0);
        assert_eq!(view.progress.total_possible, 100.0);
        assert_eq!(view.bar.achieved, 80.0);
        assert_eq!(view.meets_target, Some(true));
        assert_eq!(
            snapshot.assignments[0].grade.as_ref().map(|g| g.id.as_str()),
            Some("g1")
        );
    }

    #[tokio::test]
    async fn failed_fetch_keeps_last_good_snapshot() {
        let grades = FakeCollection::new(vec![grade("g1", "s1", "a1", 5.0, 10.0)]);
        let loader = ProgressLoader::new(
            FakeCollection::new(vec![subject("s1")]),
            FakeCollection::new(vec![assignment("a1", "s1")]),
            grades.clone(),
            BarScale::Normalized,
        );

        assert!(matches!(
            loader.refresh("session", &ctx()).await,
            RefreshOutcome::Fresh(_)
        ));

        grades.fail.store(true, Ordering::SeqCst);
        match loader.refresh("session", &ctx()).await {
            RefreshOutcome::Unavailable { error, last_good } => {
                assert_eq!(error, PortError::Unexpected("backend down".to_string()));
                assert_eq!(last_good.map(|s| s.generation), Some(1));
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
        assert_eq!(
            loader.snapshot("session").await.map(|s| s.generation),
            Some(1)
        );
    }

    #[tokio::test]
    async fn stale_cycle_is_discarded_in_favour_of_newer_one() {
        let subjects = FakeCollection::holding_first_call(vec![subject("s1")]);
        let loader = Arc::new(ProgressLoader::new(
            subjects.clone(),
            FakeCollection::<Assignment>::new(vec![]),
            FakeCollection::<Grade>::new(vec![]),
            BarScale::Normalized,
        ));

        let stale = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.refresh("session", &ctx()).await })
        };
        subjects.entered.notified().await;

        subjects.items.lock().unwrap().push(subject("s2"));
        let RefreshOutcome::Fresh(fresh) = loader.refresh("session", &ctx()).await else {
            panic!("expected the newer cycle to commit");
        };
        assert_eq!(fresh.generation, 2);
        assert_eq!(fresh.subjects.len(), 2);

        subjects.release.notify_one();
        let outcome = stale.await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Superseded(_)));
        assert_eq!(
            loader.snapshot("session").await.map(|s| s.generation),
            Some(2)
        );
    }

    #[tokio::test]
    async fn sessions_do_not_share_slots() {
        let loader = ProgressLoader::new(
            FakeCollection::new(vec![subject("s1")]),
            FakeCollection::<Assignment>::new(vec![]),
            FakeCollection::<Grade>::new(vec![]),
            BarScale::Normalized,
        );
        loader.refresh("a", &ctx()).await;
        assert!(loader.snapshot("a").await.is_some());
        assert!(loader.snapshot("b").await.is_none());

        loader.forget("a");
        assert!(loader.snapshot("a").await.is_none());
    }

    #[tokio::test]
    async fn lookups_and_teardown_leave_no_slots_behind() {
        let loader = ProgressLoader::new(
            FakeCollection::new(vec![subject("s1")]),
            FakeCollection::<Assignment>::new(vec![]),
            FakeCollection::<Grade>::new(vec![]),
            BarScale::Normalized,
        );
        for n in 0..100 {
            assert!(loader.snapshot(&format!("unknown-{n}")).await.is_none());
        }
        assert_eq!(loader.tracked(), 0);

        loader.refresh("a", &ctx()).await;
        loader.refresh("b", &ctx()).await;
        assert_eq!(loader.tracked(), 2);

        assert_eq!(loader.retain(|key| key == "b"), 1);
        assert_eq!(loader.tracked(), 1);
        assert!(loader.snapshot("a").await.is_none());
        assert!(loader.snapshot("b").await.is_some());

        loader.forget("b");
        assert_eq!(loader.tracked(), 0);
    }
}
