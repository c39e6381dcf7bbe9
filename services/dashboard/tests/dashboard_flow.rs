//! End-to-end flows through the dashboard router against an in-process fake
//! of the academic backend.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use dashboard_lib::{
    adapters::{HttpBackend, JwtTokenDecoder},
    config::Config,
    web::{build_router, refresh::ProgressLoader, state::SessionStore, AppState},
};
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracker_core::domain::{AuthContext, BearerToken};

//=========================================================================================
// Fake Academic Backend
//=========================================================================================

struct FakeBackend {
    grades: Mutex<Vec<Value>>,
    grade_posts: AtomicUsize,
    deletes: AtomicUsize,
    grades_down: AtomicBool,
    grades_unauthorized: AtomicBool,
    hold_next_grades: AtomicBool,
    grades_entered: Notify,
    grades_release: Notify,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            grades: Mutex::new(vec![
                json!({ "_id": "g1", "pointsAchieved": 40, "pointsPossible": 50, "s_id": "s1", "a_id": "a1", "uid": "u1" }),
                json!({ "_id": "g2", "pointsAchieved": "30", "pointsPossible": 50, "s_id": "s1", "a_id": "a2", "uid": "u1" }),
            ]),
            grade_posts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            grades_down: AtomicBool::new(false),
            grades_unauthorized: AtomicBool::new(false),
            hold_next_grades: AtomicBool::new(false),
            grades_entered: Notify::new(),
            grades_release: Notify::new(),
        }
    }
}

fn token_for(user_id: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let exp = (Utc::now() + Duration::hours(1)).timestamp();
    let body = URL_SAFE_NO_PAD.encode(json!({ "userId": user_id, "name": "Sam", "exp": exp }).to_string());
    format!("{header}.{body}.sig")
}

async fn signin(Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if body["password"] == "secret" {
        Ok(Json(json!({ "token": token_for("u1") })))
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

async fn subjects(Path(_user): Path<String>) -> Json<Value> {
    Json(json!([
        { "_id": "s1", "subjectTitle": "Math", "targetGrade": 70, "uid": "u1" },
        { "_id": "s2", "subjectTitle": "Art", "targetGrade": "90", "uid": "u1" }
    ]))
}

async fn assignments(Path(_user): Path<String>) -> Json<Value> {
    Json(json!([
        { "_id": "a1", "name": "Quiz", "s_id": "s1", "due_date": "2026-10-20", "uid": "u1" },
        { "_id": "a2", "name": "Essay", "s_id": { "_id": "s1", "subjectTitle": "Math" }, "uid": "u1" }
    ]))
}

async fn grades(
    State(fake): State<Arc<FakeBackend>>,
    Path(_user): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if fake.hold_next_grades.swap(false, Ordering::SeqCst) {
        fake.grades_entered.notify_one();
        fake.grades_release.notified().await;
    }
    if fake.grades_unauthorized.load(Ordering::SeqCst) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if fake.grades_down.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let grades = fake.grades.lock().unwrap().clone();
    Ok(Json(Value::Array(grades)))
}

async fn create_grade(
    State(fake): State<Arc<FakeBackend>>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.grade_posts.fetch_add(1, Ordering::SeqCst);
    body["_id"] = json!("g-new");
    fake.grades.lock().unwrap().push(body.clone());
    (StatusCode::CREATED, Json(body))
}

async fn delete_record(
    State(fake): State<Arc<FakeBackend>>,
    Path(_id): Path<String>,
) -> StatusCode {
    fake.deletes.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn events() -> Json<Value> {
    Json(json!([
        { "_id": "e1", "title": "Open day", "date": "2026-11-02", "uid": "u1" },
        { "_id": "e2", "title": "Someone else's", "date": "2026-11-03", "uid": "u2" }
    ]))
}

async fn timetable(Path(_user): Path<String>) -> Json<Value> {
    Json(json!([
        { "_id": "tt1", "s_id": "s1", "day": "Monday", "startTime": "09:00", "endTime": "10:30", "room": "B12", "uid": "u1" }
    ]))
}

fn fake_backend(fake: Arc<FakeBackend>) -> Router {
    Router::new()
        .route("/api/auth/signin", post(signin))
        .route("/api/auth/signout", get(|| async { StatusCode::OK }))
        .route("/api/subjects/user/{id}", get(subjects))
        .route("/api/assignments/user/{id}", get(assignments))
        .route("/api/grades/user/{id}", get(grades))
        .route("/api/grades/{id}", delete(delete_record))
        .route("/api/users/{id}", delete(delete_record))
        .route("/api/grade", post(create_grade))
        .route("/api/events", get(events))
        .route("/api/timetable/user/{id}", get(timetable))
        .with_state(fake)
}

//=========================================================================================
// Harness
//=========================================================================================

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

struct Harness {
    fake: Arc<FakeBackend>,
    state: Arc<AppState>,
    base: String,
    client: reqwest::Client,
}

impl Harness {
    async fn start() -> Self {
        let fake = Arc::new(FakeBackend::default());
        let backend_url = serve(fake_backend(fake.clone())).await;

        let config = Arc::new(
            Config::from_lookup(|name| match name {
                "BACKEND_URL" => Some(backend_url.clone()),
                "STATIC_DIR" => Some("./does-not-exist".to_string()),
                _ => None,
            })
            .unwrap(),
        );
        let backend = Arc::new(HttpBackend::new(config.backend_url.clone(), config.request_timeout).unwrap());
        let progress = Arc::new(ProgressLoader::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            config.bar_scale,
        ));
        let state = Arc::new(AppState {
            config,
            users: backend.clone(),
            subjects: backend.clone(),
            assignments: backend.clone(),
            grades: backend.clone(),
            semesters: backend.clone(),
            teachers: backend.clone(),
            events: backend.clone(),
            timetable: backend.clone(),
            notifications: backend.clone(),
            inbox: backend.clone(),
            settings: backend.clone(),
            auth: backend,
            tokens: Arc::new(JwtTokenDecoder),
            sessions: SessionStore::new(),
            progress,
        });

        let base = serve(build_router(state.clone())).await;
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        Self {
            fake,
            state,
            base,
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Signs in and returns the `session=<id>` cookie pair.
    async fn sign_in(&self) -> String {
        let response = self
            .client
            .post(self.url("/auth/signin"))
            .json(&json!({ "email": "sam@example.com", "password": "secret" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.contains("HttpOnly"));
        set_cookie.split(';').next().unwrap().to_string()
    }

    /// GETs a path with the cookie. An empty body comes back as `Value::Null`.
    async fn get_json(&self, path: &str, cookie: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(self.url(path))
            .header(COOKIE, cookie)
            .send()
            .await
            .unwrap();
        let status = response.status();
        let text = response.text().await.unwrap();
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap()
        };
        (status, body)
    }

    async fn progress(&self, cookie: &str) -> (StatusCode, Value) {
        self.get_json("/api/progress", cookie).await
    }

    /// Polls the committed snapshot until `done` accepts it.
    async fn cached_until<F>(&self, cookie: &str, done: F) -> Value
    where
        F: Fn(&Value) -> bool,
    {
        for _ in 0..100 {
            let (status, body) = self.get_json("/api/progress?cached=true", cookie).await;
            if status == StatusCode::OK && done(&body["snapshot"]) {
                return body["snapshot"].clone();
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("the committed snapshot never reached the expected state");
    }
}

fn session_id(cookie: &str) -> &str {
    cookie.trim_start_matches("session=")
}

//=========================================================================================
// Flows
//=========================================================================================

#[tokio::test]
async fn signed_in_user_sees_subject_totals_and_graded_assignments() {
    let h = Harness::start().await;
    let cookie = h.sign_in().await;

    let (status, body) = h.progress(&cookie).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "fresh");

    let subjects = body["snapshot"]["subjects"].as_array().unwrap();
    assert_eq!(subjects.len(), 2);

    let math = &subjects[0];
    assert_eq!(math["subject"]["id"], "s1");
    assert_eq!(math["totalAssignments"], 2);
    assert_eq!(math["totalAchieved"], 70.0);
    assert_eq!(math["totalLost"], 30.0);
    assert_eq!(math["totalPossible"], 100.0);
    assert_eq!(math["percentage"], 70.0);
    assert_eq!(math["meetsTarget"], true);
    assert_eq!(math["bar"]["achieved"], 70.0);

    let art = &subjects[1];
    assert_eq!(art["totalAssignments"], 0);
    assert_eq!(art["totalPossible"], 0.0);
    assert_eq!(art["percentage"], Value::Null);
    assert_eq!(art["bar"]["outstanding"], 100.0);

    let assignments = body["snapshot"]["assignments"].as_array().unwrap();
    assert_eq!(assignments[0]["grade"]["id"], "g1");
    assert_eq!(assignments[1]["grade"]["id"], "g2");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let h = Harness::start().await;
    let response = h
        .client
        .post(h.url("/auth/signin"))
        .json(&json!({ "email": "sam@example.com", "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn requests_without_a_session_are_turned_away() {
    let h = Harness::start().await;

    let api = h.client.get(h.url("/api/progress")).send().await.unwrap();
    assert_eq!(api.status(), StatusCode::UNAUTHORIZED);

    let forged = h
        .client
        .get(h.url("/api/grades"))
        .header(COOKIE, "session=forged")
        .send()
        .await
        .unwrap();
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let page = h.client.get(h.url("/dashboard")).send().await.unwrap();
    assert!(page.status().is_redirection());
    assert_eq!(page.headers()[LOCATION], "/");
}

#[tokio::test]
async fn signing_out_ends_the_session() {
    let h = Harness::start().await;
    let cookie = h.sign_in().await;

    let response = h
        .client
        .post(h.url("/auth/signout"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = h.progress(&cookie).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, Value::Null);
    assert!(h.state.progress.snapshot(session_id(&cookie)).await.is_none());
}

#[tokio::test]
async fn grade_above_possible_never_reaches_the_backend() {
    let h = Harness::start().await;
    let cookie = h.sign_in().await;

    let rejected = h
        .client
        .post(h.url("/api/grades"))
        .header(COOKIE, &cookie)
        .json(&json!({
            "pointsAchieved": 110,
            "pointsPossible": 100,
            "subjectRef": { "kind": "id", "id": "s1" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(h.fake.grade_posts.load(Ordering::SeqCst), 0);

    let accepted = h
        .client
        .post(h.url("/api/grades"))
        .header(COOKIE, &cookie)
        .json(&json!({
            "pointsAchieved": 45,
            "pointsPossible": 50,
            "subjectRef": { "kind": "id", "id": "s1" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::CREATED);
    assert_eq!(h.fake.grade_posts.load(Ordering::SeqCst), 1);

    let created: Value = accepted.json().await.unwrap();
    assert_eq!(created["id"], "g-new");
    assert_eq!(created["ownerRef"], "u1");
}

#[tokio::test]
async fn recording_a_grade_refreshes_the_progress_views() {
    let h = Harness::start().await;
    let cookie = h.sign_in().await;
    let warm = h
        .cached_until(&cookie, |s| s["subjects"][0]["totalAchieved"] == 70.0)
        .await;
    let warm_generation = warm["generation"].as_u64().unwrap();

    let response = h
        .client
        .post(h.url("/api/grades"))
        .header(COOKIE, &cookie)
        .json(&json!({
            "pointsAchieved": 45,
            "pointsPossible": 50,
            "subjectRef": { "kind": "id", "id": "s1" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let refreshed = h
        .cached_until(&cookie, |s| s["subjects"][0]["totalAchieved"] == 115.0)
        .await;
    assert!(refreshed["generation"].as_u64().unwrap() > warm_generation);
    assert_eq!(refreshed["subjects"][0]["totalPossible"], 150.0);
}

#[tokio::test]
async fn cached_progress_is_missing_until_a_cycle_commits() {
    let h = Harness::start().await;
    h.fake.grades_down.store(true, Ordering::SeqCst);
    let cookie = h.sign_in().await;

    let (status, _) = h.progress(&cookie).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, body) = h.get_json("/api/progress?cached=true", &cookie).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "cached");
    assert_eq!(body["snapshot"], Value::Null);
}

#[tokio::test]
async fn overlapping_progress_requests_commit_only_the_latest() {
    let h = Harness::start().await;
    let cookie = h.sign_in().await;
    h.cached_until(&cookie, |s| !s.is_null()).await;

    h.fake.hold_next_grades.store(true, Ordering::SeqCst);
    let first = {
        let client = h.client.clone();
        let url = h.url("/api/progress");
        let cookie = cookie.clone();
        tokio::spawn(async move {
            let response = client.get(url).header(COOKIE, cookie).send().await.unwrap();
            let status = response.status();
            (status, response.json::<Value>().await.unwrap())
        })
    };
    h.fake.grades_entered.notified().await;

    let (status, latest) = h.progress(&cookie).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["status"], "fresh");

    let (status, stale) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stale["status"], "superseded");
    h.fake.grades_release.notify_one();

    let committed = h.state.progress.snapshot(session_id(&cookie)).await.unwrap();
    assert_eq!(
        Some(committed.generation),
        latest["snapshot"]["generation"].as_u64()
    );
}

#[tokio::test]
async fn backend_rejecting_the_token_answers_unauthorized() {
    let h = Harness::start().await;
    let cookie = h.sign_in().await;
    h.cached_until(&cookie, |s| !s.is_null()).await;

    h.fake.grades_unauthorized.store(true, Ordering::SeqCst);
    let (status, body) = h.progress(&cookie).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn backend_outage_keeps_the_last_good_snapshot() {
    let h = Harness::start().await;
    let cookie = h.sign_in().await;

    let (status, first) = h.progress(&cookie).await;
    assert_eq!(status, StatusCode::OK);
    let generation = first["snapshot"]["generation"].clone();

    h.fake.grades_down.store(true, Ordering::SeqCst);
    let (status, body) = h.progress(&cookie).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
    assert_eq!(body["snapshot"]["generation"], generation);
    assert_eq!(body["snapshot"]["subjects"][0]["totalAchieved"], 70.0);
}

#[tokio::test]
async fn ids_cannot_escape_their_collection() {
    let h = Harness::start().await;
    let cookie = h.sign_in().await;

    for path in ["/api/grades/..%2Fusers%2Fu2", "/api/grades/g1%3Fall=true"] {
        let response = h
            .client
            .delete(h.url(path))
            .header(COOKIE, &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
    }
    assert_eq!(h.fake.deletes.load(Ordering::SeqCst), 0);

    let response = h
        .client
        .delete(h.url("/api/grades/g1"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(h.fake.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn agenda_events_and_timetable_are_scoped_to_the_user() {
    let h = Harness::start().await;
    let cookie = h.sign_in().await;

    let (status, events) = h.get_json("/api/events", &cookie).await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], "e1");
    assert_eq!(events[0]["date"], "2026-11-02");

    let (status, slots) = h.get_json("/api/timetable", &cookie).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slots[0]["day"], "Mon");
    assert_eq!(slots[0]["startTime"], "09:00:00");
    assert_eq!(slots[0]["subjectRef"]["id"], "s1");
}

#[tokio::test]
async fn expired_sessions_are_swept_with_their_refresh_state() {
    let h = Harness::start().await;
    let cookie = h.sign_in().await;
    h.cached_until(&cookie, |s| !s.is_null()).await;

    let auth = AuthContext {
        user_id: "u1".to_string(),
        display_name: None,
        token: BearerToken::new(token_for("u1")),
    };
    let swept = h
        .state
        .sessions
        .open(auth.clone(), Utc::now() - Duration::seconds(1))
        .await;
    let rejected = h
        .state
        .sessions
        .open(auth.clone(), Utc::now() - Duration::seconds(1))
        .await;
    h.state.progress.refresh(&swept.id, &auth).await;
    h.state.progress.refresh(&rejected.id, &auth).await;

    // Presenting an expired cookie drops its refresh state immediately.
    let (status, _) = h
        .get_json("/api/progress", &format!("session={}", rejected.id))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(h.state.progress.snapshot(&rejected.id).await.is_none());

    assert_eq!(h.state.sweep_sessions().await, 1);
    assert!(h.state.progress.snapshot(&swept.id).await.is_none());
    assert!(h.state.progress.snapshot(session_id(&cookie)).await.is_some());
}
