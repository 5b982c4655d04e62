//! Auth store and HTTP client tests against an in-process stub of the SAINT BI
//! auth endpoints (cookie session, `{"error": ...}` bodies).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::tempdir;

use saintbi::config::SessionTiming;
use saintbi::error::ConsoleError;
use saintbi::identity::{ApiClient, AuthEvent, AuthState, AuthStore, CurrentUser, UserCache};
use saintbi::session::{CoordinatorOptions, SessionCoordinator, SessionPhase};

const SESSION_COOKIE: &str = "session-name";

#[derive(Default)]
struct StubState {
    sessions: HashMap<String, String>,
    next_sid: u64,
    fail_logout: bool,
    logouts: usize,
    extends: usize,
    password_changes: Vec<String>,
}

#[derive(Clone, Default)]
struct Stub(Arc<Mutex<StubState>>);

impl Stub {
    fn drop_sessions(&self) { self.0.lock().sessions.clear(); }
    fn fail_logout(&self) { self.0.lock().fail_logout = true; }
    fn logouts(&self) -> usize { self.0.lock().logouts }
    fn extends(&self) -> usize { self.0.lock().extends }
    fn password_changes(&self) -> Vec<String> { self.0.lock().password_changes.clone() }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let s = headers.get("cookie")?.to_str().ok()?;
    s.split(';')
        .filter_map(|p| p.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

fn session_user(stub: &Stub, headers: &HeaderMap) -> Option<String> {
    let sid = parse_cookie(headers, SESSION_COOKIE)?;
    stub.0.lock().sessions.get(&sid).cloned()
}

fn error_body(status: StatusCode, msg: &str) -> (StatusCode, HeaderMap, Json<Value>) {
    (status, HeaderMap::new(), Json(json!({ "error": msg })))
}

async fn login(State(stub): State<Stub>, Json(body): Json<Value>) -> (StatusCode, HeaderMap, Json<Value>) {
    let user = body.get("username").and_then(|v| v.as_str()).unwrap_or("");
    let pass = body.get("password").and_then(|v| v.as_str()).unwrap_or("");
    if user != "admin" || pass != "admin" {
        return error_body(StatusCode::UNAUTHORIZED, "Credenciales inválidas");
    }
    let sid = {
        let mut st = stub.0.lock();
        st.next_sid += 1;
        let sid = format!("sid{}", st.next_sid);
        st.sessions.insert(sid.clone(), user.to_string());
        sid
    };
    let mut headers = HeaderMap::new();
    let cookie = format!("{}={}; Path=/; Max-Age=1200; HttpOnly", SESSION_COOKIE, sid);
    headers.insert("set-cookie", HeaderValue::from_str(&cookie).unwrap());
    (StatusCode::OK, headers, Json(json!({ "id": 1, "username": user, "firstLogin": true })))
}

async fn logout(State(stub): State<Stub>, headers: HeaderMap) -> (StatusCode, HeaderMap, Json<Value>) {
    let mut st = stub.0.lock();
    st.logouts += 1;
    if st.fail_logout {
        return error_body(StatusCode::INTERNAL_SERVER_ERROR, "No se pudo cerrar la sesión");
    }
    if let Some(sid) = parse_cookie(&headers, SESSION_COOKIE) {
        st.sessions.remove(&sid);
    }
    let mut h = HeaderMap::new();
    h.insert("set-cookie", HeaderValue::from_static("session-name=; Path=/; Max-Age=0"));
    (StatusCode::OK, h, Json(json!({ "message": "Sesión cerrada exitosamente" })))
}

async fn extend(State(stub): State<Stub>, headers: HeaderMap) -> (StatusCode, HeaderMap, Json<Value>) {
    stub.0.lock().extends += 1;
    if session_user(&stub, &headers).is_none() {
        return error_body(StatusCode::UNAUTHORIZED, "Sesión no válida o no encontrada");
    }
    (StatusCode::OK, HeaderMap::new(), Json(json!({ "message": "Sesión extendida" })))
}

async fn change_password(State(stub): State<Stub>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, HeaderMap, Json<Value>) {
    if session_user(&stub, &headers).is_none() {
        return error_body(StatusCode::UNAUTHORIZED, "Sesión inválida");
    }
    let new = body.get("newPassword").and_then(|v| v.as_str()).unwrap_or("");
    let confirm = body.get("confirmPassword").and_then(|v| v.as_str()).unwrap_or("");
    if new.is_empty() || new != confirm {
        return error_body(StatusCode::BAD_REQUEST, "Las contraseñas no coinciden o están vacías");
    }
    stub.0.lock().password_changes.push(new.to_string());
    (StatusCode::OK, HeaderMap::new(), Json(json!({ "message": "Contraseña actualizada exitosamente" })))
}

async fn spawn_stub() -> (String, Stub) {
    let stub = Stub::default();
    let app = Router::new()
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/session/extend", post(extend))
        .route("/api/force-password-change", post(change_password))
        .with_state(stub.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), stub)
}

fn store_for(base: &str, cache: UserCache) -> AuthStore {
    AuthStore::restore(ApiClient::parse(base).unwrap(), cache)
}

#[tokio::test]
async fn login_persists_user_and_carries_cookie() {
    let (base, stub) = spawn_stub().await;
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("nested").join("user.json");
    let store = store_for(&base, UserCache::at(&cache_path));
    let mut events = store.subscribe();
    assert!(!store.is_authenticated());

    let user = store.login("admin", "admin").await.unwrap();
    assert_eq!(user, CurrentUser { id: 1, username: "admin".into(), first_login: true });
    assert!(store.is_authenticated());
    assert!(events.has_changed().unwrap());
    assert_eq!(*events.borrow_and_update(), AuthEvent::LoggedIn(user.clone()));

    let cached: CurrentUser = serde_json::from_str(&std::fs::read_to_string(&cache_path).unwrap()).unwrap();
    assert_eq!(cached, user);

    // The session cookie from login is what makes extend succeed.
    assert!(store.extend_session().await);
    assert_eq!(stub.extends(), 1);
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let (base, _stub) = spawn_stub().await;
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("user.json");
    let store = store_for(&base, UserCache::at(&cache_path));

    let err = store.login("admin", "nope").await.unwrap_err();
    assert!(matches!(err, ConsoleError::InvalidCredentials));
    assert!(err.is_unauthorized());
    assert!(!store.is_authenticated());
    assert!(!cache_path.exists());
}

#[tokio::test]
async fn extend_fails_once_server_forgets_session() {
    let (base, stub) = spawn_stub().await;
    let store = store_for(&base, UserCache::disabled());
    store.login("admin", "admin").await.unwrap();

    stub.drop_sessions();
    assert!(!store.extend_session().await);
    // Extend never changes the local flag; the coordinator decides what to do.
    assert!(store.is_authenticated());
}

#[tokio::test]
async fn logout_clears_local_state_when_server_errors() {
    let (base, stub) = spawn_stub().await;
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("user.json");
    let store = store_for(&base, UserCache::at(&cache_path));
    store.login("admin", "admin").await.unwrap();
    assert!(cache_path.exists());

    stub.fail_logout();
    let mut events = store.subscribe();
    store.logout().await;

    assert_eq!(stub.logouts(), 1);
    assert!(!store.is_authenticated());
    assert!(store.current_user().is_none());
    assert!(!cache_path.exists());
    assert_eq!(*events.borrow_and_update(), AuthEvent::LoggedOut);
}

#[tokio::test]
async fn unreachable_server_still_logs_out_locally() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("user.json");
    let cache = UserCache::at(&cache_path);
    cache.store(&CurrentUser { id: 3, username: "ventas".into(), first_login: false }).unwrap();

    // Nothing listens on port 1.
    let store = store_for("http://127.0.0.1:1", cache);
    assert!(store.is_authenticated());
    assert!(!store.extend_session().await);

    store.logout().await;
    assert!(!store.is_authenticated());
    assert!(!cache_path.exists());
}

#[tokio::test]
async fn password_change_validates_locally_then_posts() {
    let (base, stub) = spawn_stub().await;
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("user.json");
    let store = store_for(&base, UserCache::at(&cache_path));
    store.login("admin", "admin").await.unwrap();

    let err = store.change_password("admin", "admin").await.unwrap_err();
    assert_eq!(err.code_str(), "password_policy");
    let err = store.change_password("abc", "abd").await.unwrap_err();
    assert_eq!(err.code_str(), "password_policy");
    assert!(stub.password_changes().is_empty());

    store.change_password("Cl4ve-nueva", "Cl4ve-nueva").await.unwrap();
    assert_eq!(stub.password_changes(), vec!["Cl4ve-nueva".to_string()]);
    assert_eq!(store.current_user().map(|u| u.first_login), Some(false));
    let cached: CurrentUser = serde_json::from_str(&std::fs::read_to_string(&cache_path).unwrap()).unwrap();
    assert!(!cached.first_login);
}

#[tokio::test]
async fn password_change_surfaces_server_message() {
    let (base, stub) = spawn_stub().await;
    let store = store_for(&base, UserCache::disabled());
    store.login("admin", "admin").await.unwrap();
    stub.drop_sessions();

    match store.change_password("Cl4ve-nueva", "Cl4ve-nueva").await.unwrap_err() {
        ConsoleError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Sesión inválida");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn coordinator_extends_then_expires_against_server() {
    let (base, stub) = spawn_stub().await;
    let store = Arc::new(store_for(&base, UserCache::disabled()));
    store.login("admin", "admin").await.unwrap();

    let opts = CoordinatorOptions { timing: SessionTiming::from_millis(1_500, 1_000), warning_surface: true };
    let coordinator = SessionCoordinator::mount(store.clone(), opts);
    assert_eq!(coordinator.phase(), SessionPhase::Counting);

    let mut phase = coordinator.subscribe_phase();
    tokio::time::timeout(Duration::from_secs(5), phase.wait_for(|p| *p == SessionPhase::Warning))
        .await
        .expect("warning in time")
        .unwrap();
    assert!(coordinator.warning_visible());

    coordinator.extend().await;
    assert_eq!(stub.extends(), 1);
    assert_eq!(coordinator.phase(), SessionPhase::Counting);

    let mut events = store.subscribe();
    tokio::time::timeout(Duration::from_secs(5), events.wait_for(|e| *e == AuthEvent::LoggedOut))
        .await
        .expect("expiry in time")
        .unwrap();
    assert_eq!(stub.logouts(), 1);
    assert!(!store.is_authenticated());
    assert!(coordinator.armed_alarms().is_empty());
}
