pub mod ai;
pub mod config;
pub mod db;
pub mod models;
pub mod schema;
pub mod services;
pub mod session;
pub mod store;

use crate::ai::{AiAssistant, ChatCompletionsClient};
use crate::config::{AppConfig, ConfigError, StoreKind};
use crate::db::PgStore;
use crate::models::{
    AuthRequest, CreateTaskRequest, Insights, PasswordChangeRequest, Report, Task, UpdateTaskRequest,
    UserInfo,
};
use crate::services::{auth, insights, tasks};
use crate::session::{SessionStore, SESSION_COOKIE};
use crate::store::{MemoryStore, Repository};
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::figment::Figment;
use rocket::fs::{relative, FileServer};
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::{self, Json};
use rocket::serde::{Deserialize, Serialize};
use rocket::{catch, catchers, delete, get, patch, post, routes, Build, Responder, Rocket, State};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything a request handler needs, built once at startup.
pub struct TaskApp {
    pub repo: Arc<dyn Repository>,
    pub sessions: SessionStore,
    pub ai: AiAssistant,
    pub bcrypt_cost: u32,
}

impl TaskApp {
    pub fn new(
        repo: Arc<dyn Repository>,
        ai: AiAssistant,
        session_ttl: chrono::Duration,
        bcrypt_cost: u32,
    ) -> Self {
        TaskApp {
            repo,
            sessions: SessionStore::new(session_ttl),
            ai,
            bcrypt_cost,
        }
    }
}

// --- Errors ---

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(crate = "rocket::serde")]
pub struct ErrorDetail {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorDetail {
            error: error.into(),
            field: None,
        }
    }
}

#[derive(Responder, Debug)]
pub enum ApiError {
    #[response(status = 400)]
    BadRequest(Json<ErrorDetail>),
    #[response(status = 401)]
    Unauthorized(Json<ErrorDetail>),
    #[response(status = 404)]
    NotFound(Json<ErrorDetail>),
    #[response(status = 409)]
    Conflict(Json<ErrorDetail>),
    #[response(status = 500)]
    InternalError(Json<ErrorDetail>),
}

/// A JSON body whose parse errors surface as 400s instead of Rocket's 422.
pub type JsonBody<'r, T> = Result<Json<T>, json::Error<'r>>;

static MISSING_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"field `([^`]+)`").expect("valid field regex"));

fn parse_body<T>(body: JsonBody<'_, T>) -> Result<T, ApiError> {
    body.map(Json::into_inner).map_err(|err| {
        let error = err.to_string();
        let field = MISSING_FIELD
            .captures(&error)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        ApiError::BadRequest(Json(ErrorDetail { error, field }))
    })
}

// --- Session guard ---

/// The user behind the request's session cookie.
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    token: String,
}

#[derive(Debug, Clone, Copy)]
pub enum AuthError {
    MissingSession,
    InvalidSession,
    NoSessionState,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let app_state = match req.rocket().state::<TaskApp>() {
            Some(s) => s,
            None => {
                req.local_cache(|| Some(AuthError::NoSessionState));
                return Outcome::Error((Status::InternalServerError, AuthError::NoSessionState));
            }
        };

        let token = match req.cookies().get_private(SESSION_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => {
                req.local_cache(|| Some(AuthError::MissingSession));
                return Outcome::Error((Status::Unauthorized, AuthError::MissingSession));
            }
        };

        match app_state.sessions.resolve(&token) {
            Some(user_id) => Outcome::Success(AuthenticatedUser { user_id, token }),
            None => {
                req.local_cache(|| Some(AuthError::InvalidSession));
                Outcome::Error((Status::Unauthorized, AuthError::InvalidSession))
            }
        }
    }
}

fn start_session(app_state: &TaskApp, cookies: &CookieJar<'_>, user_id: Uuid) {
    // A fresh login replaces whatever session this browser held before.
    if let Some(previous) = cookies.get_private(SESSION_COOKIE) {
        app_state.sessions.destroy(previous.value());
    }
    let token = app_state.sessions.create(user_id);
    cookies.add_private(
        Cookie::build((SESSION_COOKIE, token))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/"),
    );
}

// --- Identity routes ---

#[post("/register", data = "<body>")]
pub fn register(
    body: JsonBody<'_, AuthRequest>,
    app_state: &State<TaskApp>,
    cookies: &CookieJar<'_>,
) -> Result<(Status, Json<UserInfo>), ApiError> {
    let auth_req = parse_body(body)?;
    let user = auth::register_user(app_state.repo.as_ref(), app_state.bcrypt_cost, auth_req)?;
    start_session(app_state, cookies, user.id);
    Ok((Status::Created, Json(user)))
}

#[post("/login", data = "<body>")]
pub fn login(
    body: JsonBody<'_, AuthRequest>,
    app_state: &State<TaskApp>,
    cookies: &CookieJar<'_>,
) -> Result<Json<UserInfo>, ApiError> {
    let auth_req = parse_body(body)?;
    let user = auth::login_user(app_state.repo.as_ref(), auth_req)?;
    start_session(app_state, cookies, user.id);
    Ok(Json(user))
}

#[post("/logout")]
pub fn logout(app_state: &State<TaskApp>, cookies: &CookieJar<'_>) -> Status {
    if let Some(cookie) = cookies.get_private(SESSION_COOKIE) {
        app_state.sessions.destroy(cookie.value());
        info!("session closed");
    }
    cookies.remove_private(Cookie::from(SESSION_COOKIE));
    // Always NoContent, whether or not a session existed.
    Status::NoContent
}

#[get("/user")]
pub fn current_user(app_state: &State<TaskApp>, user: AuthenticatedUser) -> Result<Json<UserInfo>, ApiError> {
    Ok(Json(auth::current_user(app_state.repo.as_ref(), user.user_id)?))
}

#[post("/user/password", data = "<body>")]
pub fn change_password(
    body: JsonBody<'_, PasswordChangeRequest>,
    app_state: &State<TaskApp>,
    user: AuthenticatedUser,
) -> Result<Status, ApiError> {
    let change_req = parse_body(body)?;
    auth::change_password(app_state.repo.as_ref(), app_state.bcrypt_cost, user.user_id, change_req)?;
    app_state.sessions.destroy_others(user.user_id, &user.token);
    Ok(Status::NoContent)
}

fn auth_routes() -> Vec<rocket::Route> {
    routes![register, login, logout, current_user, change_password]
}

// --- Task routes ---

#[get("/")]
pub fn list_tasks(app_state: &State<TaskApp>, user: AuthenticatedUser) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(tasks::list_tasks(app_state.repo.as_ref(), user.user_id)?))
}

#[post("/", data = "<body>")]
pub async fn create_task(
    body: JsonBody<'_, CreateTaskRequest>,
    app_state: &State<TaskApp>,
    user: AuthenticatedUser,
) -> Result<(Status, Json<Task>), ApiError> {
    let create_req = parse_body(body)?;
    let task = tasks::create_task(app_state.repo.as_ref(), &app_state.ai, user.user_id, create_req).await?;
    Ok((Status::Created, Json(task)))
}

#[patch("/<id>", data = "<body>")]
pub fn update_task(
    id: &str,
    body: JsonBody<'_, UpdateTaskRequest>,
    app_state: &State<TaskApp>,
    user: AuthenticatedUser,
) -> Result<Json<Task>, ApiError> {
    let update_req = parse_body(body)?;
    Ok(Json(tasks::update_task(app_state.repo.as_ref(), user.user_id, id, update_req)?))
}

#[delete("/<id>")]
pub fn delete_task(id: &str, app_state: &State<TaskApp>, user: AuthenticatedUser) -> Result<Status, ApiError> {
    tasks::delete_task(app_state.repo.as_ref(), user.user_id, id)?;
    Ok(Status::NoContent)
}

fn task_routes() -> Vec<rocket::Route> {
    routes![list_tasks, create_task, update_task, delete_task]
}

// --- Insight routes ---

#[get("/insights")]
pub async fn get_insights(app_state: &State<TaskApp>, user: AuthenticatedUser) -> Result<Json<Insights>, ApiError> {
    Ok(Json(insights::insights_for(app_state.repo.as_ref(), &app_state.ai, user.user_id).await?))
}

// Same computation as GET; exists so the UI can invalidate its cache with a POST.
#[post("/insights/refresh")]
pub async fn refresh_insights(
    app_state: &State<TaskApp>,
    user: AuthenticatedUser,
) -> Result<Json<Insights>, ApiError> {
    Ok(Json(insights::insights_for(app_state.repo.as_ref(), &app_state.ai, user.user_id).await?))
}

#[get("/report")]
pub async fn get_report(app_state: &State<TaskApp>, user: AuthenticatedUser) -> Result<Json<Report>, ApiError> {
    Ok(Json(insights::report_for(app_state.repo.as_ref(), &app_state.ai, user.user_id).await?))
}

fn insight_routes() -> Vec<rocket::Route> {
    routes![get_insights, refresh_insights, get_report]
}

// --- Catchers ---

// Serializable error response struct
#[derive(Serialize, Deserialize, Debug)]
#[serde(crate = "rocket::serde")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[catch(401)] // Catches Unauthorized
fn unauthorized_catcher(_status: Status, req: &Request<'_>) -> Json<ErrorResponse> {
    let (error_code, message) = match req.local_cache(|| None as Option<AuthError>) {
        Some(AuthError::MissingSession) => ("missing_session", "You must be logged in."),
        Some(AuthError::InvalidSession) => ("invalid_session", "Session is invalid or expired."),
        _ => ("unauthorized", "Access denied. A valid session is required."),
    };
    Json(ErrorResponse {
        error: error_code.to_string(),
        message: message.to_string(),
    })
}

#[catch(404)]
fn not_found_catcher(req: &Request<'_>) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        error: "not_found".to_string(),
        message: format!("No resource at {}.", req.uri().path()),
    })
}

#[catch(500)] // Catches Internal Server Error
fn internal_server_error_catcher(_status: Status, req: &Request<'_>) -> Json<ErrorResponse> {
    let (error_code, message) = match req.local_cache(|| None as Option<AuthError>) {
        Some(AuthError::NoSessionState) => ("no_session_state", "Critical application state (TaskApp) not found."),
        _ => ("internal_server_error", "An unexpected error occurred on the server."),
    };
    Json(ErrorResponse {
        error: error_code.to_string(),
        message: message.to_string(),
    })
}

// --- Assembly ---

/// Mounts routes, catchers and static files around an already built state.
pub fn build_rocket(figment: Figment, app_state: TaskApp) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(app_state)
        .mount("/", FileServer::from(relative!("static")))
        .mount("/api", auth_routes())
        .mount("/api/tasks", task_routes())
        .mount("/api", insight_routes())
        .register(
            "/",
            catchers![unauthorized_catcher, not_found_catcher, internal_server_error_catcher],
        )
}

/// Wires the configured store and model client into a launchable instance.
pub fn rocket_instance(config: &AppConfig) -> anyhow::Result<Rocket<Build>> {
    let repo: Arc<dyn Repository> = match config.store {
        StoreKind::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let pool = db::init_pool(database_url)?;
            let applied = db::run_migrations(&pool)?;
            info!(applied, "database migrations up to date");
            Arc::new(PgStore::new(pool))
        }
        StoreKind::Memory => {
            warn!("using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let generator = ChatCompletionsClient::new(&config.ai)?;
    info!(model = %config.ai.model, endpoint = %config.ai.base_url, "model client ready");
    let ai = AiAssistant::new(Arc::new(generator));

    let app_state = TaskApp::new(repo, ai, config.session_ttl, config.bcrypt_cost);
    let figment = rocket::Config::figment().merge(("secret_key", config.session_secret.as_str()));
    Ok(build_rocket(figment, app_state))
}
