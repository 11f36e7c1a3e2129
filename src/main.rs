// src/main.rs

#[cfg(test)]
#[macro_use]
mod test_support;

mod app_state;
mod auth;
mod config;
mod db;
mod error;
mod invitation;
mod mail;
mod models;
mod policy;
mod stats;
mod store;
mod tasks;
mod teams;
mod validation;

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpRequest, HttpResponse, HttpServer, ResponseError,
};
use chrono::Utc;
use env_logger::Env;
use futures::future::{ok, Ready};
use log::{info, warn};

use crate::app_state::AppState;
use crate::auth::{validate_jwt, AuthenticatedUser};
use crate::error::ApiError;
use crate::mail::LogMailer;
use crate::store::mongo::{ensure_indexes, MongoTaskStore, MongoTeamStore, MongoUserStore};

/// Resolves a bearer token into an [`AuthenticatedUser`] extension. Requests
/// without a token pass through untouched; handlers that need a user reject
/// them. A token that fails validation is answered with 401 here.
#[derive(Debug)]
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware { service })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract "Bearer <token>" from the Authorization header if present
        let token = req
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string());

        if let Some(token) = token {
            match verify_token(&req, &token) {
                Ok(user_id) => {
                    req.extensions_mut().insert(AuthenticatedUser(user_id));
                }
                Err(e) => {
                    warn!("Rejected bearer token on {}: {}", req.path(), e);
                    let (req_parts, _payload) = req.into_parts();
                    let resp =
                        ApiError::unauthorized("Not authorized, token failed").error_response();
                    let srv_resp = ServiceResponse::new(req_parts, resp);
                    return Box::pin(async move { Ok(srv_resp) });
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

fn verify_token(req: &ServiceRequest, token: &str) -> Result<String, String> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| "application state missing".to_string())?;
    validate_jwt(token, &state.config.jwt_secret)
        .map(|claims| claims.sub)
        .map_err(|e| format!("Token decode error: {}", e))
}

async fn root() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "TaskNest API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "status": "OK",
        "timestamp": Utc::now(),
        "uptime": data.started_at.elapsed().as_secs_f64(),
    }))
}

async fn not_found(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    Err(ApiError::not_found(format!("Not Found - {}", req.path())))
}

/// Every route of the API, shared by the server and the tests.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .route("/", web::get().to(root))
    .route("/health", web::get().to(health))
    // AUTH
    .service(
        web::scope("/api/auth")
            .route("/register", web::post().to(auth::register))
            .route("/login", web::post().to(auth::login))
            .route("/profile", web::get().to(auth::get_profile))
            .route("/profile", web::put().to(auth::update_profile))
            .route("/profile", web::delete().to(auth::delete_account))
            .route("/update-password", web::put().to(auth::update_password)),
    )
    // TASKS
    .service(
        web::scope("/api/tasks")
            .route("", web::get().to(tasks::get_tasks))
            .route("", web::post().to(tasks::create_task))
            .route("/stats", web::get().to(tasks::get_task_stats))
            .route("/{id}", web::get().to(tasks::get_task))
            .route("/{id}", web::put().to(tasks::update_task))
            .route("/{id}", web::delete().to(tasks::delete_task)),
    )
    // TEAMS
    .service(
        web::scope("/api/teams")
            .route("", web::get().to(teams::get_teams))
            .route("", web::post().to(teams::create_team))
            .route("/join", web::post().to(teams::join_team))
            .route("/accept-invite", web::post().to(teams::accept_invite))
            .route("/{id}/invite", web::post().to(teams::invite_member))
            .route("/{id}/members", web::get().to(teams::get_team_members)),
    )
    .default_service(web::to(not_found));
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mongodb = db::MongoDB::connect(&config).await.map_err(io::Error::other)?;
    ensure_indexes(&mongodb.db).await.map_err(io::Error::other)?;

    let state = AppState {
        users: Arc::new(MongoUserStore::new(&mongodb.db)),
        tasks: Arc::new(MongoTaskStore::new(&mongodb.db)),
        teams: Arc::new(MongoTeamStore::new(&mongodb.db)),
        mailer: Arc::new(LogMailer::new(&config.mail_from)),
        config: config.clone(),
        started_at: Instant::now(),
    };

    let frontend_origin = config.frontend_origin.clone();
    info!("Server running at http://0.0.0.0:{}", config.port);
    info!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication)
            .app_data(web::Data::new(state.clone()))
            .configure(configure_routes)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await?;

    mongodb.client.shutdown().await;
    Ok(())
}
