use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::User;
use crate::validation::{is_valid_email, normalize_email, Validator};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// The caller's user id, placed in request extensions by the
/// authentication middleware once the bearer token checks out.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(alias = "currentPassword")]
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

const MIN_PASSWORD_LEN: usize = 6;

// JWT Creation
pub fn create_jwt(
    user_id: &str,
    secret: &str,
    hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(hours);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: usize::try_from(expiration.timestamp()).unwrap_or(0),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn token_subject(req: &HttpRequest) -> Result<String, ApiError> {
    req.extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.0.clone())
        .ok_or_else(|| ApiError::unauthorized("Not authorized, no token"))
}

/// The caller's account. 401 when the request carried no token, or when the
/// token outlived the account it was issued for.
pub async fn authenticated_user(req: &HttpRequest, data: &AppState) -> Result<User, ApiError> {
    let user_id = token_subject(req)?;
    match data.users.find_by_id(&user_id).await? {
        Some(user) => Ok(user),
        None => {
            warn!("Token presented for missing account {}", user_id);
            Err(ApiError::unauthorized("Not authorized, token failed"))
        }
    }
}

/// The caller's user id, checked against the store like [`authenticated_user`].
pub async fn current_user(req: &HttpRequest, data: &AppState) -> Result<String, ApiError> {
    Ok(authenticated_user(req, data).await?.id)
}

async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    Ok(web::block(move || bcrypt::hash(password, cost)).await??)
}

async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    Ok(web::block(move || bcrypt::verify(password, &hash)).await??)
}

fn validate_name(v: &mut Validator, name: Option<&str>) {
    const MESSAGE: &str = "Name must be between 2 and 50 characters";
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => {
            let len = n.chars().count();
            v.check((2..=50).contains(&len), "name", MESSAGE);
        }
        _ => v.error("name", "Name is required"),
    }
}

fn validate_email(v: &mut Validator, email: Option<&str>) {
    match email.map(str::trim) {
        Some(e) if !e.is_empty() => {
            v.check(is_valid_email(e), "email", "Please provide a valid email")
        }
        _ => v.error("email", "Email is required"),
    }
}

fn auth_payload(user: &User, token: String) -> serde_json::Value {
    serde_json::json!({ "user": user.profile(), "token": token })
}

// POST /api/auth/register
pub async fn register(
    data: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut v = Validator::new();
    validate_name(&mut v, body.name.as_deref());
    validate_email(&mut v, body.email.as_deref());
    match body.password.as_deref() {
        Some(p) if !p.is_empty() => v.check(
            p.chars().count() >= MIN_PASSWORD_LEN,
            "password",
            "Password must be at least 6 characters",
        ),
        _ => v.error("password", "Password is required"),
    }
    v.finish()?;

    let email = normalize_email(body.email.as_deref().unwrap_or_default());
    if data.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::bad_request("User already exists with this email"));
    }

    let password = body.password.clone().unwrap_or_default();
    let hashed = hash_password(password, data.config.bcrypt_cost).await?;
    let name = body.name.as_deref().unwrap_or_default().trim();
    let user = User::new(name, &email, hashed, Utc::now());
    data.users.insert(&user).await?;
    info!("User registered: {}", user.id);

    let token = create_jwt(&user.id, &data.config.jwt_secret, data.config.jwt_expire_hours)?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "User registered successfully",
        "data": auth_payload(&user, token),
    })))
}

// POST /api/auth/login
pub async fn login(
    data: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut v = Validator::new();
    validate_email(&mut v, body.email.as_deref());
    v.check(
        body.password.as_deref().map_or(false, |p| !p.is_empty()),
        "password",
        "Password is required",
    );
    v.finish()?;

    let email = normalize_email(body.email.as_deref().unwrap_or_default());
    let user = match data.users.find_by_email(&email).await? {
        Some(user) => user,
        None => return Err(ApiError::unauthorized("Invalid credentials")),
    };
    let password = body.password.clone().unwrap_or_default();
    if !verify_password(password, user.password.clone()).await? {
        warn!("Failed login for user {}", user.id);
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = create_jwt(&user.id, &data.config.jwt_secret, data.config.jwt_expire_hours)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Login successful",
        "data": auth_payload(&user, token),
    })))
}

// GET /api/auth/profile
pub async fn get_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user = authenticated_user(&req, &data).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": { "user": user.profile() },
    })))
}

// PUT /api/auth/profile
pub async fn update_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut user = authenticated_user(&req, &data).await?;

    let mut v = Validator::new();
    if body.name.is_some() {
        validate_name(&mut v, body.name.as_deref());
    }
    if body.email.is_some() {
        validate_email(&mut v, body.email.as_deref());
    }
    v.finish()?;

    if let Some(email) = body.email.as_deref().map(normalize_email) {
        if email != user.email {
            if data.users.find_by_email(&email).await?.is_some() {
                return Err(ApiError::bad_request("Email is already in use"));
            }
            user.email = email;
        }
    }
    if let Some(name) = body.name.as_deref() {
        user.name = name.trim().to_string();
    }

    if !data.users.replace(&user).await? {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Profile updated successfully",
        "data": { "user": user.profile() },
    })))
}

// PUT /api/auth/update-password
pub async fn update_password(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<UpdatePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut user = authenticated_user(&req, &data).await?;

    let mut v = Validator::new();
    v.check(
        body.old_password.as_deref().map_or(false, |p| !p.is_empty()),
        "oldPassword",
        "Current password is required",
    );
    match body.new_password.as_deref() {
        Some(p) if !p.is_empty() => v.check(
            p.chars().count() >= MIN_PASSWORD_LEN,
            "newPassword",
            "Password must be at least 6 characters",
        ),
        _ => v.error("newPassword", "New password is required"),
    }
    v.finish()?;

    let old_password = body.old_password.clone().unwrap_or_default();
    if !verify_password(old_password, user.password.clone()).await? {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let new_password = body.new_password.clone().unwrap_or_default();
    user.password = hash_password(new_password, data.config.bcrypt_cost).await?;
    if !data.users.replace(&user).await? {
        return Err(ApiError::not_found("User not found"));
    }
    info!("Password updated for user {}", user.id);

    let token = create_jwt(&user.id, &data.config.jwt_secret, data.config.jwt_expire_hours)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Password updated successfully",
        "data": { "token": token },
    })))
}

// DELETE /api/auth/profile
// Removes the account, its personal tasks and its team memberships. Team
// tasks the user created stay with their team.
pub async fn delete_account(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user = authenticated_user(&req, &data).await?;

    let tasks_removed = data.tasks.delete_personal(&user.id).await?;
    let teams_left = data.teams.remove_member_everywhere(&user.id).await?;
    data.users.delete(&user.id).await?;
    info!(
        "Deleted account {} ({} personal tasks, {} team memberships)",
        user.id, tasks_removed, teams_left
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Account deleted successfully",
        "data": {},
    })))
}
