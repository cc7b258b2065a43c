use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;

use crate::auth::{AuthService, AuthUser};
use crate::models::{
    ApiResponse, LoginRequest, LoginResponse, OpSummary, RegisterRequest, ResetPasswordRequest,
    User, DEFAULT_DISPLAY_IMAGE,
};
use crate::response::wrap_user;
use crate::store::StoreError;

use super::{store_error, viewer, AppState};

/// Register a new account. The password is generated server-side and
/// delivered by the welcome mail; delivery failure is logged, never surfaced.
pub async fn register(state: web::Data<AppState>, body: web::Json<RegisterRequest>) -> impl Responder {
    if body.username.is_empty()
        || body.firstname.is_empty()
        || body.lastname.is_empty()
        || body.email.is_empty()
    {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("Insufficient data"));
    }

    let temp_password = AuthService::generate_temp_password();
    let password_hash = match state.auth_service.hash_password(&temp_password) {
        Ok(hash) => hash,
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to hash password"))
        }
    };

    let mut user = User {
        id: String::new(),
        seq: 0,
        username: body.username.clone(),
        email: body.email.clone(),
        password_hash,
        firstname: body.firstname.clone(),
        lastname: body.lastname.clone(),
        display_image: DEFAULT_DISPLAY_IMAGE.to_string(),
        admin: false,
        following: Vec::new(),
        followers: Vec::new(),
        saved: Vec::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    if let Err(e) = state.store.create_user(&mut user) {
        return store_error(e);
    }

    state
        .mailer
        .send_welcome(&user.email, &user.username, &temp_password);

    HttpResponse::Ok().json(OpSummary::ok("Registered successfully"))
}

pub async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> impl Responder {
    let user = match state.store.get_user_by_username(&body.username) {
        Ok(user) => user,
        Err(StoreError::NotFound(_)) => {
            return HttpResponse::Unauthorized().json(ApiResponse::<()>::error("Invalid credentials"));
        }
        Err(e) => return store_error(e),
    };

    let valid = state
        .auth_service
        .verify_password(&body.password, &user.password_hash)
        .unwrap_or(false);

    if !valid {
        return HttpResponse::Unauthorized().json(ApiResponse::<()>::error("Invalid credentials"));
    }

    let token = match state.auth_service.generate_token(&user.id) {
        Ok(token) => token,
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to generate token"))
        }
    };

    HttpResponse::Ok().json(LoginResponse {
        message: "login successful".to_string(),
        token,
    })
}

/// The authenticated viewer, projected relative to itself.
pub async fn current_user(state: web::Data<AppState>, auth: AuthUser) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    HttpResponse::Ok().json(wrap_user(&me, &me))
}

pub async fn reset_password(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<ResetPasswordRequest>,
) -> impl Responder {
    if body.old_password.is_empty() || body.new_password.is_empty() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("old password and new password are required"));
    }

    let mut user = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let valid = state
        .auth_service
        .verify_password(&body.old_password, &user.password_hash)
        .unwrap_or(false);
    if !valid {
        return HttpResponse::Unauthorized().json(ApiResponse::<()>::error("Invalid credentials"));
    }

    user.password_hash = match state.auth_service.hash_password(&body.new_password) {
        Ok(hash) => hash,
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to hash password"))
        }
    };

    match state.store.update_user(&mut user) {
        Ok(_) => HttpResponse::Ok().json(OpSummary::ok("password changed successfully")),
        Err(e) => store_error(e),
    }
}
