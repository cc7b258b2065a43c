use actix_web::{web, HttpResponse, Responder};

use crate::auth::AuthUser;
use crate::models::{
    same_entity, ApiResponse, DisplayImageRequest, OpSummary, UpdateUserRequest,
    DEFAULT_DISPLAY_IMAGE,
};
use crate::response::wrap_user;

use super::{forbidden, store_error, viewer, AppState};

pub async fn list_users(state: web::Data<AppState>, auth: AuthUser) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.list_users() {
        Ok(users) => {
            let views: Vec<_> = users.iter().map(|user| wrap_user(user, &me)).collect();
            HttpResponse::Ok().json(views)
        }
        Err(e) => store_error(e),
    }
}

pub async fn get_user(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let id = path.into_inner();
    match state.store.get_user(&id) {
        Ok(user) => HttpResponse::Ok().json(wrap_user(&user, &me)),
        Err(e) => store_error(e),
    }
}

/// Partial profile update, self only. Username uniqueness is re-checked.
pub async fn update_user(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateUserRequest>,
) -> impl Responder {
    let id = path.into_inner();
    if !same_entity(&id, &auth.user_id) {
        return forbidden();
    }

    let mut user = match state.store.get_user(&id) {
        Ok(user) => user,
        Err(e) => return store_error(e),
    };

    if let Some(ref username) = body.username {
        match state.store.username_taken(username, &id) {
            Ok(true) => {
                return HttpResponse::Conflict()
                    .json(ApiResponse::<()>::error("Username already exists"));
            }
            Ok(false) => user.username = username.clone(),
            Err(e) => return store_error(e),
        }
    }
    if let Some(ref firstname) = body.firstname {
        user.firstname = firstname.clone();
    }
    if let Some(ref lastname) = body.lastname {
        user.lastname = lastname.clone();
    }

    match state.store.update_user(&mut user) {
        Ok(_) => HttpResponse::Ok().json(wrap_user(&user, &user)),
        Err(e) => store_error(e),
    }
}

/// Delete an account, self only.
pub async fn delete_user(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    if !same_entity(&id, &auth.user_id) {
        return forbidden();
    }

    match state.store.delete_user(&id) {
        Ok(_) => HttpResponse::Ok().json(OpSummary::ok("user deleted successfully")),
        Err(e) => store_error(e),
    }
}

/// Administrative bulk deletion; returns the count affected.
pub async fn delete_all_users(state: web::Data<AppState>, auth: AuthUser) -> impl Responder {
    if !auth.admin {
        return forbidden();
    }
    match state.store.delete_all_users() {
        Ok(count) => {
            HttpResponse::Ok().json(OpSummary::ok(format!("deleted {} users", count)))
        }
        Err(e) => store_error(e),
    }
}

/// Random follow suggestions, excluding the viewer and everyone they follow.
pub async fn random_users(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> impl Responder {
    let size = path.into_inner().clamp(1, 100);
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let mut exclude = me.following.clone();
    exclude.push(me.id.clone());

    match state.store.random_users(&exclude, size) {
        Ok(users) => {
            let views: Vec<_> = users.iter().map(|user| wrap_user(user, &me)).collect();
            HttpResponse::Ok().json(views)
        }
        Err(e) => store_error(e),
    }
}

/// Store the media-store reference path on the viewer. The image itself is
/// uploaded to and served by the media store; only the path lives here.
pub async fn set_display_image(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<DisplayImageRequest>,
) -> impl Responder {
    if body.display_image.is_empty() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("display image path is required"));
    }

    let mut user = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    user.display_image = body.display_image.clone();

    match state.store.update_user(&mut user) {
        Ok(_) => HttpResponse::Ok().json(wrap_user(&user, &user)),
        Err(e) => store_error(e),
    }
}

/// Reset the display image reference to the default.
pub async fn clear_display_image(state: web::Data<AppState>, auth: AuthUser) -> impl Responder {
    let mut user = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    user.display_image = DEFAULT_DISPLAY_IMAGE.to_string();

    match state.store.update_user(&mut user) {
        Ok(_) => HttpResponse::Ok().json(wrap_user(&user, &user)),
        Err(e) => store_error(e),
    }
}
