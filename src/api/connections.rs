use actix_web::{web, HttpResponse, Responder};

use crate::auth::AuthUser;
use crate::models::{same_entity, ApiResponse, OpSummary};
use crate::response::wrap_user;

use super::{store_error, viewer, AppState};

/// Follow a user. The relation is established atomically by the store and is
/// idempotent; following an account twice is the same as following it once.
pub async fn follow(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let followee_id = path.into_inner();
    if same_entity(&followee_id, &auth.user_id) {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("cannot follow yourself"));
    }

    match state.store.follow(&auth.user_id, &followee_id) {
        Ok(_) => HttpResponse::Ok().json(OpSummary::ok("followed successfully")),
        Err(e) => store_error(e),
    }
}

pub async fn unfollow(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let followee_id = path.into_inner();
    match state.store.unfollow(&auth.user_id, &followee_id) {
        Ok(_) => HttpResponse::Ok().json(OpSummary::ok("unfollowed successfully")),
        Err(e) => store_error(e),
    }
}

pub async fn followers(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let id = path.into_inner();
    let user = match state.store.get_user(&id) {
        Ok(user) => user,
        Err(e) => return store_error(e),
    };

    let followers = match state.store.get_users_map(&user.followers) {
        Ok(map) => map,
        Err(e) => return store_error(e),
    };
    let views: Vec<_> = user
        .followers
        .iter()
        .filter_map(|id| followers.get(id))
        .map(|follower| wrap_user(follower, &me))
        .collect();
    HttpResponse::Ok().json(views)
}

pub async fn following(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let id = path.into_inner();
    let user = match state.store.get_user(&id) {
        Ok(user) => user,
        Err(e) => return store_error(e),
    };

    let following = match state.store.get_users_map(&user.following) {
        Ok(map) => map,
        Err(e) => return store_error(e),
    };
    let views: Vec<_> = user
        .following
        .iter()
        .filter_map(|id| following.get(id))
        .map(|followee| wrap_user(followee, &me))
        .collect();
    HttpResponse::Ok().json(views)
}
