use actix_web::{web, HttpResponse, Responder};

use crate::auth::AuthUser;
use crate::models::{ApiResponse, OpSummary, SaveQuoteRequest};
use crate::response::{wrap_comment, wrap_user};

use super::{project_quotes, store_error, viewer, AppState};

// ==================== Quote likes ====================

pub async fn quote_likers(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let id = path.into_inner();
    let quote = match state.store.get_quote(&id) {
        Ok(quote) => quote,
        Err(e) => return store_error(e),
    };

    let likers = match state.store.get_users_map(&quote.likes) {
        Ok(map) => map,
        Err(e) => return store_error(e),
    };
    let views: Vec<_> = quote
        .likes
        .iter()
        .filter_map(|id| likers.get(id))
        .map(|liker| wrap_user(liker, &me))
        .collect();
    HttpResponse::Ok().json(views)
}

/// Like a quote. Idempotent: liking twice is the same as liking once.
/// Returns the updated projected quote.
pub async fn like_quote(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let id = path.into_inner();
    let quote = match state.store.like_quote(&id, &me.id) {
        Ok(quote) => quote,
        Err(e) => return store_error(e),
    };
    match project_quotes(&state.store, std::slice::from_ref(&quote), &me) {
        Ok(mut views) => match views.pop() {
            Some(view) => HttpResponse::Ok().json(view),
            None => HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to project quote")),
        },
        Err(resp) => resp,
    }
}

/// Unlike a quote. Removing an absent like is a no-op.
pub async fn unlike_quote(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let id = path.into_inner();
    let quote = match state.store.unlike_quote(&id, &me.id) {
        Ok(quote) => quote,
        Err(e) => return store_error(e),
    };
    match project_quotes(&state.store, std::slice::from_ref(&quote), &me) {
        Ok(mut views) => match views.pop() {
            Some(view) => HttpResponse::Ok().json(view),
            None => HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to project quote")),
        },
        Err(resp) => resp,
    }
}

// ==================== Comment likes ====================

pub async fn comment_likers(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let (quote_id, comment_id) = path.into_inner();
    let comment = match state.store.get_comment(&quote_id, &comment_id) {
        Ok(comment) => comment,
        Err(e) => return store_error(e),
    };

    let likers = match state.store.get_users_map(&comment.likes) {
        Ok(map) => map,
        Err(e) => return store_error(e),
    };
    let views: Vec<_> = comment
        .likes
        .iter()
        .filter_map(|id| likers.get(id))
        .map(|liker| wrap_user(liker, &me))
        .collect();
    HttpResponse::Ok().json(views)
}

fn project_comment(
    state: &AppState,
    comment: &crate::models::Comment,
    me: &crate::models::User,
) -> HttpResponse {
    let authors = match state.store.get_users_map(&[comment.author_id.clone()]) {
        Ok(map) => map,
        Err(e) => return store_error(e),
    };
    match wrap_comment(comment, &authors, me) {
        Some(view) => HttpResponse::Ok().json(view),
        None => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error("Failed to project comment")),
    }
}

/// Like an embedded comment; persistence targets the parent quote's rows.
/// Returns the updated projected comment.
pub async fn like_comment(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let (quote_id, comment_id) = path.into_inner();
    match state.store.like_comment(&quote_id, &comment_id, &me.id) {
        Ok(comment) => project_comment(&state, &comment, &me),
        Err(e) => store_error(e),
    }
}

pub async fn unlike_comment(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let (quote_id, comment_id) = path.into_inner();
    match state.store.unlike_comment(&quote_id, &comment_id, &me.id) {
        Ok(comment) => project_comment(&state, &comment, &me),
        Err(e) => store_error(e),
    }
}

// ==================== Saves ====================

pub async fn saved_quotes(state: web::Data<AppState>, auth: AuthUser) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let quotes = match state.store.saved_quotes(&me.id) {
        Ok(quotes) => quotes,
        Err(e) => return store_error(e),
    };
    match project_quotes(&state.store, &quotes, &me) {
        Ok(views) => HttpResponse::Ok().json(views),
        Err(resp) => resp,
    }
}

/// Save a quote to the viewer's saved set. Idempotent. Returns the projected
/// quote.
pub async fn save_quote(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<SaveQuoteRequest>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    if let Err(e) = state.store.save_quote(&me.id, &body.quote_id) {
        return store_error(e);
    }

    // reload so the projection sees the fresh saved set
    let me = match state.store.get_user(&me.id) {
        Ok(user) => user,
        Err(e) => return store_error(e),
    };
    let quote = match state.store.get_quote(&body.quote_id) {
        Ok(quote) => quote,
        Err(e) => return store_error(e),
    };
    match project_quotes(&state.store, std::slice::from_ref(&quote), &me) {
        Ok(mut views) => match views.pop() {
            Some(view) => HttpResponse::Ok().json(view),
            None => HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to project quote")),
        },
        Err(resp) => resp,
    }
}

/// Remove a quote from the viewer's saved set. Removing an absent entry is a
/// no-op.
pub async fn unsave_quote(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let quote_id = path.into_inner();
    if let Err(e) = state.store.unsave_quote(&auth.user_id, &quote_id) {
        return store_error(e);
    }

    let me = match state.store.get_user(&auth.user_id) {
        Ok(user) => user,
        Err(e) => return store_error(e),
    };
    let quote = match state.store.get_quote(&quote_id) {
        Ok(quote) => quote,
        Err(e) => return store_error(e),
    };
    match project_quotes(&state.store, std::slice::from_ref(&quote), &me) {
        Ok(mut views) => match views.pop() {
            Some(view) => HttpResponse::Ok().json(view),
            None => HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to project quote")),
        },
        Err(resp) => resp,
    }
}

/// Empty the viewer's saved set.
pub async fn clear_saved(state: web::Data<AppState>, auth: AuthUser) -> impl Responder {
    match state.store.clear_saved(&auth.user_id) {
        Ok(count) => {
            HttpResponse::Ok().json(OpSummary::ok(format!("removed {} saved quotes", count)))
        }
        Err(e) => store_error(e),
    }
}

/// Saved quotes of an arbitrary user, projected for the viewer.
pub async fn saved_by(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let user_id = path.into_inner();
    let quotes = match state.store.saved_quotes(&user_id) {
        Ok(quotes) => quotes,
        Err(e) => return store_error(e),
    };
    match project_quotes(&state.store, &quotes, &me) {
        Ok(views) => HttpResponse::Ok().json(views),
        Err(resp) => resp,
    }
}
