use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use std::sync::Arc;

use crate::auth::{AuthService, AuthUser};
use crate::mail::Mailer;
use crate::models::{ApiResponse, User};
use crate::response::{self, QuoteView};
use crate::store::{Store, StoreError};

pub mod actions;
pub mod auth;
pub mod comments;
pub mod connections;
pub mod feed;
pub mod guest;
pub mod quotes;
pub mod search;
pub mod users;

pub struct AppState {
    pub store: Arc<Store>,
    pub auth_service: Arc<AuthService>,
    pub mailer: Arc<Mailer>,
}

/// Fixed authorization-failure message; deliberately does not reveal whether
/// the underlying resource exists.
pub(crate) const NOT_AUTHORIZED: &str = "not authorized to perform this operation";

pub(crate) fn forbidden() -> HttpResponse {
    HttpResponse::Forbidden().json(ApiResponse::<()>::error(NOT_AUTHORIZED))
}

/// Map a store error to its transport status.
pub(crate) fn store_error(e: StoreError) -> HttpResponse {
    match e {
        StoreError::NotFound(msg) => HttpResponse::NotFound().json(ApiResponse::<()>::error(msg)),
        StoreError::Conflict(msg) => HttpResponse::Conflict().json(ApiResponse::<()>::error(msg)),
        other => {
            log::error!("store error: {}", other);
            HttpResponse::InternalServerError().json(ApiResponse::<()>::error("Database error"))
        }
    }
}

/// Load the full viewer aggregate for projection.
pub(crate) fn viewer(store: &Store, auth: &AuthUser) -> Result<User, HttpResponse> {
    store.get_user(&auth.user_id).map_err(store_error)
}

/// Project a batch of quotes for the viewer with a single author fetch.
/// Quotes whose author no longer resolves are skipped.
pub(crate) fn project_quotes(
    store: &Store,
    quotes: &[crate::models::Quote],
    viewer: &User,
) -> Result<Vec<QuoteView>, HttpResponse> {
    let authors = store
        .get_users_map(&response::author_ids_of(quotes))
        .map_err(store_error)?;
    Ok(quotes
        .iter()
        .filter_map(|quote| response::wrap_quote(quote, &authors, viewer))
        .collect())
}

// ==================== Health Check ====================

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

// ==================== Route Configuration ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(health))
        // Unauthenticated preview
        .route("/api/guest/quotes", web::get().to(guest::latest_quotes))
        // Auth
        .route("/api/auth/register", web::post().to(auth::register))
        .route("/api/auth/login", web::post().to(auth::login))
        .route("/api/auth/user", web::get().to(auth::current_user))
        .route("/api/auth/reset-password", web::post().to(auth::reset_password))
        // Users
        .route("/api/users", web::get().to(users::list_users))
        .route("/api/users", web::delete().to(users::delete_all_users))
        .route("/api/users/random/{size}", web::get().to(users::random_users))
        .route("/api/users/display-image", web::put().to(users::set_display_image))
        .route("/api/users/display-image", web::delete().to(users::clear_display_image))
        .route("/api/users/{id}", web::get().to(users::get_user))
        .route("/api/users/{id}", web::put().to(users::update_user))
        .route("/api/users/{id}", web::delete().to(users::delete_user))
        // Social graph
        .route("/api/connections/follow/{id}", web::post().to(connections::follow))
        .route("/api/connections/unfollow/{id}", web::delete().to(connections::unfollow))
        .route("/api/connections/followers/{id}", web::get().to(connections::followers))
        .route("/api/connections/following/{id}", web::get().to(connections::following))
        // Quotes
        .route("/api/quotes", web::get().to(quotes::list_quotes))
        .route("/api/quotes", web::post().to(quotes::create_quote))
        .route("/api/quotes", web::delete().to(quotes::delete_all_quotes))
        .route("/api/quotes/by/{user_id}", web::get().to(quotes::quotes_by_author))
        .route("/api/quotes/{id}", web::get().to(quotes::get_quote))
        .route("/api/quotes/{id}", web::put().to(quotes::update_quote))
        .route("/api/quotes/{id}", web::delete().to(quotes::delete_quote))
        // Comments
        .route("/api/comments/{quote_id}", web::get().to(comments::list_comments))
        .route("/api/comments/{quote_id}", web::post().to(comments::add_comment))
        .route("/api/comments/{quote_id}", web::delete().to(comments::clear_comments))
        .route("/api/comments/{quote_id}/{comment_id}", web::get().to(comments::get_comment))
        .route("/api/comments/{quote_id}/{comment_id}", web::put().to(comments::update_comment))
        .route("/api/comments/{quote_id}/{comment_id}", web::delete().to(comments::delete_comment))
        // Engagement
        .route("/api/actions/like/quote/{id}", web::get().to(actions::quote_likers))
        .route("/api/actions/like/quote/{id}", web::post().to(actions::like_quote))
        .route("/api/actions/like/quote/{id}", web::delete().to(actions::unlike_quote))
        .route(
            "/api/actions/like/quote/{quote_id}/comment/{comment_id}",
            web::get().to(actions::comment_likers),
        )
        .route(
            "/api/actions/like/quote/{quote_id}/comment/{comment_id}",
            web::post().to(actions::like_comment),
        )
        .route(
            "/api/actions/like/quote/{quote_id}/comment/{comment_id}",
            web::delete().to(actions::unlike_comment),
        )
        .route("/api/actions/save/quotes", web::get().to(actions::saved_quotes))
        .route("/api/actions/save/quotes", web::post().to(actions::save_quote))
        .route("/api/actions/save/quotes", web::delete().to(actions::clear_saved))
        .route("/api/actions/save/quotes/{quote_id}", web::delete().to(actions::unsave_quote))
        .route("/api/actions/saved/by/{user_id}", web::get().to(actions::saved_by))
        // Feed
        .route("/api/feed/quotes/{limit}", web::get().to(feed::quotes_page))
        .route(
            "/api/feed/quotes/{starting_seq}/{limit}",
            web::get().to(feed::quotes_page_after),
        )
        .route("/api/feed/users/{limit}", web::get().to(feed::users_page))
        .route(
            "/api/feed/users/{starting_seq}/{limit}",
            web::get().to(feed::users_page_after),
        )
        // Search
        .route("/api/search/quotes", web::get().to(search::search_quotes))
        .route("/api/search/users", web::get().to(search::search_users));
}
