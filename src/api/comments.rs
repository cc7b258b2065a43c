use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;

use crate::auth::AuthUser;
use crate::models::{ApiResponse, Comment, CommentRequest, OpSummary, User};
use crate::response::{wrap_comment, CommentView};
use crate::store::Store;

use super::{forbidden, store_error, viewer, AppState};

/// Project a batch of comments for the viewer with a single author fetch.
fn project_comments(
    store: &Store,
    comments: &[Comment],
    me: &User,
) -> Result<Vec<CommentView>, HttpResponse> {
    let mut author_ids = Vec::new();
    for comment in comments {
        if !author_ids.contains(&comment.author_id) {
            author_ids.push(comment.author_id.clone());
        }
    }
    let authors = store.get_users_map(&author_ids).map_err(store_error)?;
    Ok(comments
        .iter()
        .filter_map(|comment| wrap_comment(comment, &authors, me))
        .collect())
}

pub async fn list_comments(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let quote_id = path.into_inner();
    let comments = match state.store.comments_for_quote(&quote_id) {
        Ok(comments) => comments,
        Err(e) => return store_error(e),
    };
    match project_comments(&state.store, &comments, &me) {
        Ok(views) => HttpResponse::Ok().json(views),
        Err(resp) => resp,
    }
}

/// Append a comment to a quote. Any authenticated user may comment; the
/// author is always the viewer. Returns the quote's full comment list.
pub async fn add_comment(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<CommentRequest>,
) -> impl Responder {
    if body.text.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("comment is required"));
    }

    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let quote_id = path.into_inner();

    let mut comment = Comment {
        id: String::new(),
        quote_id: quote_id.clone(),
        author_id: me.id.clone(),
        text: body.text.clone(),
        likes: Vec::new(),
        created_at: Utc::now(),
    };
    if let Err(e) = state.store.add_comment(&mut comment) {
        return store_error(e);
    }

    let comments = match state.store.comments_for_quote(&quote_id) {
        Ok(comments) => comments,
        Err(e) => return store_error(e),
    };
    match project_comments(&state.store, &comments, &me) {
        Ok(views) => HttpResponse::Ok().json(views),
        Err(resp) => resp,
    }
}

/// Administrative: empty a quote's comment collection.
pub async fn clear_comments(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    if !auth.admin {
        return forbidden();
    }
    let quote_id = path.into_inner();
    match state.store.clear_comments(&quote_id) {
        Ok(quote) => HttpResponse::Ok().json(quote),
        Err(e) => store_error(e),
    }
}

pub async fn get_comment(
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
    match project_comments(&state.store, std::slice::from_ref(&comment), &me) {
        Ok(mut views) => match views.pop() {
            Some(view) => HttpResponse::Ok().json(view),
            None => HttpResponse::NotFound()
                .json(ApiResponse::<()>::error(format!("Comment {}", comment_id))),
        },
        Err(resp) => resp,
    }
}

/// Edit a comment's text; comment author only.
pub async fn update_comment(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<(String, String)>,
    body: web::Json<CommentRequest>,
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

    if !comment.is_owned(&me.id) {
        return forbidden();
    }

    let text = if body.text.is_empty() {
        comment.text.clone()
    } else {
        body.text.clone()
    };

    let updated = match state.store.update_comment_text(&quote_id, &comment_id, &text) {
        Ok(comment) => comment,
        Err(e) => return store_error(e),
    };
    match project_comments(&state.store, std::slice::from_ref(&updated), &me) {
        Ok(mut views) => match views.pop() {
            Some(view) => HttpResponse::Ok().json(view),
            None => HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to project comment")),
        },
        Err(resp) => resp,
    }
}

/// Delete a comment; comment author only.
pub async fn delete_comment(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (quote_id, comment_id) = path.into_inner();
    let comment = match state.store.get_comment(&quote_id, &comment_id) {
        Ok(comment) => comment,
        Err(e) => return store_error(e),
    };

    if !comment.is_owned(&auth.user_id) {
        return forbidden();
    }

    match state.store.delete_comment(&quote_id, &comment_id) {
        Ok(_) => HttpResponse::Ok().json(OpSummary::ok("comment deleted successfully")),
        Err(e) => store_error(e),
    }
}
