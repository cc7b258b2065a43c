use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::models::{ApiResponse, CreateQuoteRequest, OpSummary, Quote, UpdateQuoteRequest};

use super::{forbidden, project_quotes, store_error, viewer, AppState};

#[derive(Deserialize)]
pub struct ListQuotesQuery {
    emotion: Option<String>,
    author: Option<String>,
}

pub async fn list_quotes(
    state: web::Data<AppState>,
    auth: AuthUser,
    query: web::Query<ListQuotesQuery>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let quotes = match state
        .store
        .list_quotes(query.emotion.as_deref(), query.author.as_deref())
    {
        Ok(quotes) => quotes,
        Err(e) => return store_error(e),
    };
    match project_quotes(&state.store, &quotes, &me) {
        Ok(views) => HttpResponse::Ok().json(views),
        Err(resp) => resp,
    }
}

pub async fn create_quote(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<CreateQuoteRequest>,
) -> impl Responder {
    if body.text.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("quote text is missing"));
    }

    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let mut quote = Quote {
        id: String::new(),
        seq: 0,
        text: body.text.clone(),
        tags: body.tags.clone(),
        emotion: body.emotion.clone(),
        author_id: me.id.clone(),
        likes: Vec::new(),
        comments: Vec::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    if let Err(e) = state.store.create_quote(&mut quote) {
        return store_error(e);
    }

    match project_quotes(&state.store, std::slice::from_ref(&quote), &me) {
        Ok(mut views) => match views.pop() {
            Some(view) => HttpResponse::Ok().json(view),
            None => HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to project quote")),
        },
        Err(resp) => resp,
    }
}

pub async fn get_quote(
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
    match project_quotes(&state.store, std::slice::from_ref(&quote), &me) {
        Ok(mut views) => match views.pop() {
            Some(view) => HttpResponse::Ok().json(view),
            None => HttpResponse::NotFound()
                .json(ApiResponse::<()>::error(format!("Quote {}", id))),
        },
        Err(resp) => resp,
    }
}

/// Partial update of text/tags/emotion; author only.
pub async fn update_quote(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateQuoteRequest>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let id = path.into_inner();
    let mut quote = match state.store.get_quote(&id) {
        Ok(quote) => quote,
        Err(e) => return store_error(e),
    };

    if !quote.is_owned(&me.id) {
        return forbidden();
    }

    if let Some(ref text) = body.text {
        quote.text = text.clone();
    }
    if let Some(ref tags) = body.tags {
        quote.tags = tags.clone();
    }
    if let Some(ref emotion) = body.emotion {
        quote.emotion = emotion.clone();
    }

    if let Err(e) = state.store.update_quote(&mut quote) {
        return store_error(e);
    }

    match project_quotes(&state.store, std::slice::from_ref(&quote), &me) {
        Ok(mut views) => match views.pop() {
            Some(view) => HttpResponse::Ok().json(view),
            None => HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to project quote")),
        },
        Err(resp) => resp,
    }
}

/// Delete a quote; author only.
pub async fn delete_quote(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    let quote = match state.store.get_quote(&id) {
        Ok(quote) => quote,
        Err(e) => return store_error(e),
    };

    if !quote.is_owned(&auth.user_id) {
        return forbidden();
    }

    match state.store.delete_quote(&id) {
        Ok(_) => HttpResponse::Ok().json(OpSummary::ok("quote deleted successfully")),
        Err(e) => store_error(e),
    }
}

/// Administrative bulk deletion; returns the count affected.
pub async fn delete_all_quotes(state: web::Data<AppState>, auth: AuthUser) -> impl Responder {
    if !auth.admin {
        return forbidden();
    }
    match state.store.delete_all_quotes() {
        Ok(count) => {
            HttpResponse::Ok().json(OpSummary::ok(format!("deleted {} quotes", count)))
        }
        Err(e) => store_error(e),
    }
}

pub async fn quotes_by_author(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let user_id = path.into_inner();
    let quotes = match state.store.list_quotes(None, Some(&user_id)) {
        Ok(quotes) => quotes,
        Err(e) => return store_error(e),
    };
    match project_quotes(&state.store, &quotes, &me) {
        Ok(views) => HttpResponse::Ok().json(views),
        Err(resp) => resp,
    }
}
