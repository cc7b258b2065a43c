use actix_web::{web, HttpResponse, Responder};

use crate::auth::AuthUser;
use crate::response::wrap_user;

use super::{project_quotes, store_error, viewer, AppState};

/// Page sizes are clamped rather than trusted; a zero or negative limit
/// becomes 1 and anything above 100 becomes 100.
fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, 100)
}

/// The viewer's own id plus everyone they follow — the author set the quote
/// feed is filtered by.
fn feed_authors(me: &crate::models::User) -> Vec<String> {
    let mut ids = me.following.clone();
    ids.push(me.id.clone());
    ids
}

/// First page of the quote feed: newest quotes by the viewer and the
/// accounts they follow.
pub async fn quotes_page(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> impl Responder {
    let limit = clamp_limit(path.into_inner());
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let quotes = match state.store.feed_quotes(&feed_authors(&me), None, limit) {
        Ok(quotes) => quotes,
        Err(e) => return store_error(e),
    };
    match project_quotes(&state.store, &quotes, &me) {
        Ok(views) => HttpResponse::Ok().json(views),
        Err(resp) => resp,
    }
}

/// Subsequent feed pages: quotes strictly older than the cursor, which is
/// the `seq` of the last item of the previous page. The comparison is purely
/// positional, so a cursor whose quote has since been deleted still works.
pub async fn quotes_page_after(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<(i64, i64)>,
) -> impl Responder {
    let (starting_seq, limit) = path.into_inner();
    let limit = clamp_limit(limit);
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let quotes = match state
        .store
        .feed_quotes(&feed_authors(&me), Some(starting_seq), limit)
    {
        Ok(quotes) => quotes,
        Err(e) => return store_error(e),
    };
    match project_quotes(&state.store, &quotes, &me) {
        Ok(views) => HttpResponse::Ok().json(views),
        Err(resp) => resp,
    }
}

/// First page of the user listing, ordered by creation sequence ascending.
pub async fn users_page(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> impl Responder {
    let limit = clamp_limit(path.into_inner());
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match state.store.page_users(None, limit) {
        Ok(users) => {
            let views: Vec<_> = users.iter().map(|user| wrap_user(user, &me)).collect();
            HttpResponse::Ok().json(views)
        }
        Err(e) => store_error(e),
    }
}

/// Subsequent user-listing pages: users strictly newer than the cursor.
pub async fn users_page_after(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<(i64, i64)>,
) -> impl Responder {
    let (starting_seq, limit) = path.into_inner();
    let limit = clamp_limit(limit);
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match state.store.page_users(Some(starting_seq), limit) {
        Ok(users) => {
            let views: Vec<_> = users.iter().map(|user| wrap_user(user, &me)).collect();
            HttpResponse::Ok().json(views)
        }
        Err(e) => store_error(e),
    }
}
