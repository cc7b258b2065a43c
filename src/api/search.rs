use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::response::wrap_user;

use super::{project_quotes, store_error, viewer, AppState};

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "searchFor", default)]
    search_for: String,
}

pub async fn search_quotes(
    state: web::Data<AppState>,
    auth: AuthUser,
    query: web::Query<SearchQuery>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let quotes = match state.store.search_quotes(&query.search_for) {
        Ok(quotes) => quotes,
        Err(e) => return store_error(e),
    };
    match project_quotes(&state.store, &quotes, &me) {
        Ok(views) => HttpResponse::Ok().json(views),
        Err(resp) => resp,
    }
}

pub async fn search_users(
    state: web::Data<AppState>,
    auth: AuthUser,
    query: web::Query<SearchQuery>,
) -> impl Responder {
    let me = match viewer(&state.store, &auth) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.search_users(&query.search_for) {
        Ok(users) => {
            let views: Vec<_> = users.iter().map(|user| wrap_user(user, &me)).collect();
            HttpResponse::Ok().json(views)
        }
        Err(e) => store_error(e),
    }
}
