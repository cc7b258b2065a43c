use actix_web::{web, HttpResponse, Responder};

use super::{store_error, AppState};

/// Quotes are capped for unauthenticated visitors.
const GUEST_LIMIT: i64 = 10;

/// Unauthenticated preview: the newest quotes, serialized without any
/// viewer-relative projection.
pub async fn latest_quotes(state: web::Data<AppState>) -> impl Responder {
    match state.store.latest_quotes(GUEST_LIMIT) {
        Ok(quotes) => HttpResponse::Ok().json(quotes),
        Err(e) => store_error(e),
    }
}
