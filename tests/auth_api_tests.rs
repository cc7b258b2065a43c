use actix_web::{test, web, App};
use serde_json::json;
use std::sync::Arc;

use quoteverse::api::{self, AppState};
use quoteverse::auth::AuthService;
use quoteverse::mail::Mailer;
use quoteverse::models::User;
use quoteverse::store::Store;

fn create_app_state(store: Arc<Store>, auth_service: Arc<AuthService>) -> AppState {
    AppState {
        store,
        auth_service,
        mailer: Arc::new(Mailer::from_env()),
    }
}

/// Helper to create a test user with a known password and return their token
async fn create_test_user_with_token(
    store: &Arc<Store>,
    auth_service: &Arc<AuthService>,
    username: &str,
) -> (User, String) {
    let password_hash = auth_service.hash_password("testpass123").unwrap();

    let mut user = User {
        id: String::new(),
        seq: 0,
        username: username.to_string(),
        email: format!("{}@test.com", username),
        password_hash,
        firstname: username.to_string(),
        lastname: "Test".to_string(),
        display_image: String::new(),
        admin: false,
        following: Vec::new(),
        followers: Vec::new(),
        saved: Vec::new(),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    store.create_user(&mut user).unwrap();
    let token = auth_service.generate_token(&user.id).unwrap();
    (user, token)
}

macro_rules! init_app {
    ($store:expr, $auth:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($store.clone()))
                .app_data(web::Data::new($auth.clone()))
                .app_data(web::Data::new(create_app_state($store.clone(), $auth.clone())))
                .configure(api::configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_register_creates_user() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "username": "alice",
            "firstname": "Alice",
            "lastname": "Liddell",
            "email": "alice@test.com"
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);

    let user = store.get_user_by_username("alice").unwrap();
    assert_eq!(user.email, "alice@test.com");
    assert!(!user.password_hash.is_empty());
}

#[actix_web::test]
async fn test_register_missing_fields_rejected() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "username": "alice",
            "firstname": "",
            "lastname": "Liddell",
            "email": "alice@test.com"
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_register_duplicate_username_conflicts() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (_, _) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "username": "alice",
            "firstname": "Alice",
            "lastname": "Liddell",
            "email": "other@test.com"
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409, "duplicate username should conflict");
}

#[actix_web::test]
async fn test_login_returns_token() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (user, _) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "alice", "password": "testpass123"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "login successful");
    let token = body["token"].as_str().unwrap();
    let claims = auth_service.validate_token(token).unwrap();
    assert_eq!(claims.sub, user.id);
}

#[actix_web::test]
async fn test_login_wrong_password_unauthorized() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    create_test_user_with_token(&store, &auth_service, "alice").await;
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "alice", "password": "wrong"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_login_unknown_user_unauthorized() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "ghost", "password": "whatever"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_current_user_requires_auth() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::get().uri("/api/auth/user").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_current_user_projected_as_self() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (user, token) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::get()
        .uri("/api/auth/user")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["id"], user.id.as_str());
    assert_eq!(body["is_me"], true);
    assert_eq!(body["is_followed"], false);
    assert!(body.get("password_hash").is_none());
}

#[actix_web::test]
async fn test_reset_password_changes_credentials() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (_, token) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri("/api/auth/reset-password")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"old_password": "testpass123", "new_password": "newpass456"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    // old password no longer works
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "alice", "password": "testpass123"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    // new password does
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "alice", "password": "newpass456"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn test_reset_password_wrong_old_password() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (_, token) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri("/api/auth/reset-password")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"old_password": "nope", "new_password": "newpass456"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_token_for_deleted_user_rejected() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (user, token) = create_test_user_with_token(&store, &auth_service, "alice").await;
    store.delete_user(&user.id).unwrap();
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::get()
        .uri("/api/auth/user")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}
