use actix_web::{test, web, App};
use serde_json::json;
use std::sync::Arc;

use quoteverse::api::{self, AppState};
use quoteverse::auth::AuthService;
use quoteverse::mail::Mailer;
use quoteverse::models::{Quote, User};
use quoteverse::store::Store;

fn create_app_state(store: Arc<Store>, auth_service: Arc<AuthService>) -> AppState {
    AppState {
        store,
        auth_service,
        mailer: Arc::new(Mailer::from_env()),
    }
}

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

fn create_quote(store: &Arc<Store>, author_id: &str, text: &str) -> String {
    let mut quote = Quote {
        id: String::new(),
        seq: 0,
        text: text.to_string(),
        tags: Vec::new(),
        emotion: "neutral".to_string(),
        author_id: author_id.to_string(),
        likes: Vec::new(),
        comments: Vec::new(),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    store.create_quote(&mut quote).unwrap();
    quote.id
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
async fn test_like_then_unlike_quote() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (alice, _) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let (bob, bob_token) = create_test_user_with_token(&store, &auth_service, "bob").await;
    let quote_id = create_quote(&store, &alice.id, "likeable");
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri(&format!("/api/actions/like/quote/{}", quote_id))
        .insert_header(("Authorization", format!("Bearer {}", bob_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["is_liked"], true);
    assert_eq!(body["likes"], json!([bob.id.clone()]));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/actions/like/quote/{}", quote_id))
        .insert_header(("Authorization", format!("Bearer {}", bob_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["is_liked"], false);
    assert_eq!(body["likes"], json!([]));
}

#[actix_web::test]
async fn test_repeated_likes_never_duplicate() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (alice, _) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let (_, bob_token) = create_test_user_with_token(&store, &auth_service, "bob").await;
    let quote_id = create_quote(&store, &alice.id, "likeable");
    let app = init_app!(store, auth_service);

    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri(&format!("/api/actions/like/quote/{}", quote_id))
            .insert_header(("Authorization", format!("Bearer {}", bob_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    let quote = store.get_quote(&quote_id).unwrap();
    assert_eq!(quote.likes.len(), 1, "like set must stay at-most-once");
}

#[actix_web::test]
async fn test_like_missing_quote_not_found() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (_, token) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri("/api/actions/like/quote/nonexistent")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_quote_likers_listing() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (alice, alice_token) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let (_bob, bob_token) = create_test_user_with_token(&store, &auth_service, "bob").await;
    let quote_id = create_quote(&store, &alice.id, "likeable");
    let app = init_app!(store, auth_service);

    for token in [&alice_token, &bob_token] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/actions/like/quote/{}", quote_id))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/actions/like/quote/{}", quote_id))
        .insert_header(("Authorization", format!("Bearer {}", alice_token)))
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    let likers = body.as_array().unwrap();
    assert_eq!(likers.len(), 2);
    let usernames: Vec<_> = likers.iter().map(|u| u["username"].as_str().unwrap()).collect();
    assert!(usernames.contains(&"alice"));
    assert!(usernames.contains(&"bob"));
}

#[actix_web::test]
async fn test_like_and_unlike_comment() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (alice, alice_token) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let (bob, bob_token) = create_test_user_with_token(&store, &auth_service, "bob").await;
    let quote_id = create_quote(&store, &alice.id, "a post");
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri(&format!("/api/comments/{}", quote_id))
        .insert_header(("Authorization", format!("Bearer {}", alice_token)))
        .set_json(json!({"text": "a comment"}))
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    let comment_id = body[0]["id"].as_str().unwrap().to_string();

    // like twice, still one entry
    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri(&format!(
                "/api/actions/like/quote/{}/comment/{}",
                quote_id, comment_id
            ))
            .insert_header(("Authorization", format!("Bearer {}", bob_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
    let comment = store.get_comment(&quote_id, &comment_id).unwrap();
    assert_eq!(comment.likes, vec![bob.id.clone()]);

    let req = test::TestRequest::delete()
        .uri(&format!(
            "/api/actions/like/quote/{}/comment/{}",
            quote_id, comment_id
        ))
        .insert_header(("Authorization", format!("Bearer {}", bob_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["is_liked"], false);
    assert_eq!(body["likes"], json!([]));
}

#[actix_web::test]
async fn test_like_comment_on_wrong_quote_not_found() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (alice, alice_token) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let quote_id = create_quote(&store, &alice.id, "a post");
    let other_quote_id = create_quote(&store, &alice.id, "another post");
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri(&format!("/api/comments/{}", quote_id))
        .insert_header(("Authorization", format!("Bearer {}", alice_token)))
        .set_json(json!({"text": "a comment"}))
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    let comment_id = body[0]["id"].as_str().unwrap().to_string();

    // the comment is embedded in quote_id, not other_quote_id
    let req = test::TestRequest::post()
        .uri(&format!(
            "/api/actions/like/quote/{}/comment/{}",
            other_quote_id, comment_id
        ))
        .insert_header(("Authorization", format!("Bearer {}", alice_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_save_and_unsave_quote() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (alice, _) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let (bob, bob_token) = create_test_user_with_token(&store, &auth_service, "bob").await;
    let quote_id = create_quote(&store, &alice.id, "save me");
    let app = init_app!(store, auth_service);

    // save twice; set stays at-most-once
    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/api/actions/save/quotes")
            .insert_header(("Authorization", format!("Bearer {}", bob_token)))
            .set_json(json!({"quote_id": quote_id}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["is_saved"], true);
    }
    assert_eq!(store.get_user(&bob.id).unwrap().saved, vec![quote_id.clone()]);

    let req = test::TestRequest::get()
        .uri("/api/actions/save/quotes")
        .insert_header(("Authorization", format!("Bearer {}", bob_token)))
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["text"], "save me");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/actions/save/quotes/{}", quote_id))
        .insert_header(("Authorization", format!("Bearer {}", bob_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["is_saved"], false);
    assert!(store.get_user(&bob.id).unwrap().saved.is_empty());
}

#[actix_web::test]
async fn test_save_missing_quote_not_found() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (_, token) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::post()
        .uri("/api/actions/save/quotes")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"quote_id": "nonexistent"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_clear_saved_empties_set() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (alice, _) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let (bob, bob_token) = create_test_user_with_token(&store, &auth_service, "bob").await;
    let app = init_app!(store, auth_service);

    for text in ["one", "two"] {
        let quote_id = create_quote(&store, &alice.id, text);
        store.save_quote(&bob.id, &quote_id).unwrap();
    }

    let req = test::TestRequest::delete()
        .uri("/api/actions/save/quotes")
        .insert_header(("Authorization", format!("Bearer {}", bob_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("2"));
    assert!(store.get_user(&bob.id).unwrap().saved.is_empty());
}

#[actix_web::test]
async fn test_saved_by_user_listing() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let (alice, alice_token) = create_test_user_with_token(&store, &auth_service, "alice").await;
    let (bob, _) = create_test_user_with_token(&store, &auth_service, "bob").await;
    let quote_id = create_quote(&store, &alice.id, "bob saved this");
    store.save_quote(&bob.id, &quote_id).unwrap();
    let app = init_app!(store, auth_service);

    let req = test::TestRequest::get()
        .uri(&format!("/api/actions/saved/by/{}", bob.id))
        .insert_header(("Authorization", format!("Bearer {}", alice_token)))
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    let saved = body.as_array().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0]["text"], "bob saved this");
    // projected for the viewer (alice authored it)
    assert_eq!(saved[0]["is_owned"], true);
    assert_eq!(saved[0]["is_saved"], false);
}
