use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Compare two entity ids by value.
///
/// Every ownership and identity check in the crate goes through this, so
/// authorization never depends on how an id was loaded, only on its value.
pub fn same_entity(a: &str, b: &str) -> bool {
    a == b
}

pub const DEFAULT_DISPLAY_IMAGE: &str = "/images/profile/default.png";

/// User is the identity aggregate. It owns its own follower/following/saved
/// sets; no other entity writes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Monotonic creation-sequence key, used as the pagination cursor.
    pub seq: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub firstname: String,
    pub lastname: String,
    pub display_image: String,
    pub admin: bool,
    pub following: Vec<String>,
    pub followers: Vec<String>,
    pub saved: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether this user follows the user with the given id.
    pub fn is_following(&self, id: &str) -> bool {
        self.following.iter().any(|f| same_entity(f, id))
    }

    /// Whether the quote with the given id is in this user's saved set.
    pub fn is_saved(&self, quote_id: &str) -> bool {
        self.saved.iter().any(|s| same_entity(s, quote_id))
    }

    /// Whether the given id is this user's own id.
    pub fn is_me(&self, user_id: &str) -> bool {
        same_entity(&self.id, user_id)
    }
}

/// Quote is the content aggregate. Comments exist only inside their quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: String,
    /// Monotonic creation-sequence key, used as the pagination cursor.
    pub seq: i64,
    pub text: String,
    pub tags: Vec<String>,
    pub emotion: String,
    pub author_id: String,
    pub likes: Vec<String>,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn is_liked(&self, user_id: &str) -> bool {
        self.likes.iter().any(|l| same_entity(l, user_id))
    }

    pub fn is_owned(&self, user_id: &str) -> bool {
        same_entity(&self.author_id, user_id)
    }
}

/// Comment lives in a Quote's ordered comment collection and has no
/// lifecycle outside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub quote_id: String,
    pub author_id: String,
    pub text: String,
    pub likes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_liked(&self, user_id: &str) -> bool {
        self.likes.iter().any(|l| same_entity(l, user_id))
    }

    pub fn is_owned(&self, user_id: &str) -> bool {
        same_entity(&self.author_id, user_id)
    }
}

// Request/Response types for API

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DisplayImageRequest {
    pub display_image: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuoteRequest {
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_emotion")]
    pub emotion: String,
}

fn default_emotion() -> String {
    "neutral".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuoteRequest {
    pub text: Option<String>,
    pub tags: Option<Vec<String>>,
    pub emotion: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveQuoteRequest {
    pub quote_id: String,
}

/// Summary returned by mutation endpoints that don't return an entity.
#[derive(Debug, Serialize, Deserialize)]
pub struct OpSummary {
    pub success: bool,
    pub message: String,
}

impl OpSummary {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
