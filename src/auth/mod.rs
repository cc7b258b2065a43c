use actix_web::error::ErrorUnauthorized;
use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use futures_util::future::{err, ok, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::Store;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: i64,    // expiration timestamp
    pub iat: i64,    // issued at
}

pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    /// Hash a password using bcrypt
    pub fn hash_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, 10)
    }

    /// Verify a password against a bcrypt hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
        bcrypt::verify(password, hash)
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::days(7);

        let claims = Claims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
    }

    /// Validate a JWT token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Generate a temporary password for a freshly registered user.
    /// Mailed once; the user is expected to change it via reset-password.
    pub fn generate_temp_password() -> String {
        use uuid::Uuid;
        Uuid::new_v4().to_string().replace('-', "")[..10].to_string()
    }
}

/// The authenticated viewer, resolved from the bearer token before any
/// handler runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub admin: bool,
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let auth_service = match req.app_data::<web::Data<Arc<AuthService>>>() {
            Some(service) => service,
            None => return err(ErrorUnauthorized("Auth service not configured")),
        };
        let store = match req.app_data::<web::Data<Arc<Store>>>() {
            Some(store) => store,
            None => return err(ErrorUnauthorized("Store not configured")),
        };

        let header = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
        {
            Some(header) => header,
            None => return err(ErrorUnauthorized("Missing Authorization header")),
        };

        let token = match header.strip_prefix("Bearer ") {
            Some(token) => token,
            None => return err(ErrorUnauthorized("Invalid Authorization header format")),
        };

        let claims = match auth_service.validate_token(token) {
            Ok(claims) => claims,
            Err(_) => return err(ErrorUnauthorized("Invalid token")),
        };

        // The token may outlive the account; resolve the viewer against the
        // store so deleted users stop authenticating immediately.
        match store.get_user(&claims.sub) {
            Ok(user) => ok(AuthUser {
                user_id: user.id,
                admin: user.admin,
            }),
            Err(_) => err(ErrorUnauthorized("Unknown user")),
        }
    }
}
