//! Outbound mail dispatch.
//!
//! The service does not speak SMTP itself; it posts a JSON envelope to an
//! HTTP mail relay configured via `MAIL_WEBHOOK_URL`. Delivery is
//! fire-and-forget: registration must not fail because the relay is down, so
//! failures are logged and swallowed.

use reqwest::Client;
use std::env;

pub struct Mailer {
    client: Client,
    webhook_url: Option<String>,
}

impl Mailer {
    pub fn from_env() -> Self {
        let webhook_url = env::var("MAIL_WEBHOOK_URL").ok();
        if webhook_url.is_none() {
            log::warn!("MAIL_WEBHOOK_URL not set, welcome mails will be skipped");
        }
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| Client::new()),
            webhook_url,
        }
    }

    /// Dispatch the welcome mail carrying the temporary password.
    pub fn send_welcome(&self, to_email: &str, username: &str, temp_password: &str) {
        let url = match self.webhook_url.clone() {
            Some(url) => url,
            None => {
                log::info!("skipping welcome mail for {}", username);
                return;
            }
        };

        let body = serde_json::json!({
            "to": to_email,
            "subject": "New Password | Welcome to Quoteverse",
            "template": "welcome",
            "params": {
                "username": username,
                "temp_password": temp_password,
            }
        });

        let client = self.client.clone();
        let username = username.to_string();
        actix_web::rt::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    log::debug!("welcome mail dispatched for {}", username)
                }
                Ok(resp) => log::warn!(
                    "mail relay returned {} for welcome mail to {}",
                    resp.status(),
                    username
                ),
                Err(e) => log::warn!("failed to dispatch welcome mail for {}: {}", username, e),
            }
        });
    }
}
