//! Contact form relay: validate, verify the Turnstile token, post to the
//! Discord webhook. One attempt, no retries.

use std::net::IpAddr;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

const MAX_MESSAGE_CHARS: usize = 2000;
const MAX_EMAIL_CHARS: usize = 254;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid submission: {0}")]
    Invalid(&'static str),

    #[error("captcha verification failed")]
    VerificationFailed,

    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("verifier responded with status {0}")]
    Verifier(u16),

    #[error("webhook responded with status {0}")]
    Webhook(u16),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Invalid(_) => StatusCode::BAD_REQUEST,
            RelayError::VerificationFailed => StatusCode::FORBIDDEN,
            RelayError::Transport(_) | RelayError::Verifier(_) | RelayError::Webhook(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactSubmission {
    pub email: String,
    pub message: String,
    /// Turnstile widget response
    pub token: String,
}

impl ContactSubmission {
    pub fn validate(&self) -> Result<(), RelayError> {
        let email = self.email.trim();
        if email.is_empty() || email.chars().count() > MAX_EMAIL_CHARS {
            return Err(RelayError::Invalid("email"));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.contains('@') => {}
            _ => return Err(RelayError::Invalid("email")),
        }

        let message = self.message.trim();
        if message.is_empty() || message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(RelayError::Invalid("message"));
        }

        if self.token.trim().is_empty() {
            return Err(RelayError::Invalid("token"));
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    username: &'static str,
    embeds: [Embed<'a>; 1],
    allowed_mentions: AllowedMentions,
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'static str,
    description: &'a str,
    fields: [EmbedField<'a>; 1],
}

#[derive(Debug, Serialize)]
struct EmbedField<'a> {
    name: &'static str,
    value: &'a str,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct AllowedMentions {
    parse: [&'static str; 0],
}

impl<'a> WebhookMessage<'a> {
    fn from_submission(submission: &'a ContactSubmission) -> Self {
        Self {
            username: "Homepage",
            embeds: [Embed {
                title: "New contact form submission",
                description: submission.message.trim(),
                fields: [EmbedField {
                    name: "Email",
                    value: submission.email.trim(),
                    inline: false,
                }],
            }],
            allowed_mentions: AllowedMentions { parse: [] },
        }
    }
}

#[derive(Debug, Deserialize)]
struct TurnstileVerdict {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

pub struct ContactRelay {
    client: reqwest::Client,
    webhook_url: String,
    turnstile_url: String,
    turnstile_secret: String,
}

impl ContactRelay {
    pub fn new(
        webhook_url: impl Into<String>,
        turnstile_url: impl Into<String>,
        turnstile_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
            turnstile_url: turnstile_url.into(),
            turnstile_secret: turnstile_secret.into(),
        })
    }

    pub async fn relay(
        &self,
        submission: &ContactSubmission,
        remote_ip: Option<IpAddr>,
    ) -> Result<(), RelayError> {
        submission.validate()?;
        self.verify(&submission.token, remote_ip).await?;

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&WebhookMessage::from_submission(submission))
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Contact webhook rejected message: {}", response.status());
            return Err(RelayError::Webhook(response.status().as_u16()));
        }

        info!("Relayed contact submission");
        Ok(())
    }

    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> Result<(), RelayError> {
        let mut form = vec![
            ("secret", self.turnstile_secret.clone()),
            ("response", token.to_string()),
        ];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip.to_string()));
        }

        let response = self
            .client
            .post(&self.turnstile_url)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RelayError::Verifier(response.status().as_u16()));
        }

        let verdict: TurnstileVerdict = response.json().await?;
        if verdict.success {
            Ok(())
        } else {
            warn!("Turnstile rejected token: {:?}", verdict.error_codes);
            Err(RelayError::VerificationFailed)
        }
    }
}
