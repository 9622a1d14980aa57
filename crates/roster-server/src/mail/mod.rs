//! Outbound email
//!
//! [`HttpMailer`] delivers through a transactional mail HTTP API: one JSON
//! `POST` per message, bearer-token authenticated when a token is configured.

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::MailConfig;
use crate::error::SyncResult;

/// Plain-text message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> SyncResult<()>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    charset: &'static str,
}

impl<'a> From<&'a Email> for SendRequest<'a> {
    fn from(email: &'a Email) -> Self {
        Self {
            from: &email.from,
            to: [&email.to],
            subject: &email.subject,
            text: &email.body,
            charset: "UTF-8",
        }
    }
}

#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpMailer {
    pub fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build mail HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.api_url.clone(),
            token: config.api_token.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    #[instrument(skip(self, email), fields(to = %email.to))]
    async fn send(&self, email: &Email) -> SyncResult<()> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&SendRequest::from(email));

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .context("Failed to reach mail API")?
            .error_for_status()
            .with_context(|| format!("Mail API rejected message to {}", email.to))?;

        debug!("Email handed to mail API");
        Ok(())
    }
}
