use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use crate::auth::jwt::TokenService;
use crate::config::MailConfig;

const TEMPLATE: &str = include_str!("../templates/email_template.html");

/// Why an email link is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailPurpose {
    Registration,
    PasswordReset,
}

impl EmailPurpose {
    fn subject(self) -> &'static str {
        match self {
            EmailPurpose::Registration => "Contacts App - Confirm your email",
            EmailPurpose::PasswordReset => "Contacts App - Password reset",
        }
    }

    fn link_path(self) -> &'static str {
        match self {
            EmailPurpose::Registration => "api/auth/confirmed_email",
            EmailPurpose::PasswordReset => "api/auth/password-reset",
        }
    }

    fn intro(self) -> &'static str {
        match self {
            EmailPurpose::Registration => {
                "Thanks for signing up. Please confirm your email address to activate your account."
            }
            EmailPurpose::PasswordReset => {
                "We received a request to reset your password. Use the link below to choose a new one."
            }
        }
    }

    fn action(self) -> &'static str {
        match self {
            EmailPurpose::Registration => "Confirm email",
            EmailPurpose::PasswordReset => "Reset password",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()>;
}

/// Delivers through a transactional-mail HTTP relay.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
    from_name: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    from_name: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(api_url: String, cfg: &MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key: cfg.api_key.clone(),
            from: cfg.from.clone(),
            from_name: cfg.from_name.clone(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
        let payload = RelayPayload {
            from: &self.from,
            from_name: &self.from_name,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        };
        self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("mail relay request")?
            .error_for_status()
            .context("mail relay rejected message")?;
        Ok(())
    }
}

/// Development fallback when no relay is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
        info!(to = %message.to, subject = %message.subject, body = %message.html, "email (not sent, no relay configured)");
        Ok(())
    }
}

pub fn build_mailer(cfg: &MailConfig) -> Arc<dyn Mailer> {
    match &cfg.api_url {
        Some(url) => Arc::new(HttpMailer::new(url.clone(), cfg)),
        None => Arc::new(LogMailer),
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_email(
    to: &str,
    username: &str,
    purpose: EmailPurpose,
    base_url: &str,
    token: &str,
    expiration: &str,
) -> EmailMessage {
    let link = format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        purpose.link_path(),
        token
    );
    let html = TEMPLATE
        .replace("{{subject}}", purpose.subject())
        .replace("{{username}}", &escape_html(username))
        .replace("{{intro}}", purpose.intro())
        .replace("{{action}}", purpose.action())
        .replace("{{link}}", &escape_html(&link))
        .replace("{{expiration}}", expiration);
    EmailMessage {
        to: to.to_string(),
        subject: purpose.subject().to_string(),
        html,
    }
}

/// Issues an email token and delivers the link. Never fails: errors are logged.
pub async fn send_email(
    mailer: &dyn Mailer,
    tokens: &TokenService,
    to: &str,
    username: &str,
    purpose: EmailPurpose,
    base_url: &str,
) {
    let (token, expiration) = match tokens.create_email_token(to) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, to = %to, "email token creation failed");
            return;
        }
    };
    let message = render_email(to, username, purpose, base_url, &token, &expiration);
    match mailer.send(message).await {
        Ok(()) => info!(to = %to, purpose = ?purpose, "email sent"),
        Err(e) => error!(error = %e, to = %to, purpose = ?purpose, "email delivery failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_embeds_link_and_expiry() {
        let msg = render_email(
            "a@example.com",
            "alice",
            EmailPurpose::Registration,
            "http://localhost:8080/",
            "tok123",
            "01-02-2030 10:00",
        );
        assert_eq!(msg.to, "a@example.com");
        assert!(msg
            .html
            .contains("http://localhost:8080/api/auth/confirmed_email/tok123"));
        assert!(msg.html.contains("01-02-2030 10:00"));
        assert!(msg.html.contains("Hello alice"));
        assert!(!msg.html.contains("{{"));
    }

    #[test]
    fn reset_link_points_at_reset_route() {
        let msg = render_email(
            "a@example.com",
            "alice",
            EmailPurpose::PasswordReset,
            "https://contacts.example",
            "t",
            "x",
        );
        assert!(msg
            .html
            .contains("https://contacts.example/api/auth/password-reset/t"));
        assert_eq!(msg.subject, "Contacts App - Password reset");
    }

    #[test]
    fn username_is_escaped() {
        let msg = render_email(
            "a@example.com",
            "<script>",
            EmailPurpose::Registration,
            "http://h",
            "t",
            "x",
        );
        assert!(msg.html.contains("&lt;script&gt;"));
        assert!(!msg.html.contains("<script>"));
    }
}
