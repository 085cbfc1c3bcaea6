//! Outbound mail through the provider's HTTP API.

use reqwest::Client;
use serde::Serialize;

use crate::config::MailConfig;
use crate::resp::problem::Problem;

#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl Email {
    pub fn new(to: impl ToString, subject: impl ToString, text: impl ToString) -> Email {
        Email {
            to: vec![to.to_string()],
            subject: subject.to_string(),
            text: text.to_string(),
            html: None,
        }
    }
}

#[derive(Serialize)]
struct ProviderRequest<'a> {
    from: &'a str,
    #[serde(flatten)]
    email: &'a Email,
}

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn not_configured() -> Problem {
        Problem::new_untyped(Status::InternalServerError, "Mail delivery isn't configured.")
    }

    #[inline]
    pub fn rejected(status: u16, body: String) -> Problem {
        Problem::new_untyped(Status::InternalServerError, "Mail provider rejected the message.")
            .insert_str("provider_status", status)
            .detail(body)
            .to_owned()
    }
}

#[derive(Debug, Clone)]
pub struct Mailer {
    client: Client,
    config: MailConfig,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Mailer {
        Mailer {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_url.is_some() && self.config.from.is_some()
    }

    /// Address that receives contact form notifications.
    pub fn notify_address(&self) -> Option<&str> {
        self.config.notify.as_deref()
    }

    pub async fn send(&self, email: &Email) -> Result<(), Problem> {
        let (Some(url), Some(from)) = (&self.config.api_url, &self.config.from) else {
            return Err(problem::not_configured());
        };

        let mut request = self.client.post(url).json(&ProviderRequest { from, email });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Mail provider answered {}: {}", status, body);
            return Err(problem::rejected(status.as_u16(), body));
        }

        tracing::info!("Sent '{}' to {} recipient(s)", email.subject, email.to.len());
        Ok(())
    }

    /// Sends without failing the caller; errors are only logged.
    pub async fn send_best_effort(&self, email: Email) {
        if !self.is_configured() {
            tracing::debug!("Mail not configured, skipping '{}'", email.subject);
            return;
        }
        if let Err(problem) = self.send(&email).await {
            tracing::warn!("Unable to send '{}': {}", email.subject, problem);
        }
    }
}
