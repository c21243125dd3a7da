use crate::backup::function_path;
use crate::backup::notifications::Notification;
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use bon::Builder;
use function_name::named;
use getset::Getters;
use itertools::Itertools;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::Display;
use validator::Validate;

/// Mail relay and addresses used for backup notifications.
///
/// The defaults match a local relay: port 25, no TLS, no authentication.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct SmtpNotificationConfig {
    #[validate(length(min = 1))]
    #[builder(into)]
    host: String,
    port: Option<u16>,
    #[serde(default)]
    #[builder(default)]
    smtp_mode: SmtpMode,
    #[builder(into)]
    from: Mailbox,
    #[validate(length(min = 1))]
    #[builder(into)]
    to: Vec<Mailbox>,
    #[validate(nested)]
    credentials: Option<SmtpCredentials>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct SmtpCredentials {
    #[validate(length(min = 1))]
    #[builder(into)]
    username: String,
    #[validate(nested)]
    #[builder(into)]
    password: RedactedString,
}

/// SMTP connection security modes
///
/// - `Unsecured`: Plain text connection
/// - `Ssl`: SSL/TLS encrypted connection from start
/// - `StartTls`: Start with plain text, then upgrade to TLS
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SmtpMode {
    #[default]
    Unsecured,
    Ssl,
    StartTls,
}

impl SmtpNotificationConfig {
    #[named]
    fn build_message<D1: Display, D2: Display>(&self, topic: D1, msg: D2) -> Result<Message> {
        self.to
            .iter()
            .fold(Message::builder(), |email, send_to| {
                email.to(send_to.clone())
            })
            .from(self.from.clone())
            .subject(format!("{}", topic))
            .header(ContentType::TEXT_PLAIN)
            .body(format!("{}", msg))
            .map_err(Error::from)
            .with_msg(format!(
                "Fail to build notification email from {:?} to {:?}",
                self.from, self.to
            ))
            .with_debug_object_and_fn_name(self.host.clone(), function_path!())
    }

    #[named]
    fn build_transport(&self) -> Result<SmtpTransport> {
        let builder = match self.smtp_mode {
            SmtpMode::Unsecured => Ok(SmtpTransport::builder_dangerous(self.host.as_str())),
            SmtpMode::Ssl => SmtpTransport::relay(self.host.as_str()),
            SmtpMode::StartTls => SmtpTransport::starttls_relay(self.host.as_str()),
        }
        .map_err(Error::from)
        .with_msg(format!(
            "Failed to build smtp client for host: {:?} with mode {:?}",
            self.host, self.smtp_mode
        ))
        .with_debug_object_and_fn_name(self.host.clone(), function_path!())?;

        let builder = match self.port {
            Some(port) => builder.port(port),
            None => builder,
        };
        let builder = match &self.credentials {
            Some(c) => builder.credentials(Credentials::new(
                c.username.clone(),
                c.password.inner().to_string(),
            )),
            None => builder,
        };

        Ok(builder.build())
    }
}

impl Notification for SmtpNotificationConfig {
    #[named]
    fn send<D1: Display, D2: Display>(&self, topic: D1, msg: D2) -> Result<()> {
        tracing::info!(
            "Started smtp email notification from {:?} to {:?}",
            self.from,
            self.to
        );
        let email = self.build_message(topic, msg)?;
        let mailer = self.build_transport()?;

        tracing::debug!("Sending email via {}...", self.host);
        let response = mailer
            .send(&email)
            .map_err(Error::from)
            .with_debug_object_and_fn_name(self.host.clone(), function_path!())?;
        if response.is_positive() {
            Ok(())
        } else {
            Err(Error::SmtpSendError(response.message().join("\n")))
        }
    }
}
