use crate::backup::notifications::smtp::SmtpNotificationConfig;
use crate::backup::result_error::result::Result;
use derive_more::From;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::result;
use tracing::{debug, error};
use validator::{Validate, ValidationErrors};

pub mod smtp;

#[derive(Clone, From, Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum NotificationConfig {
    Smtp(SmtpNotificationConfig),
}

impl Validate for NotificationConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            Self::Smtp(inner) => inner.validate(),
        }
    }
}

impl Notification for NotificationConfig {
    fn send<D1: Display, D2: Display>(&self, topic: D1, msg: D2) -> Result<()> {
        match self {
            Self::Smtp(inner) => inner.send(topic, msg),
        }
    }
}

/// A channel able to deliver one message.
pub trait Notification {
    fn send<D1: Display, D2: Display>(&self, topic: D1, msg: D2) -> Result<()>;
}

/// Lifecycle notifications of a backup run. Never fails.
pub trait Notify {
    fn notify(&self, message: &str);
}

/// Mails every notification through an optional channel.
///
/// Without a channel nothing is sent. Send failures are logged and dropped so
/// a broken relay cannot mask the error being reported.
#[derive(Debug, Clone)]
pub struct Notifier<N = NotificationConfig> {
    channel: Option<N>,
}

impl<N: Notification> Notifier<N> {
    pub fn new(channel: Option<N>) -> Self {
        Self { channel }
    }

    pub fn disabled() -> Self {
        Self { channel: None }
    }

    pub fn body(message: &str) -> String {
        format!("Hi, \n {message} \nYour backup script")
    }
}

impl<N: Notification> Notify for Notifier<N> {
    fn notify(&self, message: &str) {
        let Some(channel) = &self.channel else {
            debug!("No recipients configured, not sending {message:?}");
            return;
        };

        if let Err(e) = channel.send(message, Self::body(message)) {
            error!("Failed to send notification {message:?}: {e}");
        }
    }
}
