//! The notification half of firing an alarm.

use anyhow::Result;

use crate::io::dbus::{NotificationClient, URGENCY_CRITICAL, URGENCY_NORMAL};

#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str, urgent: bool) -> Result<()>;
}

/// Posts to the desktop notification server.
pub struct DbusNotifier {
    client: NotificationClient,
}

impl DbusNotifier {
    pub fn connect() -> Result<Self> {
        Ok(Self {
            client: NotificationClient::connect()?,
        })
    }
}

impl Notifier for DbusNotifier {
    fn notify(&self, title: &str, body: &str, urgent: bool) -> Result<()> {
        let urgency = if urgent { URGENCY_CRITICAL } else { URGENCY_NORMAL };
        self.client.send(title, body, urgency)?;
        Ok(())
    }
}

/// Writes the notification to the log. Used headless or when no session bus exists.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str, _urgent: bool) -> Result<()> {
        log_block_start!("{}", title);
        log_indented!("{}", body);
        Ok(())
    }
}

/// D-Bus when available, otherwise the log.
pub fn default_notifier() -> Box<dyn Notifier> {
    match DbusNotifier::connect() {
        Ok(notifier) => Box::new(notifier),
        Err(e) => {
            log_debug!("Desktop notifications unavailable ({}), logging instead", e);
            Box::new(LogNotifier)
        }
    }
}
