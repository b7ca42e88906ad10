//! Desktop notifications over the session bus.
//!
//! Uses zbus's blocking API against the freedesktop notification interface; any
//! notification daemon (mako, dunst, swaync, GNOME Shell, ...) implements it.

use anyhow::{Context, Result};
use std::collections::HashMap;
use zbus::blocking::Connection;
use zbus::zvariant::Value;

use crate::constants::APP_NAME;

/// Urgency hint values defined by freedesktop notifications.
pub const URGENCY_NORMAL: u8 = 1;
pub const URGENCY_CRITICAL: u8 = 2;

/// D-Bus proxy trait for the freedesktop Notifications interface.
#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    /// Show a notification and return its server-side id.
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: &HashMap<&str, &Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;
}

/// A session bus connection able to post notifications.
pub struct NotificationClient {
    connection: Connection,
}

impl NotificationClient {
    pub fn connect() -> Result<Self> {
        let connection = Connection::session().context("Failed to connect to session D-Bus")?;
        Ok(Self { connection })
    }

    /// Post a notification. `expire_timeout` of -1 lets the server decide.
    pub fn send(&self, summary: &str, body: &str, urgency: u8) -> Result<u32> {
        let proxy = NotificationsProxyBlocking::new(&self.connection)
            .context("Failed to create notifications proxy")?;

        let urgency = Value::from(urgency);
        let hints = HashMap::from([("urgency", &urgency)]);

        proxy
            .notify(APP_NAME, 0, "alarm-clock", summary, body, &[], &hints, -1)
            .context("Notification server rejected the notification")
    }
}
