//! Daily forecast delivery.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::Interpreter;
use crate::bot::texts::Text;
use crate::error::Result;
use crate::models::User;
use crate::numerology;
use crate::storage::Storage;
use crate::telegram::{BotApi, OutgoingMessage};

/// Outcome of one delivery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotificationSummary {
    /// Hour the run was for.
    pub hour: u32,
    /// Forecasts delivered.
    pub sent: usize,
    /// Users the forecast could not be delivered to.
    pub failed: usize,
}

/// Sends daily forecasts to subscribed users.
#[derive(Clone)]
pub struct Notifier {
    storage: Arc<Storage>,
    api: Arc<dyn BotApi>,
    interpreter: Interpreter,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    /// Create a notifier.
    #[must_use]
    pub fn new(storage: Arc<Storage>, api: Arc<dyn BotApi>, interpreter: Interpreter) -> Self {
        Self {
            storage,
            api,
            interpreter,
        }
    }

    /// Send the forecast to every user whose delivery time falls in `hour`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the user list cannot be read. Per-user
    /// failures are logged and counted.
    pub async fn send_daily_forecasts(
        &self,
        hour: u32,
        now: DateTime<Utc>,
    ) -> Result<NotificationSummary> {
        let users = self.storage.users_for_notifications(hour)?;
        info!("Sending daily forecasts for {:02}:00 to {} users", hour, users.len());

        let mut summary = NotificationSummary {
            hour,
            sent: 0,
            failed: 0,
        };
        for user in &users {
            match self.send_forecast(user, now).await {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    warn!("Daily forecast for {} failed: {}", user.telegram_id, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Daily forecasts for {:02}:00: {} sent, {} failed",
            hour, summary.sent, summary.failed
        );
        Ok(summary)
    }

    async fn send_forecast(&self, user: &User, now: DateTime<Utc>) -> Result<()> {
        let Some((name, birth_date)) = user.identity() else {
            return Ok(());
        };
        let language = user.language;
        let profile = numerology::full_profile(name, birth_date, now.date_naive());
        let forecast = self
            .interpreter
            .daily_forecast(name, &profile, language)
            .await?;

        let header = Text::DailyNotificationHeader.render(language, &[("name", name)]);
        let message = OutgoingMessage::new(user.telegram_id, format!("{header}\n\n{forecast}"));
        self.api.send_message(&message.markdown()).await?;
        debug!("Daily forecast sent to {}", user.telegram_id);
        Ok(())
    }
}
