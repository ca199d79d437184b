//! Telegram Bot API client.
//!
//! Only the calls the bot makes are covered. Handlers talk to the
//! [`BotApi`] trait so they can run against a fake in tests.

mod types;

pub use types::{
    CallbackQuery, Chat, InlineKeyboardButton, InlineKeyboardMarkup, Invoice, LabeledPrice,
    Message, OutgoingMessage, ParseMode, PreCheckoutQuery, SuccessfulPayment, TelegramUser,
    Update, WebAppInfo,
};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Calls the bot makes against the chat platform.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Send a text message; returns the new message id.
    async fn send_message(&self, message: &OutgoingMessage) -> Result<i64>;

    /// Delete a message.
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()>;

    /// Stop the loading indicator of a button press.
    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()>;

    /// Replace the keyboard attached to a message.
    async fn edit_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<()>;

    /// Send an invoice into a chat.
    async fn send_invoice(&self, chat_id: i64, invoice: &Invoice) -> Result<()>;

    /// Create a payment link for an invoice.
    async fn create_invoice_link(&self, invoice: &Invoice) -> Result<String>;

    /// Approve (`error_message == None`) or reject a checkout.
    async fn answer_pre_checkout_query(
        &self,
        query_id: &str,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Point update delivery at `url`.
    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()>;

    /// Stop webhook delivery.
    async fn delete_webhook(&self) -> Result<()>;
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// [`BotApi`] over HTTPS.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The base URL embeds the token.
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the bot token is missing or the HTTP client cannot be built.
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        if config.bot_token.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "telegram.bot_token is not set".to_string(),
            });
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }

    async fn call<P, R>(&self, method: &'static str, params: &P) -> Result<R>
    where
        P: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        debug!("Telegram call {}", method);
        // Failed calls come back as 4xx with the same envelope.
        let response: ApiResponse<R> = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(params)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(Error::telegram(
                method,
                response
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            ));
        }
        response
            .result
            .ok_or_else(|| Error::telegram(method, "response without result"))
    }
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<i64> {
        let sent: SentMessage = self.call("sendMessage", message).await?;
        Ok(sent.message_id)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                &json!({"chat_id": chat_id, "message_id": message_id}),
            )
            .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &json!({"callback_query_id": callback_query_id}),
            )
            .await?;
        Ok(())
    }

    async fn edit_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "editMessageReplyMarkup",
                &json!({"chat_id": chat_id, "message_id": message_id, "reply_markup": keyboard}),
            )
            .await?;
        Ok(())
    }

    async fn send_invoice(&self, chat_id: i64, invoice: &Invoice) -> Result<()> {
        let mut params = serde_json::to_value(invoice)?;
        params["chat_id"] = json!(chat_id);
        let _: serde_json::Value = self.call("sendInvoice", &params).await?;
        Ok(())
    }

    async fn create_invoice_link(&self, invoice: &Invoice) -> Result<String> {
        self.call("createInvoiceLink", invoice).await
    }

    async fn answer_pre_checkout_query(
        &self,
        query_id: &str,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut params = json!({"pre_checkout_query_id": query_id, "ok": error_message.is_none()});
        if let Some(message) = error_message {
            params["error_message"] = json!(message);
        }
        let _: bool = self.call("answerPreCheckoutQuery", &params).await?;
        Ok(())
    }

    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let mut params = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query", "pre_checkout_query"],
        });
        if let Some(secret) = secret_token {
            params["secret_token"] = json!(secret);
        }
        let _: bool = self.call("setWebhook", &params).await?;
        Ok(())
    }

    async fn delete_webhook(&self) -> Result<()> {
        let _: bool = self.call("deleteWebhook", &json!({})).await?;
        Ok(())
    }
}
