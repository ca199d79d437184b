//! In-process fakes for the language model and the chat platform.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::ai::{LanguageModel, OpenAiClient};
use crate::config::OpenAiConfig;
use crate::error::{Error, Result};
use crate::models::ChatMessage;
use crate::telegram::{BotApi, InlineKeyboardMarkup, Invoice, OutgoingMessage};

/// One recorded completion request.
pub type ModelCall = (Vec<ChatMessage>, u32, f32);

/// Language model that answers `reply #<n>` or always fails.
#[derive(Debug, Default)]
pub struct FakeModel {
    calls: Mutex<Vec<ModelCall>>,
    fail: bool,
}

impl FakeModel {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> ModelCall {
        self.calls.lock().unwrap().last().cloned().expect("no calls")
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((messages.to_vec(), max_tokens, temperature));
        if self.fail {
            return Err(Error::LlmApi("model unavailable".to_string()));
        }
        Ok(format!("reply #{}", calls.len()))
    }
}

/// Real client aimed at a port nothing listens on, with a single attempt.
pub fn unreachable_model() -> Arc<OpenAiClient> {
    let config = OpenAiConfig {
        api_key: "sk-test".to_string(),
        base_url: "http://127.0.0.1:1/v1".to_string(),
        max_retries: 1,
        ..OpenAiConfig::default()
    };
    Arc::new(OpenAiClient::from_config(&config).unwrap())
}

/// Something the bot did against the chat platform.
#[derive(Debug, Clone, PartialEq)]
pub enum BotCall {
    Send(OutgoingMessage),
    Delete { chat_id: i64, message_id: i64 },
    AnswerCallback(String),
    EditMarkup { chat_id: i64, message_id: i64 },
    SendInvoice { chat_id: i64, invoice: Invoice },
    InvoiceLink(Invoice),
    PreCheckout { query_id: String, error: Option<String> },
    SetWebhook { url: String, secret: Option<String> },
    DeleteWebhook,
}

/// Chat platform that records calls; optionally fails sends to one chat.
#[derive(Debug, Default)]
pub struct FakeBot {
    calls: Mutex<Vec<BotCall>>,
    next_id: AtomicI64,
    failing_chat: Option<i64>,
}

impl FakeBot {
    pub fn failing_for(chat_id: i64) -> Self {
        Self {
            failing_chat: Some(chat_id),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<BotCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Messages sent, in order.
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BotCall::Send(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Texts sent, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|message| message.text).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: BotCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BotApi for FakeBot {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<i64> {
        if self.failing_chat == Some(message.chat_id) {
            return Err(Error::telegram("sendMessage", "Forbidden: bot was blocked by the user"));
        }
        self.record(BotCall::Send(message.clone()));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        self.record(BotCall::Delete {
            chat_id,
            message_id,
        });
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        self.record(BotCall::AnswerCallback(callback_query_id.to_string()));
        Ok(())
    }

    async fn edit_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        _keyboard: &InlineKeyboardMarkup,
    ) -> Result<()> {
        self.record(BotCall::EditMarkup {
            chat_id,
            message_id,
        });
        Ok(())
    }

    async fn send_invoice(&self, chat_id: i64, invoice: &Invoice) -> Result<()> {
        self.record(BotCall::SendInvoice {
            chat_id,
            invoice: invoice.clone(),
        });
        Ok(())
    }

    async fn create_invoice_link(&self, invoice: &Invoice) -> Result<String> {
        self.record(BotCall::InvoiceLink(invoice.clone()));
        Ok(format!("https://t.me/$invoice-{}", invoice.payload))
    }

    async fn answer_pre_checkout_query(
        &self,
        query_id: &str,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.record(BotCall::PreCheckout {
            query_id: query_id.to_string(),
            error: error_message.map(str::to_string),
        });
        Ok(())
    }

    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        self.record(BotCall::SetWebhook {
            url: url.to_string(),
            secret: secret_token.map(str::to_string),
        });
        Ok(())
    }

    async fn delete_webhook(&self) -> Result<()> {
        self.record(BotCall::DeleteWebhook);
        Ok(())
    }
}
