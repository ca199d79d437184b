//! The subset of Bot API objects the bot reads and writes.

use serde::{Deserialize, Serialize};

/// An incoming update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Update id.
    pub update_id: i64,
    /// New message.
    #[serde(default)]
    pub message: Option<Message>,
    /// Inline button press.
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    /// Payment confirmation request.
    #[serde(default)]
    pub pre_checkout_query: Option<PreCheckoutQuery>,
}

/// A Telegram account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramUser {
    /// User id.
    pub id: i64,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Username without `@`.
    #[serde(default)]
    pub username: Option<String>,
    /// IETF language tag of the client.
    #[serde(default)]
    pub language_code: Option<String>,
}

/// A chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Chat id.
    pub id: i64,
}

/// A message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id within the chat.
    pub message_id: i64,
    /// Sender.
    #[serde(default)]
    pub from: Option<TelegramUser>,
    /// Chat the message belongs to.
    pub chat: Chat,
    /// Text of a text message.
    #[serde(default)]
    pub text: Option<String>,
    /// Present on service messages about a completed payment.
    #[serde(default)]
    pub successful_payment: Option<SuccessfulPayment>,
}

/// Press of an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Query id, to be answered.
    pub id: String,
    /// Who pressed the button.
    pub from: TelegramUser,
    /// Message carrying the keyboard.
    #[serde(default)]
    pub message: Option<Message>,
    /// Button data.
    #[serde(default)]
    pub data: Option<String>,
}

/// Request to confirm a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreCheckoutQuery {
    /// Query id, to be answered.
    pub id: String,
    /// Buyer.
    pub from: TelegramUser,
    /// Currency code.
    pub currency: String,
    /// Total price.
    pub total_amount: u32,
    /// Payload of the invoice.
    pub invoice_payload: String,
}

/// A completed payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessfulPayment {
    /// Currency code.
    pub currency: String,
    /// Total price.
    pub total_amount: u32,
    /// Payload of the invoice.
    pub invoice_payload: String,
    /// Telegram's charge id.
    #[serde(default)]
    pub telegram_payment_charge_id: String,
}

/// Inline keyboard attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    /// Rows of buttons.
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// Keyboard with one button per row.
    #[must_use]
    pub fn single_column(buttons: Vec<InlineKeyboardButton>) -> Self {
        Self {
            inline_keyboard: buttons.into_iter().map(|button| vec![button]).collect(),
        }
    }
}

/// A button of an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    /// Label.
    pub text: String,
    /// Data sent back in a callback query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    /// Mini-app opened by the button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_app: Option<WebAppInfo>,
}

impl InlineKeyboardButton {
    /// Button that sends `data` back to the bot.
    #[must_use]
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            web_app: None,
        }
    }

    /// Button that opens the mini-app at `url`.
    #[must_use]
    pub fn web_app(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            web_app: Some(WebAppInfo { url: url.into() }),
        }
    }
}

/// Mini-app reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAppInfo {
    /// Mini-app URL.
    pub url: String,
}

/// Text formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    /// Legacy Markdown.
    Markdown,
}

/// Parameters of `sendMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    /// Target chat.
    pub chat_id: i64,
    /// Text.
    pub text: String,
    /// Formatting of `text`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    /// Attached keyboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl OutgoingMessage {
    /// Plain text message.
    #[must_use]
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: None,
            reply_markup: None,
        }
    }

    /// Format the text as Markdown.
    #[must_use]
    pub fn markdown(mut self) -> Self {
        self.parse_mode = Some(ParseMode::Markdown);
        self
    }

    /// Attach a keyboard.
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.reply_markup = Some(keyboard);
        self
    }
}

/// A price line of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledPrice {
    /// Line label.
    pub label: String,
    /// Amount in the smallest currency unit (Stars are whole).
    pub amount: u32,
}

/// Invoice content shared by `sendInvoice` and `createInvoiceLink`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    /// Product title.
    pub title: String,
    /// Product description.
    pub description: String,
    /// Payload echoed back in the payment.
    pub payload: String,
    /// Currency code.
    pub currency: String,
    /// Price lines.
    pub prices: Vec<LabeledPrice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_text_message_update() {
        let json = r#"{
            "update_id": 10,
            "message": {
                "message_id": 5,
                "from": {"id": 42, "is_bot": false, "first_name": "Anna", "language_code": "uk"},
                "chat": {"id": 42, "type": "private"},
                "date": 1700000000,
                "text": "/start ref_ABCD1234"
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let message = update.message.unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.text.as_deref(), Some("/start ref_ABCD1234"));
        assert_eq!(message.from.unwrap().language_code.as_deref(), Some("uk"));
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn test_deserialize_payment_update() {
        let json = r#"{
            "update_id": 11,
            "message": {
                "message_id": 6,
                "from": {"id": 42, "first_name": "Anna"},
                "chat": {"id": 42},
                "successful_payment": {
                    "currency": "XTR",
                    "total_amount": 500,
                    "invoice_payload": "subscription_pro",
                    "telegram_payment_charge_id": "ch_1"
                }
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let payment = update.message.unwrap().successful_payment.unwrap();
        assert_eq!(payment.total_amount, 500);
        assert_eq!(payment.invoice_payload, "subscription_pro");
    }

    #[test]
    fn test_keyboard_serialization_skips_empty_fields() {
        let keyboard = InlineKeyboardMarkup::single_column(vec![
            InlineKeyboardButton::callback("Profile", "profile"),
            InlineKeyboardButton::web_app("Settings", "https://example.com/app"),
        ]);
        let json = serde_json::to_value(&keyboard).unwrap();

        assert_eq!(json["inline_keyboard"][0][0]["callback_data"], "profile");
        assert!(json["inline_keyboard"][0][0].get("web_app").is_none());
        assert_eq!(
            json["inline_keyboard"][1][0]["web_app"]["url"],
            "https://example.com/app"
        );
    }

    #[test]
    fn test_outgoing_message_serialization() {
        let plain = serde_json::to_value(OutgoingMessage::new(1, "hi")).unwrap();
        assert!(plain.get("parse_mode").is_none());

        let markdown = serde_json::to_value(OutgoingMessage::new(1, "*hi*").markdown()).unwrap();
        assert_eq!(markdown["parse_mode"], "Markdown");
    }
}
