//! Domain records stored per user.
//!
//! Every rule that depends on the clock takes `now` or `today` as an argument
//! so callers decide what time it is.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::numerology::CompatibilityScores;

/// Currency of all payments (Telegram Stars).
pub const CURRENCY: &str = "XTR";

/// Notification time given to new users.
pub const DEFAULT_NOTIFICATION_TIME: &str = "08:00";

/// Length of the compatibility usage window in days.
const COMPATIBILITY_WINDOW_DAYS: i64 = 7;

/// Interface language of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Russian.
    #[default]
    Ru,
    /// English.
    En,
}

impl Language {
    /// Pick a language from a client language code such as `uk` or `en-US`.
    #[must_use]
    pub fn from_language_code(code: Option<&str>) -> Self {
        match code {
            Some("ru" | "uk" | "be") => Self::Ru,
            _ => Self::En,
        }
    }

    /// Get the language code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ru" => Ok(Self::Ru),
            "en" => Ok(Self::En),
            other => Err(Error::invalid_input(format!("unsupported language: {other}"))),
        }
    }
}

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    /// No subscription.
    #[default]
    Free,
    /// Unlimited questions and compatibility checks.
    Lite,
    /// LITE plus every premium report.
    Pro,
}

impl SubscriptionType {
    /// Get the tier name used in storage and the API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Lite => "lite",
            Self::Pro => "pro",
        }
    }

    /// Get the tier name shown to users.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Lite => "LITE",
            Self::Pro => "PRO",
        }
    }
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// When the payment was received.
    pub date: DateTime<Utc>,
    /// Invoice payload, e.g. `subscription_pro` or `report_full_portrait`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Amount in Telegram Stars.
    pub amount: u32,
    /// Currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    CURRENCY.to_string()
}

fn default_notification_time() -> String {
    DEFAULT_NOTIFICATION_TIME.to_string()
}

fn default_true() -> bool {
    true
}

/// A bot user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Telegram user id.
    pub telegram_id: i64,
    /// Name given during onboarding.
    #[serde(default)]
    pub name: Option<String>,
    /// Birth date given during onboarding.
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    /// Interface language.
    #[serde(default)]
    pub language: Language,
    /// When the user first started the bot.
    pub created_at: DateTime<Utc>,

    /// Current subscription tier.
    #[serde(default)]
    pub subscription_type: SubscriptionType,
    /// When the current subscription ends.
    #[serde(default)]
    pub subscription_expires: Option<DateTime<Utc>>,

    /// Questions asked on `questions_today_reset`.
    #[serde(default)]
    pub questions_today: u32,
    /// Day the question counter belongs to.
    #[serde(default)]
    pub questions_today_reset: Option<NaiveDate>,
    /// Extra questions earned through referrals.
    #[serde(default)]
    pub questions_bonus: u32,
    /// Compatibility checks in the current window.
    #[serde(default)]
    pub compatibility_this_week: u32,
    /// First day of the current compatibility window.
    #[serde(default)]
    pub compatibility_week_reset: Option<NaiveDate>,

    /// Code shared in invite links.
    #[serde(default)]
    pub referral_code: String,
    /// Id of the user who invited this one.
    #[serde(default)]
    pub referred_by: Option<i64>,
    /// Number of users invited.
    #[serde(default)]
    pub referrals_count: u32,

    /// Report ids bought one by one or granted as a bonus.
    #[serde(default)]
    pub purchased_reports: Vec<String>,
    /// All payments, oldest first.
    #[serde(default)]
    pub payment_history: Vec<Payment>,

    /// Whether the daily forecast is sent.
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    /// Local delivery time of the daily forecast, `HH:MM`.
    #[serde(default = "default_notification_time")]
    pub notification_time: String,
}

impl User {
    /// Create a fresh free-tier user.
    #[must_use]
    pub fn new(telegram_id: i64, language: Language, now: DateTime<Utc>) -> Self {
        Self {
            telegram_id,
            name: None,
            birth_date: None,
            language,
            created_at: now,
            subscription_type: SubscriptionType::Free,
            subscription_expires: None,
            questions_today: 0,
            questions_today_reset: None,
            questions_bonus: 0,
            compatibility_this_week: 0,
            compatibility_week_reset: None,
            referral_code: String::new(),
            referred_by: None,
            referrals_count: 0,
            purchased_reports: Vec::new(),
            payment_history: Vec::new(),
            notifications_enabled: true,
            notification_time: default_notification_time(),
        }
    }

    /// Whether a paid subscription is active at `now`.
    #[must_use]
    pub fn is_premium(&self, now: DateTime<Utc>) -> bool {
        self.subscription_type != SubscriptionType::Free
            && self.subscription_expires.is_some_and(|expires| now < expires)
    }

    /// Whether an active PRO subscription is held at `now`.
    #[must_use]
    pub fn is_pro(&self, now: DateTime<Utc>) -> bool {
        self.subscription_type == SubscriptionType::Pro && self.is_premium(now)
    }

    /// Questions counted against the daily limit on `today`.
    #[must_use]
    pub fn questions_used(&self, today: NaiveDate) -> u32 {
        if self.questions_today_reset == Some(today) {
            self.questions_today
        } else {
            0
        }
    }

    /// Compatibility checks counted against the weekly limit on `today`.
    #[must_use]
    pub fn compatibility_used(&self, today: NaiveDate) -> u32 {
        match self.compatibility_week_reset {
            Some(start) if (today - start).num_days() < COMPATIBILITY_WINDOW_DAYS => {
                self.compatibility_this_week
            }
            _ => 0,
        }
    }

    /// Whether another question may be asked.
    #[must_use]
    pub fn can_ask_question(&self, now: DateTime<Utc>, daily_limit: u32) -> bool {
        self.is_premium(now)
            || self.questions_bonus > 0
            || self.questions_used(now.date_naive()) < daily_limit
    }

    /// Whether another compatibility check may be run.
    #[must_use]
    pub fn can_check_compatibility(&self, now: DateTime<Utc>, weekly_limit: u32) -> bool {
        self.is_premium(now) || self.compatibility_used(now.date_naive()) < weekly_limit
    }

    /// Whether the user may read and generate the given report.
    #[must_use]
    pub fn has_report(&self, report_id: &str, now: DateTime<Utc>) -> bool {
        self.is_pro(now) || self.purchased_reports.iter().any(|r| r == report_id)
    }

    /// Whether both name and birth date are known.
    #[must_use]
    pub fn is_onboarded(&self) -> bool {
        self.name.is_some() && self.birth_date.is_some()
    }

    /// Name and birth date, when onboarded.
    #[must_use]
    pub fn identity(&self) -> Option<(&str, NaiveDate)> {
        match (&self.name, self.birth_date) {
            (Some(name), Some(date)) => Some((name.as_str(), date)),
            _ => None,
        }
    }

    /// Count one question, spending a bonus question first.
    pub fn record_question(&mut self, today: NaiveDate) {
        if self.questions_today_reset != Some(today) {
            self.questions_today = 0;
            self.questions_today_reset = Some(today);
        }

        if self.questions_bonus > 0 {
            self.questions_bonus -= 1;
        } else {
            self.questions_today += 1;
        }
    }

    /// Count one compatibility check, opening a new window when needed.
    pub fn record_compatibility(&mut self, today: NaiveDate) {
        let expired = self
            .compatibility_week_reset
            .map_or(true, |start| (today - start).num_days() >= COMPATIBILITY_WINDOW_DAYS);
        if expired {
            self.compatibility_this_week = 0;
            self.compatibility_week_reset = Some(today);
        }
        self.compatibility_this_week += 1;
    }

    /// Start or extend a subscription by `days`.
    pub fn activate_subscription(
        &mut self,
        kind: SubscriptionType,
        now: DateTime<Utc>,
        days: u32,
    ) {
        let start = match self.subscription_expires {
            Some(expires) if expires > now => expires,
            _ => now,
        };
        self.subscription_type = kind;
        self.subscription_expires = Some(start + Duration::days(i64::from(days)));
    }

    /// Questions left today for a free user.
    #[must_use]
    pub fn remaining_questions(&self, today: NaiveDate, daily_limit: u32) -> u32 {
        (daily_limit + self.questions_bonus).saturating_sub(self.questions_used(today))
    }

    /// Append a payment to the history.
    pub fn add_payment(&mut self, kind: impl Into<String>, amount: u32, now: DateTime<Utc>) {
        self.payment_history.push(Payment {
            date: now,
            kind: kind.into(),
            amount,
            currency: default_currency(),
        });
    }

    /// Grant a report. Returns `false` when it was already owned.
    pub fn add_purchased_report(&mut self, report_id: &str) -> bool {
        if self.purchased_reports.iter().any(|r| r == report_id) {
            return false;
        }
        self.purchased_reports.push(report_id.to_string());
        true
    }
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the language model.
    System,
    /// The person chatting with the bot.
    User,
    /// The bot.
    Assistant,
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A generated report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    /// Report text.
    pub content: String,
    /// When it was generated.
    pub created_at: DateTime<Utc>,
    /// Instance id for reports that may be generated many times.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    /// Parameters the report was generated with.
    #[serde(default)]
    pub context: serde_json::Value,
}

/// A stored compatibility check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityRecord {
    /// Result id.
    pub id: String,
    /// Birth date of the partner.
    pub partner_date: NaiveDate,
    /// Calculated scores.
    pub scores: CompatibilityScores,
    /// Cached language model analysis.
    #[serde(default)]
    pub ai_interpretation: Option<String>,
    /// When the check was made.
    pub created_at: DateTime<Utc>,
}

/// Pending input the bot expects from a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    /// Onboarding: waiting for the user's name.
    AwaitingName,
    /// Onboarding: waiting for the birth date.
    AwaitingBirthDate {
        /// Name given in the previous step.
        name: String,
    },
    /// Waiting for a partner's birth date.
    AwaitingPartnerDate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        now().date_naive()
    }

    fn user() -> User {
        User::new(42, Language::Ru, now())
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_language_code(Some("ru")), Language::Ru);
        assert_eq!(Language::from_language_code(Some("uk")), Language::Ru);
        assert_eq!(Language::from_language_code(Some("be")), Language::Ru);
        assert_eq!(Language::from_language_code(Some("de")), Language::En);
        assert_eq!(Language::from_language_code(None), Language::En);
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("en".parse::<Language>().unwrap(), Language::En);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_premium_requires_future_expiry() {
        let mut user = user();
        assert!(!user.is_premium(now()));

        user.subscription_type = SubscriptionType::Lite;
        assert!(!user.is_premium(now()));

        user.subscription_expires = Some(now() + Duration::days(1));
        assert!(user.is_premium(now()));
        assert!(!user.is_pro(now()));

        user.subscription_expires = Some(now() - Duration::seconds(1));
        assert!(!user.is_premium(now()));
    }

    #[test]
    fn test_question_limit() {
        let mut user = user();
        for _ in 0..3 {
            assert!(user.can_ask_question(now(), 3));
            user.record_question(today());
        }
        assert!(!user.can_ask_question(now(), 3));
        assert_eq!(user.remaining_questions(today(), 3), 0);
    }

    #[test]
    fn test_question_counter_resets_next_day() {
        let mut user = user();
        user.record_question(today());
        user.record_question(today());

        let tomorrow = today().succ_opt().unwrap();
        assert_eq!(user.questions_used(tomorrow), 0);

        user.record_question(tomorrow);
        assert_eq!(user.questions_today, 1);
        assert_eq!(user.questions_today_reset, Some(tomorrow));
    }

    #[test]
    fn test_bonus_questions_spent_first() {
        let mut user = user();
        user.questions_bonus = 2;
        user.record_question(today());

        assert_eq!(user.questions_bonus, 1);
        assert_eq!(user.questions_today, 0);
        assert_eq!(user.remaining_questions(today(), 3), 4);
    }

    #[test]
    fn test_bonus_allows_question_over_limit() {
        let mut user = user();
        user.questions_today = 3;
        user.questions_today_reset = Some(today());
        assert!(!user.can_ask_question(now(), 3));

        user.questions_bonus = 1;
        assert!(user.can_ask_question(now(), 3));
    }

    #[test]
    fn test_compatibility_window() {
        let mut user = user();
        user.record_compatibility(today());
        user.record_compatibility(today());
        assert!(!user.can_check_compatibility(now(), 2));

        let six_days = today() + Duration::days(6);
        assert_eq!(user.compatibility_used(six_days), 2);

        let week_later = today() + Duration::days(7);
        assert_eq!(user.compatibility_used(week_later), 0);

        user.record_compatibility(week_later);
        assert_eq!(user.compatibility_this_week, 1);
        assert_eq!(user.compatibility_week_reset, Some(week_later));
    }

    #[test]
    fn test_activate_subscription_extends_renewal() {
        let mut user = user();
        user.activate_subscription(SubscriptionType::Lite, now(), 30);
        assert_eq!(user.subscription_expires, Some(now() + Duration::days(30)));

        user.activate_subscription(SubscriptionType::Pro, now(), 30);
        assert_eq!(user.subscription_type, SubscriptionType::Pro);
        assert_eq!(user.subscription_expires, Some(now() + Duration::days(60)));
    }

    #[test]
    fn test_activate_after_expiry_starts_now() {
        let mut user = user();
        user.subscription_type = SubscriptionType::Lite;
        user.subscription_expires = Some(now() - Duration::days(3));

        user.activate_subscription(SubscriptionType::Lite, now(), 30);
        assert_eq!(user.subscription_expires, Some(now() + Duration::days(30)));
    }

    #[test]
    fn test_has_report() {
        let mut user = user();
        assert!(!user.has_report("full_portrait", now()));

        assert!(user.add_purchased_report("full_portrait"));
        assert!(!user.add_purchased_report("full_portrait"));
        assert!(user.has_report("full_portrait", now()));
        assert!(!user.has_report("financial_code", now()));

        user.activate_subscription(SubscriptionType::Pro, now(), 30);
        assert!(user.has_report("financial_code", now()));
    }

    #[test]
    fn test_onboarding() {
        let mut user = user();
        assert!(!user.is_onboarded());
        assert!(user.identity().is_none());

        user.name = Some("Anna".to_string());
        user.birth_date = NaiveDate::from_ymd_opt(1990, 3, 15);
        assert!(user.is_onboarded());
        assert_eq!(user.identity().unwrap().0, "Anna");
    }

    #[test]
    fn test_user_deserializes_with_defaults() {
        let json = r#"{"telegram_id": 7, "created_at": "2025-01-01T00:00:00Z"}"#;
        let user: User = serde_json::from_str(json).unwrap();

        assert_eq!(user.language, Language::Ru);
        assert_eq!(user.subscription_type, SubscriptionType::Free);
        assert!(user.notifications_enabled);
        assert_eq!(user.notification_time, "08:00");
    }

    #[test]
    fn test_payment_serializes_type_field() {
        let mut user = user();
        user.add_payment("subscription_pro", 500, now());

        let json = serde_json::to_value(&user.payment_history[0]).unwrap();
        assert_eq!(json["type"], "subscription_pro");
        assert_eq!(json["currency"], "XTR");
    }

    #[test]
    fn test_flow_state_serialization() {
        let state = FlowState::AwaitingBirthDate {
            name: "Anna".to_string(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"state":"awaiting_birth_date","name":"Anna"}"#);

        let back: FlowState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
