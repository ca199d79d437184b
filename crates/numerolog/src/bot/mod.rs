//! Conversation handling.
//!
//! Every update is handled statelessly: the pending input flow of a user
//! lives in storage, so any process can pick up the next message.
//!
//! Messages are dispatched in this order: successful payment, command,
//! pending flow state, free-text question.

pub(crate) mod keyboards;
pub(crate) mod texts;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::ai::Interpreter;
use crate::catalog::{Product, PROFILE_INTERPRETATION};
use crate::config::Config;
use crate::error::Result;
use crate::models::{ChatMessage, FlowState, Language, SubscriptionType, User};
use crate::numerology;
use crate::storage::Storage;
use crate::telegram::{
    BotApi, CallbackQuery, InlineKeyboardMarkup, Message, OutgoingMessage, PreCheckoutQuery,
    SuccessfulPayment, TelegramUser, Update,
};

use keyboards::callback;
use texts::Text;

/// Longest name kept from onboarding.
const MAX_NAME_CHARS: usize = 64;

/// Bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Profile,
    Today,
    Compatibility,
    Buy,
    Invite,
    Help,
    Settings,
}

/// Split `/command@bot args` into a known command and its arguments.
fn parse_command(text: &str) -> Option<(Command, &str)> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (word, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let name = word.split('@').next().unwrap_or(word);
    let command = match name.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "profile" => Command::Profile,
        "today" => Command::Today,
        "compatibility" => Command::Compatibility,
        "buy" => Command::Buy,
        "invite" => Command::Invite,
        "help" => Command::Help,
        "settings" => Command::Settings,
        _ => return None,
    };
    Some((command, args.trim()))
}

fn identity(user: &User) -> Option<(String, NaiveDate)> {
    user.identity().map(|(name, date)| (name.to_string(), date))
}

/// Handles chat platform updates.
#[derive(Clone)]
pub struct Bot {
    config: Arc<Config>,
    storage: Arc<Storage>,
    api: Arc<dyn BotApi>,
    interpreter: Interpreter,
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl Bot {
    /// Create a bot.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        storage: Arc<Storage>,
        api: Arc<dyn BotApi>,
        interpreter: Interpreter,
    ) -> Self {
        Self {
            config,
            storage,
            api,
            interpreter,
        }
    }

    /// Handle one update.
    ///
    /// # Errors
    ///
    /// Returns an error if storage or the chat platform fails. Language
    /// model failures are reported to the user instead.
    pub async fn handle_update(&self, update: &Update, now: DateTime<Utc>) -> Result<()> {
        if let Some(query) = &update.pre_checkout_query {
            return self.pre_checkout(query).await;
        }
        if let Some(query) = &update.callback_query {
            return self.handle_callback(query, now).await;
        }
        if let Some(message) = &update.message {
            return self.handle_message(message, now).await;
        }
        debug!("Ignoring update {}", update.update_id);
        Ok(())
    }

    async fn handle_message(&self, message: &Message, now: DateTime<Utc>) -> Result<()> {
        let Some(from) = &message.from else {
            return Ok(());
        };
        let chat_id = message.chat.id;

        if let Some(payment) = &message.successful_payment {
            return self.successful_payment(from, chat_id, payment, now).await;
        }
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };

        if let Some((command, args)) = parse_command(text) {
            debug!("Command {:?} from {}", command, from.id);
            return match command {
                Command::Start => self.start(from, chat_id, args, now).await,
                Command::Profile => self.profile(from, chat_id, now).await,
                Command::Today => self.today(from, chat_id, now).await,
                Command::Compatibility => self.compatibility(from, chat_id, now).await,
                Command::Buy => self.buy(from, chat_id).await,
                Command::Invite => self.invite(from, chat_id).await,
                Command::Help => self.help(from, chat_id).await,
                Command::Settings => self.settings(from, chat_id).await,
            };
        }

        match self.storage.get_flow_state(from.id)? {
            Some(FlowState::AwaitingName) => self.process_name(from, chat_id, text).await,
            Some(FlowState::AwaitingBirthDate { name }) => {
                self.process_birth_date(from, chat_id, &name, text, now)
                    .await
            }
            Some(FlowState::AwaitingPartnerDate) => {
                self.process_partner_date(from, chat_id, text, now).await
            }
            None => self.question(from, chat_id, text, now).await,
        }
    }

    async fn handle_callback(&self, query: &CallbackQuery, now: DateTime<Utc>) -> Result<()> {
        let from = &query.from;
        let chat_id = query
            .message
            .as_ref()
            .map_or(from.id, |message| message.chat.id);

        let result = match query.data.as_deref().unwrap_or_default() {
            callback::PROFILE => self.profile(from, chat_id, now).await,
            callback::TODAY => self.today(from, chat_id, now).await,
            callback::COMPATIBILITY => self.compatibility(from, chat_id, now).await,
            callback::BUY => self.buy(from, chat_id).await,
            callback::BUY_LITE => self.send_plan_invoice(from, chat_id, SubscriptionType::Lite).await,
            callback::BUY_PRO => self.send_plan_invoice(from, chat_id, SubscriptionType::Pro).await,
            callback::MENU => self.restore_menu(from, query.message.as_ref()).await,
            other => {
                debug!("Unknown callback data {:?} from {}", other, from.id);
                Ok(())
            }
        };

        // The button keeps spinning until answered, whatever happened.
        if let Err(e) = self.api.answer_callback_query(&query.id).await {
            warn!("Failed to answer callback query {}: {}", query.id, e);
        }
        result
    }

    // === Helpers ===

    async fn send(&self, message: OutgoingMessage) -> Result<i64> {
        self.api.send_message(&message).await
    }

    async fn say(&self, chat_id: i64, text: impl Into<String>) -> Result<i64> {
        self.send(OutgoingMessage::new(chat_id, text)).await
    }

    fn main_menu(&self, language: Language) -> InlineKeyboardMarkup {
        keyboards::main_menu(language, &self.config.telegram.webapp_url)
    }

    fn plans_keyboard(&self, language: Language) -> InlineKeyboardMarkup {
        keyboards::plans(language, &self.config.pricing)
    }

    /// Stored language, or the one detected from the client.
    fn language_of(&self, from: &TelegramUser) -> Result<Language> {
        Ok(self.storage.get_user(from.id)?.map_or_else(
            || Language::from_language_code(from.language_code.as_deref()),
            |user| user.language,
        ))
    }

    /// The user, or a "/start first" reply.
    async fn registered_user(&self, from: &TelegramUser, chat_id: i64) -> Result<Option<User>> {
        if let Some(user) = self.storage.get_user(from.id)? {
            return Ok(Some(user));
        }
        let language = Language::from_language_code(from.language_code.as_deref());
        self.say(chat_id, Text::StartFirst.template(language)).await?;
        Ok(None)
    }

    /// The user with name and birth date, or a reply explaining what is missing.
    async fn onboarded_user(
        &self,
        from: &TelegramUser,
        chat_id: i64,
    ) -> Result<Option<(User, String, NaiveDate)>> {
        let Some(user) = self.registered_user(from, chat_id).await? else {
            return Ok(None);
        };
        match identity(&user) {
            Some((name, birth_date)) => Ok(Some((user, name, birth_date))),
            None => {
                self.say(chat_id, Text::OnboardingRequired.template(user.language))
                    .await?;
                Ok(None)
            }
        }
    }

    /// Run a generation behind a "thinking" message.
    ///
    /// Returns `None` after telling the user when the language model failed.
    async fn with_thinking<T, F>(&self, chat_id: i64, language: Language, work: F) -> Result<Option<T>>
    where
        F: Future<Output = Result<T>> + Send,
    {
        let thinking = self
            .say(chat_id, Text::Thinking.template(language))
            .await?;
        let result = work.await;
        if let Err(e) = self.api.delete_message(chat_id, thinking).await {
            warn!("Failed to delete thinking message in {}: {}", chat_id, e);
        }

        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_llm_error() => {
                warn!("Generation failed for chat {}: {}", chat_id, e);
                self.say(chat_id, Text::GenerationFailed.template(language))
                    .await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // === Onboarding ===

    async fn start(
        &self,
        from: &TelegramUser,
        chat_id: i64,
        args: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let existing = self.storage.get_user(from.id)?;
        if let Some(user) = &existing {
            if let Some((name, _)) = user.identity() {
                let text = Text::WelcomeBack.render(user.language, &[("name", name)]);
                self.send(
                    OutgoingMessage::new(chat_id, text).with_keyboard(self.main_menu(user.language)),
                )
                .await?;
                return Ok(());
            }
        }

        let user = match existing {
            Some(user) => user,
            None => {
                let language = Language::from_language_code(from.language_code.as_deref());
                let referrer = self.resolve_referrer(args)?;
                self.storage
                    .create_user(from.id, language, referrer, &self.config.referral, now)?
            }
        };

        self.storage.set_flow_state(from.id, &FlowState::AwaitingName)?;
        self.say(chat_id, Text::Welcome.template(user.language))
            .await?;
        Ok(())
    }

    /// Referrer from a `ref_<code>` or legacy `ref_<id>` start parameter.
    fn resolve_referrer(&self, args: &str) -> Result<Option<i64>> {
        let Some(token) = args
            .split_whitespace()
            .next()
            .and_then(|arg| arg.strip_prefix("ref_"))
        else {
            return Ok(None);
        };

        // Codes are hex and may be all digits, so an id must belong to someone.
        if let Ok(id) = token.parse::<i64>() {
            if self.storage.get_user(id)?.is_some() {
                return Ok(Some(id));
            }
        }
        Ok(self
            .storage
            .find_user_by_referral_code(token)?
            .map(|user| user.telegram_id))
    }

    async fn process_name(&self, from: &TelegramUser, chat_id: i64, text: &str) -> Result<()> {
        let language = self.language_of(from)?;
        let name: String = text.trim().chars().take(MAX_NAME_CHARS).collect();
        if name.is_empty() {
            self.say(chat_id, Text::EmptyName.template(language))
                .await?;
            return Ok(());
        }

        self.storage.set_flow_state(
            from.id,
            &FlowState::AwaitingBirthDate { name: name.clone() },
        )?;
        self.say(
            chat_id,
            Text::AskBirthDate.render(language, &[("name", name.as_str())]),
        )
        .await?;
        Ok(())
    }

    async fn process_birth_date(
        &self,
        from: &TelegramUser,
        chat_id: i64,
        name: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let language = self.language_of(from)?;
        let Some(birth_date) = numerology::parse_birth_date(text) else {
            self.say(chat_id, Text::InvalidDate.template(language))
                .await?;
            return Ok(());
        };

        let mut user = match self.storage.get_user(from.id)? {
            Some(user) => user,
            None => self
                .storage
                .create_user(from.id, language, None, &self.config.referral, now)?,
        };
        user.name = Some(name.to_string());
        user.birth_date = Some(birth_date);
        self.storage.put_user(&user)?;
        self.storage.clear_flow_state(from.id)?;
        info!("User {} completed onboarding", from.id);

        self.say(chat_id, Text::ProfileCreated.template(language))
            .await?;
        self.send_profile(&user, name, birth_date, chat_id, now)
            .await?;
        self.say(chat_id, Text::ProfileCreatedHint.template(language))
            .await?;
        Ok(())
    }

    // === Commands ===

    async fn profile(&self, from: &TelegramUser, chat_id: i64, now: DateTime<Utc>) -> Result<()> {
        let Some((user, name, birth_date)) = self.onboarded_user(from, chat_id).await? else {
            return Ok(());
        };
        self.send_profile(&user, &name, birth_date, chat_id, now)
            .await
    }

    /// Generate the profile interpretation, cache it and send it with the menu.
    async fn send_profile(
        &self,
        user: &User,
        name: &str,
        birth_date: NaiveDate,
        chat_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let language = user.language;
        let profile = numerology::full_profile(name, birth_date, now.date_naive());
        let work = self
            .interpreter
            .profile_interpretation(name, birth_date, &profile, language);
        let Some(text) = self.with_thinking(chat_id, language, work).await? else {
            return Ok(());
        };

        self.storage
            .save_report(user.telegram_id, PROFILE_INTERPRETATION, &text, now)?;
        self.send(OutgoingMessage::new(chat_id, text).with_keyboard(self.main_menu(language)))
            .await?;
        Ok(())
    }

    async fn today(&self, from: &TelegramUser, chat_id: i64, now: DateTime<Utc>) -> Result<()> {
        let Some((user, name, birth_date)) = self.onboarded_user(from, chat_id).await? else {
            return Ok(());
        };
        let language = user.language;
        let profile = numerology::full_profile(&name, birth_date, now.date_naive());
        let work = self.interpreter.daily_forecast(&name, &profile, language);
        let Some(forecast) = self.with_thinking(chat_id, language, work).await? else {
            return Ok(());
        };

        let text = format!("{}\n\n{forecast}", Text::TodayHeader.template(language));
        self.send(OutgoingMessage::new(chat_id, text).markdown())
            .await?;
        Ok(())
    }

    async fn compatibility(
        &self,
        from: &TelegramUser,
        chat_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some((user, _, _)) = self.onboarded_user(from, chat_id).await? else {
            return Ok(());
        };
        let language = user.language;

        if !user.can_check_compatibility(now, self.config.limits.free_compatibility_per_week) {
            self.send(
                OutgoingMessage::new(chat_id, Text::CompatibilityLimit.template(language))
                    .with_keyboard(self.plans_keyboard(language)),
            )
            .await?;
            return Ok(());
        }

        self.storage
            .set_flow_state(from.id, &FlowState::AwaitingPartnerDate)?;
        self.say(chat_id, Text::CompatibilityAsk.template(language))
            .await?;
        Ok(())
    }

    async fn process_partner_date(
        &self,
        from: &TelegramUser,
        chat_id: i64,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(mut user) = self.storage.get_user(from.id)? else {
            self.storage.clear_flow_state(from.id)?;
            return Ok(());
        };
        let language = user.language;
        let Some((_, birth_date)) = identity(&user) else {
            self.storage.clear_flow_state(from.id)?;
            self.say(chat_id, Text::OnboardingRequired.template(language))
                .await?;
            return Ok(());
        };
        let Some(partner_date) = numerology::parse_birth_date(text) else {
            self.say(chat_id, Text::InvalidDate.template(language))
                .await?;
            return Ok(());
        };

        self.storage.clear_flow_state(from.id)?;
        if !user.is_premium(now) {
            user.record_compatibility(now.date_naive());
            self.storage.put_user(&user)?;
        }

        let scores = numerology::compatibility(birth_date, partner_date);
        let record = self
            .storage
            .save_compatibility(from.id, partner_date, scores, now)?;

        let work = self
            .interpreter
            .compatibility_analysis(&scores, Some(partner_date), language);
        let Some(analysis) = self.with_thinking(chat_id, language, work).await? else {
            return Ok(());
        };
        self.storage
            .set_compatibility_interpretation(from.id, &record.id, &analysis)?;

        let header = Text::CompatibilityHeader.render(
            language,
            &[("score", scores.overall_score.to_string().as_str())],
        );
        self.send(
            OutgoingMessage::new(chat_id, format!("{header}\n\n{analysis}"))
                .markdown()
                .with_keyboard(self.main_menu(language)),
        )
        .await?;
        Ok(())
    }

    async fn buy(&self, from: &TelegramUser, chat_id: i64) -> Result<()> {
        let language = self.language_of(from)?;
        let limits = &self.config.limits;
        let text = texts::plans(
            language,
            &self.config.pricing,
            (limits.free_questions_per_day, limits.free_compatibility_per_week),
        );
        self.send(
            OutgoingMessage::new(chat_id, text)
                .markdown()
                .with_keyboard(self.plans_keyboard(language)),
        )
        .await?;
        Ok(())
    }

    async fn send_plan_invoice(
        &self,
        from: &TelegramUser,
        chat_id: i64,
        kind: SubscriptionType,
    ) -> Result<()> {
        let language = self.language_of(from)?;
        let invoice = Product::Subscription(kind).invoice(language, &self.config.pricing);
        self.api.send_invoice(chat_id, &invoice).await
    }

    async fn invite(&self, from: &TelegramUser, chat_id: i64) -> Result<()> {
        let Some(user) = self.registered_user(from, chat_id).await? else {
            return Ok(());
        };
        let code = if user.referral_code.is_empty() {
            user.telegram_id.to_string()
        } else {
            user.referral_code.clone()
        };
        let link = format!(
            "https://t.me/{}?start=ref_{code}",
            self.config.telegram.bot_username
        );
        let text = Text::Invite.render(
            user.language,
            &[
                ("bonus", self.config.referral.bonus_questions.to_string().as_str()),
                ("link", link.as_str()),
            ],
        );
        self.say(chat_id, text).await?;
        Ok(())
    }

    async fn help(&self, from: &TelegramUser, chat_id: i64) -> Result<()> {
        let language = self.language_of(from)?;
        self.send(OutgoingMessage::new(chat_id, Text::Help.template(language)).markdown())
            .await?;
        Ok(())
    }

    async fn settings(&self, from: &TelegramUser, chat_id: i64) -> Result<()> {
        let Some(user) = self.registered_user(from, chat_id).await? else {
            return Ok(());
        };
        let language = user.language;
        let text = Text::Settings.render(
            language,
            &[
                ("lang", texts::language_name(language)),
                (
                    "notifications",
                    texts::on_off(language, user.notifications_enabled),
                ),
                ("time", user.notification_time.as_str()),
            ],
        );
        self.send(
            OutgoingMessage::new(chat_id, text)
                .markdown()
                .with_keyboard(self.main_menu(language)),
        )
        .await?;
        Ok(())
    }

    async fn restore_menu(&self, from: &TelegramUser, message: Option<&Message>) -> Result<()> {
        let Some(message) = message else {
            return Ok(());
        };
        let language = self.language_of(from)?;
        self.api
            .edit_reply_markup(message.chat.id, message.message_id, &self.main_menu(language))
            .await
    }

    // === Questions ===

    async fn question(
        &self,
        from: &TelegramUser,
        chat_id: i64,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some((mut user, name, birth_date)) = self.onboarded_user(from, chat_id).await? else {
            return Ok(());
        };
        let language = user.language;
        let daily_limit = self.config.limits.free_questions_per_day;

        if !user.can_ask_question(now, daily_limit) {
            self.send(
                OutgoingMessage::new(chat_id, Text::QuestionLimit.template(language))
                    .with_keyboard(self.plans_keyboard(language)),
            )
            .await?;
            return Ok(());
        }

        let today = now.date_naive();
        let premium = user.is_premium(now);
        if !premium {
            user.record_question(today);
            self.storage.put_user(&user)?;
        }

        let history = self
            .storage
            .conversation_history(from.id, self.config.storage.history_limit)?;
        self.storage
            .save_message(from.id, &ChatMessage::user(text), now)?;

        let profile = numerology::full_profile(&name, birth_date, today);
        let work = self
            .interpreter
            .answer_question(&name, &profile, text, &history, language);
        let Some(mut answer) = self.with_thinking(chat_id, language, work).await? else {
            return Ok(());
        };
        self.storage
            .save_message(from.id, &ChatMessage::assistant(answer.clone()), now)?;

        if !premium {
            let remaining = user.remaining_questions(today, daily_limit);
            let footer =
                Text::QuestionRemaining.render(language, &[("count", remaining.to_string().as_str())]);
            answer.push_str(&format!("\n\n_{footer}_"));
        }
        self.send(OutgoingMessage::new(chat_id, answer).markdown())
            .await?;
        Ok(())
    }

    // === Payments ===

    async fn pre_checkout(&self, query: &PreCheckoutQuery) -> Result<()> {
        match query.invoice_payload.parse::<Product>() {
            Ok(product) => {
                debug!("Approving checkout of {} for {}", product, query.from.id);
                self.api.answer_pre_checkout_query(&query.id, None).await
            }
            Err(e) => {
                warn!("Rejecting checkout for {}: {}", query.from.id, e);
                self.api
                    .answer_pre_checkout_query(&query.id, Some("Unknown product"))
                    .await
            }
        }
    }

    async fn successful_payment(
        &self,
        from: &TelegramUser,
        chat_id: i64,
        payment: &SuccessfulPayment,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(mut user) = self.storage.get_user(from.id)? else {
            warn!(
                "Payment {} from unknown user {}",
                payment.telegram_payment_charge_id, from.id
            );
            return Ok(());
        };
        let language = user.language;

        user.add_payment(&payment.invoice_payload, payment.total_amount, now);
        let confirmation = match payment.invoice_payload.parse::<Product>() {
            Ok(Product::Subscription(kind)) => {
                let days = self.config.pricing.subscription_days;
                user.activate_subscription(kind, now, days);
                Some(Text::BuySuccess.render(
                    language,
                    &[("plan", kind.display_name()), ("days", days.to_string().as_str())],
                ))
            }
            Ok(Product::Report(report)) => {
                user.add_purchased_report(report.id);
                Some(Text::ReportPurchased.render(language, &[("report", report.name(language))]))
            }
            Err(e) => {
                warn!("Payment with unexpected payload from {}: {}", from.id, e);
                None
            }
        };
        self.storage.put_user(&user)?;
        info!(
            "User {} paid {} {} for {}",
            from.id, payment.total_amount, payment.currency, payment.invoice_payload
        );

        if let Some(text) = confirmation {
            self.send(OutgoingMessage::new(chat_id, text).with_keyboard(self.main_menu(language)))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::Chat;
    use crate::ai::LanguageModel;
    use crate::testing::{unreachable_model, BotCall, FakeBot, FakeModel};
    use chrono::TimeZone;

    struct Harness {
        bot: Bot,
        api: Arc<FakeBot>,
        model: Arc<FakeModel>,
        storage: Arc<Storage>,
    }

    fn harness_with(model: FakeModel) -> Harness {
        let model = Arc::new(model);
        harness_over(model.clone(), model)
    }

    /// Harness whose interpreter talks to `llm`; `model` only records.
    fn harness_over(model: Arc<FakeModel>, llm: Arc<dyn LanguageModel>) -> Harness {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let api = Arc::new(FakeBot::default());
        let bot = Bot::new(
            Arc::new(Config::default()),
            storage.clone(),
            api.clone(),
            Interpreter::new(llm),
        );
        Harness {
            bot,
            api,
            model,
            storage,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeModel::default())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn tg_user(id: i64, language_code: &str) -> TelegramUser {
        TelegramUser {
            id,
            first_name: "Test".to_string(),
            username: None,
            language_code: Some(language_code.to_string()),
        }
    }

    fn message(id: i64, text: &str) -> Message {
        Message {
            message_id: 1,
            from: Some(tg_user(id, "en")),
            chat: Chat { id },
            text: Some(text.to_string()),
            successful_payment: None,
        }
    }

    fn text_update(id: i64, text: &str) -> Update {
        Update {
            update_id: 1,
            message: Some(message(id, text)),
            callback_query: None,
            pre_checkout_query: None,
        }
    }

    fn callback_update(id: i64, data: &str) -> Update {
        Update {
            update_id: 2,
            message: None,
            callback_query: Some(CallbackQuery {
                id: format!("cb-{data}"),
                from: tg_user(id, "en"),
                message: Some(Message {
                    message_id: 99,
                    text: Some("menu".to_string()),
                    ..message(id, "")
                }),
                data: Some(data.to_string()),
            }),
            pre_checkout_query: None,
        }
    }

    fn payment_update(id: i64, payload: &str, amount: u32) -> Update {
        Update {
            update_id: 3,
            message: Some(Message {
                text: None,
                successful_payment: Some(SuccessfulPayment {
                    currency: "XTR".to_string(),
                    total_amount: amount,
                    invoice_payload: payload.to_string(),
                    telegram_payment_charge_id: "charge".to_string(),
                }),
                ..message(id, "")
            }),
            callback_query: None,
            pre_checkout_query: None,
        }
    }

    /// An English user who finished onboarding as Anna, 15.03.1990.
    fn onboarded(h: &Harness, id: i64) -> User {
        let mut user = h
            .storage
            .create_user(id, Language::En, None, &Config::default().referral, now())
            .unwrap();
        user.name = Some("Anna".to_string());
        user.birth_date = NaiveDate::from_ymd_opt(1990, 3, 15);
        h.storage.put_user(&user).unwrap();
        user
    }

    async fn send(h: &Harness, update: Update) {
        h.bot.handle_update(&update, now()).await.unwrap();
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command("/start ref_ABCD1234"),
            Some((Command::Start, "ref_ABCD1234"))
        );
        assert_eq!(
            parse_command("/Today@NumeroChatBot"),
            Some((Command::Today, ""))
        );
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command("what is my number?"), None);
    }

    #[tokio::test]
    async fn test_start_creates_user_and_asks_name() {
        let h = harness();
        let mut update = text_update(1, "/start");
        update.message.as_mut().unwrap().from = Some(tg_user(1, "uk"));

        send(&h, update).await;

        let user = h.storage.get_user(1).unwrap().unwrap();
        assert_eq!(user.language, Language::Ru);
        assert_eq!(h.storage.get_flow_state(1).unwrap(), Some(FlowState::AwaitingName));
        assert_eq!(h.api.texts(), vec![Text::Welcome.template(Language::Ru)]);
    }

    #[tokio::test]
    async fn test_start_with_referral_code_credits_referrer() {
        let h = harness();
        let referrer = onboarded(&h, 10);

        send(&h, text_update(11, &format!("/start ref_{}", referrer.referral_code))).await;

        let referrer = h.storage.get_user(10).unwrap().unwrap();
        assert_eq!(referrer.referrals_count, 1);
        assert_eq!(referrer.questions_bonus, 10);
        assert_eq!(h.storage.get_user(11).unwrap().unwrap().referred_by, Some(10));
    }

    #[tokio::test]
    async fn test_start_with_legacy_id_referral() {
        let h = harness();
        onboarded(&h, 10);

        send(&h, text_update(11, "/start ref_10")).await;

        assert_eq!(h.storage.get_user(11).unwrap().unwrap().referred_by, Some(10));
    }

    #[tokio::test]
    async fn test_start_when_onboarded_welcomes_back() {
        let h = harness();
        onboarded(&h, 1);

        send(&h, text_update(1, "/start")).await;

        let sent = h.api.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("Welcome back, Anna!"));
        assert!(sent[0].reply_markup.is_some());
        assert_eq!(h.storage.get_flow_state(1).unwrap(), None);
    }

    #[tokio::test]
    async fn test_onboarding_flow() {
        let h = harness();
        send(&h, text_update(1, "/start")).await;
        send(&h, text_update(1, "   ")).await;
        assert_eq!(h.storage.get_flow_state(1).unwrap(), Some(FlowState::AwaitingName));

        send(&h, text_update(1, "Anna")).await;
        assert_eq!(
            h.storage.get_flow_state(1).unwrap(),
            Some(FlowState::AwaitingBirthDate {
                name: "Anna".to_string()
            })
        );

        send(&h, text_update(1, "31.02.1990")).await;
        assert!(h.storage.get_flow_state(1).unwrap().is_some());

        h.api.clear();
        send(&h, text_update(1, "15.03.1990")).await;

        let user = h.storage.get_user(1).unwrap().unwrap();
        assert!(user.is_onboarded());
        assert_eq!(h.storage.get_flow_state(1).unwrap(), None);

        let texts = h.api.texts();
        assert_eq!(
            texts,
            vec![
                Text::ProfileCreated.template(Language::En).to_string(),
                Text::Thinking.template(Language::En).to_string(),
                "reply #1".to_string(),
                Text::ProfileCreatedHint.template(Language::En).to_string(),
            ]
        );
        assert!(h.api.sent()[2].reply_markup.is_some());
        assert!(h
            .api
            .calls()
            .iter()
            .any(|call| matches!(call, BotCall::Delete { message_id: 6, .. })));

        let cached = h.storage.get_report(1, PROFILE_INTERPRETATION).unwrap().unwrap();
        assert_eq!(cached.content, "reply #1");
    }

    #[tokio::test]
    async fn test_commands_require_start() {
        let h = harness();
        send(&h, text_update(5, "/profile")).await;
        send(&h, text_update(5, "hello")).await;

        assert_eq!(
            h.api.texts(),
            vec![Text::StartFirst.template(Language::En); 2]
        );
    }

    #[tokio::test]
    async fn test_commands_require_onboarding() {
        let h = harness();
        send(&h, text_update(5, "/start")).await;
        h.storage.clear_flow_state(5).unwrap();
        h.api.clear();

        send(&h, text_update(5, "/today")).await;

        assert_eq!(h.api.texts(), vec![Text::OnboardingRequired.template(Language::En)]);
        assert_eq!(h.model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_questions_until_limit() {
        let h = harness();
        onboarded(&h, 1);

        for _ in 0..3 {
            send(&h, text_update(1, "Will I be lucky?")).await;
        }
        let sent = h.api.sent();
        let last = sent.last().unwrap();
        assert!(last.text.starts_with("reply #3"));
        assert!(last.text.ends_with("_💬 Free questions remaining today: 0_"));

        h.api.clear();
        send(&h, text_update(1, "And now?")).await;
        let sent = h.api.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, Text::QuestionLimit.template(Language::En));
        assert_eq!(h.model.call_count(), 3);

        let history = h.storage.conversation_history(1, 20).unwrap();
        assert_eq!(history.len(), 6);
        assert_eq!(history[0].content, "Will I be lucky?");
        assert_eq!(history[1].content, "reply #1");
    }

    #[tokio::test]
    async fn test_question_passes_previous_history() {
        let h = harness();
        onboarded(&h, 1);

        send(&h, text_update(1, "first")).await;
        send(&h, text_update(1, "second")).await;

        let (messages, _, _) = h.model.last_call();
        // system, two history messages, question prompt
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "first");
        assert_eq!(messages[2].content, "reply #1");
    }

    #[tokio::test]
    async fn test_premium_user_has_no_footer() {
        let h = harness();
        let mut user = onboarded(&h, 1);
        user.activate_subscription(SubscriptionType::Lite, now(), 30);
        h.storage.put_user(&user).unwrap();

        send(&h, text_update(1, "question")).await;

        let last = h.api.sent().pop().unwrap();
        assert_eq!(last.text, "reply #1");
        assert_eq!(h.storage.get_user(1).unwrap().unwrap().questions_today, 0);
    }

    #[tokio::test]
    async fn test_model_failure_is_reported() {
        let h = harness_with(FakeModel::failing());
        onboarded(&h, 1);

        send(&h, text_update(1, "/today")).await;

        assert_eq!(
            h.api.texts(),
            vec![
                Text::Thinking.template(Language::En).to_string(),
                Text::GenerationFailed.template(Language::En).to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_model_is_reported() {
        let h = harness_over(Arc::new(FakeModel::default()), unreachable_model());
        onboarded(&h, 1);

        send(&h, text_update(1, "What should I focus on?")).await;

        assert_eq!(
            h.api.texts(),
            vec![
                Text::Thinking.template(Language::En).to_string(),
                Text::GenerationFailed.template(Language::En).to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_compatibility_flow() {
        let h = harness();
        onboarded(&h, 1);

        send(&h, callback_update(1, "compatibility")).await;
        assert_eq!(
            h.storage.get_flow_state(1).unwrap(),
            Some(FlowState::AwaitingPartnerDate)
        );
        assert!(h
            .api
            .calls()
            .contains(&BotCall::AnswerCallback("cb-compatibility".to_string())));

        send(&h, text_update(1, "not a date")).await;
        assert_eq!(
            h.storage.get_flow_state(1).unwrap(),
            Some(FlowState::AwaitingPartnerDate)
        );

        send(&h, text_update(1, "29.11.1992")).await;
        assert_eq!(h.storage.get_flow_state(1).unwrap(), None);

        let last = h.api.sent().pop().unwrap();
        assert!(last.text.starts_with("👫 *Compatibility: 61%*"));
        assert!(last.text.ends_with("reply #1"));

        let history = h.storage.compatibility_history(1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].ai_interpretation.as_deref(), Some("reply #1"));

        let user = h.storage.get_user(1).unwrap().unwrap();
        assert_eq!(user.compatibility_used(now().date_naive()), 1);
    }

    #[tokio::test]
    async fn test_compatibility_weekly_limit() {
        let h = harness();
        let mut user = onboarded(&h, 1);
        user.record_compatibility(now().date_naive());
        user.record_compatibility(now().date_naive());
        h.storage.put_user(&user).unwrap();

        send(&h, text_update(1, "/compatibility")).await;

        let sent = h.api.sent();
        assert_eq!(sent[0].text, Text::CompatibilityLimit.template(Language::En));
        assert!(sent[0].reply_markup.is_some());
        assert_eq!(h.storage.get_flow_state(1).unwrap(), None);
    }

    #[tokio::test]
    async fn test_buy_pro_sends_invoice() {
        let h = harness();
        onboarded(&h, 1);

        send(&h, callback_update(1, "buy_pro")).await;

        let invoice = h
            .api
            .calls()
            .into_iter()
            .find_map(|call| match call {
                BotCall::SendInvoice { chat_id, invoice } => Some((chat_id, invoice)),
                _ => None,
            })
            .unwrap();
        assert_eq!(invoice.0, 1);
        assert_eq!(invoice.1.payload, "subscription_pro");
        assert_eq!(invoice.1.currency, "XTR");
        assert_eq!(invoice.1.prices[0].amount, 500);
        assert_eq!(invoice.1.title, "PRO — 30 days");
    }

    #[tokio::test]
    async fn test_subscription_payment_activates_and_extends() {
        let h = harness();
        onboarded(&h, 1);

        send(&h, payment_update(1, "subscription_pro", 500)).await;
        send(&h, payment_update(1, "subscription_pro", 500)).await;

        let user = h.storage.get_user(1).unwrap().unwrap();
        assert!(user.is_pro(now()));
        assert_eq!(
            user.subscription_expires,
            Some(now() + chrono::Duration::days(60))
        );
        assert_eq!(user.payment_history.len(), 2);
        assert!(h.api.texts()[0].contains("PRO plan is activated for 30 days"));
    }

    #[tokio::test]
    async fn test_report_payment_grants_report() {
        let h = harness();
        onboarded(&h, 1);

        send(&h, payment_update(1, "report_financial_code", 150)).await;

        let user = h.storage.get_user(1).unwrap().unwrap();
        assert!(user.has_report("financial_code", now()));
        assert!(h.api.texts()[0].contains("Financial Code"));
    }

    #[tokio::test]
    async fn test_unknown_payment_payload_is_recorded() {
        let h = harness();
        onboarded(&h, 1);

        send(&h, payment_update(1, "mystery", 10)).await;

        let user = h.storage.get_user(1).unwrap().unwrap();
        assert_eq!(user.payment_history.len(), 1);
        assert!(!user.is_premium(now()));
        assert!(h.api.sent().is_empty());
    }

    #[tokio::test]
    async fn test_pre_checkout_validation() {
        let h = harness();
        for (id, payload) in [("q1", "subscription_lite"), ("q2", "report_nope")] {
            let update = Update {
                update_id: 4,
                message: None,
                callback_query: None,
                pre_checkout_query: Some(PreCheckoutQuery {
                    id: id.to_string(),
                    from: tg_user(1, "en"),
                    currency: "XTR".to_string(),
                    total_amount: 175,
                    invoice_payload: payload.to_string(),
                }),
            };
            send(&h, update).await;
        }

        assert_eq!(
            h.api.calls(),
            vec![
                BotCall::PreCheckout {
                    query_id: "q1".to_string(),
                    error: None
                },
                BotCall::PreCheckout {
                    query_id: "q2".to_string(),
                    error: Some("Unknown product".to_string())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_invite_link_uses_referral_code() {
        let h = harness();
        let user = onboarded(&h, 1);

        send(&h, text_update(1, "/invite")).await;

        let text = &h.api.texts()[0];
        assert!(text.contains(&format!(
            "https://t.me/NumeroChatBot?start=ref_{}",
            user.referral_code
        )));
        assert!(text.contains("+10 questions"));
    }

    #[tokio::test]
    async fn test_settings_and_help() {
        let h = harness();
        onboarded(&h, 1);

        send(&h, text_update(1, "/settings")).await;
        send(&h, text_update(1, "/help")).await;

        let texts = h.api.texts();
        assert!(texts[0].contains("Language: English"));
        assert!(texts[0].contains("Notifications: on"));
        assert!(texts[0].contains("Notification time: 08:00"));
        assert_eq!(texts[1], Text::Help.template(Language::En));
    }

    #[tokio::test]
    async fn test_menu_callback_restores_keyboard() {
        let h = harness();
        onboarded(&h, 1);

        send(&h, callback_update(1, "menu")).await;

        assert_eq!(
            h.api.calls(),
            vec![
                BotCall::EditMarkup {
                    chat_id: 1,
                    message_id: 99
                },
                BotCall::AnswerCallback("cb-menu".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_command_interrupts_flow() {
        let h = harness();
        onboarded(&h, 1);
        h.storage
            .set_flow_state(1, &FlowState::AwaitingPartnerDate)
            .unwrap();

        send(&h, text_update(1, "/help")).await;

        assert_eq!(h.api.texts(), vec![Text::Help.template(Language::En)]);
        assert_eq!(
            h.storage.get_flow_state(1).unwrap(),
            Some(FlowState::AwaitingPartnerDate)
        );
    }
}
