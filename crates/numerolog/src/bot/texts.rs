//! Localized bot texts. Templates use `{name}`-style placeholders.

use crate::config::PricingConfig;
use crate::models::Language;

/// Keys of the text table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Text {
    Welcome,
    WelcomeBack,
    AskBirthDate,
    EmptyName,
    InvalidDate,
    ProfileCreated,
    ProfileCreatedHint,
    QuestionLimit,
    QuestionRemaining,
    Thinking,
    CompatibilityAsk,
    CompatibilityLimit,
    CompatibilityHeader,
    TodayHeader,
    BuySuccess,
    ReportPurchased,
    Help,
    Invite,
    Settings,
    StartFirst,
    OnboardingRequired,
    GenerationFailed,
    DailyNotificationHeader,
}

impl Text {
    /// Raw template.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn template(self, language: Language) -> &'static str {
        match language {
            Language::Ru => match self {
                Self::Welcome => {
                    "✨ Привет! Я AI-нумеролог.\n\nДавай узнаем твои числа? Для начала скажи, как тебя зовут:"
                }
                Self::WelcomeBack => {
                    "✨ С возвращением, {name}!\n\n💬 Спроси меня о чём угодно:\n• «Повезёт ли мне сегодня в любви?»\n• «Когда лучше просить повышение?»\n• «Как улучшить здоровье по моим числам?»\n\nИли выбери из меню:"
                }
                Self::AskBirthDate => {
                    "Отлично, {name}! 🎉\n\nТеперь введи свою дату рождения в формате ДД.ММ.ГГГГ\n(например: 15.03.1990)"
                }
                Self::EmptyName => "🤔 Напиши, пожалуйста, своё имя:",
                Self::InvalidDate => {
                    "🤔 Не могу разобрать дату. Введи в формате ДД.ММ.ГГГГ (например: 15.03.1990)"
                }
                Self::ProfileCreated => {
                    "🔮 Отлично! Твой профиль создан.\n\nСейчас расскажу о твоих числах..."
                }
                Self::ProfileCreatedHint => {
                    "💡 Ты можешь задавать мне любые вопросы!\n\n• «Какая работа мне подходит?»\n• «Как наладить отношения?»\n• «Что ждёт меня в финансах?»\n• «Когда лучше заняться здоровьем?»\n\nЯ отвечу с учётом твоих чисел ✨"
                }
                Self::QuestionLimit => {
                    "😔 На сегодня бесплатные вопросы закончились.\n\nХочешь продолжить? Выбери тариф:"
                }
                Self::QuestionRemaining => "💬 Осталось бесплатных вопросов сегодня: {count}",
                Self::Thinking => "🔮 Анализирую...",
                Self::CompatibilityAsk => "👫 Введи дату рождения второго человека (ДД.ММ.ГГГГ):",
                Self::CompatibilityLimit => {
                    "😔 На этой неделе бесплатные проверки совместимости закончились.\n\nОбновится через неделю или выбери тариф:"
                }
                Self::CompatibilityHeader => "👫 *Совместимость: {score}%*",
                Self::TodayHeader => "📅 *Прогноз на сегодня*",
                Self::BuySuccess => {
                    "🎉 Спасибо за покупку! Твой тариф {plan} активирован на {days} дней."
                }
                Self::ReportPurchased => {
                    "🎉 Спасибо за покупку! Отчёт «{report}» доступен в приложении."
                }
                Self::Help => {
                    "🔮 *AI Нумеролог* — твой персональный гид в мире чисел\n\n*Команды:*\n/profile — твой нумерологический портрет\n/today — прогноз на сегодня\n/compatibility — проверить совместимость\n/buy — тарифы и покупка\n/invite — пригласить друга\n/settings — настройки\n/help — эта справка\n\n*Просто напиши вопрос* — и я отвечу с учётом твоих чисел!"
                }
                Self::Invite => {
                    "👋 Пригласи друга и получи +{bonus} вопросов + 1 премиум отчёт!\n\nТвоя ссылка:\n{link}"
                }
                Self::Settings => {
                    "⚙️ *Настройки*\n\nЯзык: {lang}\nУведомления: {notifications}\nВремя уведомлений: {time}"
                }
                Self::StartFirst => "Сначала нажми /start",
                Self::OnboardingRequired => {
                    "Давай сначала познакомимся! Нажми /start и укажи имя и дату рождения."
                }
                Self::GenerationFailed => "😔 Не получилось получить ответ. Попробуй ещё раз чуть позже.",
                Self::DailyNotificationHeader => "🌅 *Доброе утро, {name}!*",
            },
            Language::En => match self {
                Self::Welcome => {
                    "✨ Hi! I'm an AI Numerologist.\n\nLet's discover your numbers! First, what's your name?"
                }
                Self::WelcomeBack => {
                    "✨ Welcome back, {name}!\n\n💬 Ask me anything:\n• \"Will I be lucky in love today?\"\n• \"When should I ask for a raise?\"\n• \"How to improve health based on my numbers?\"\n\nOr choose from menu:"
                }
                Self::AskBirthDate => {
                    "Great, {name}! 🎉\n\nNow enter your birth date in DD.MM.YYYY format\n(e.g., 15.03.1990)"
                }
                Self::EmptyName => "🤔 Please tell me your name:",
                Self::InvalidDate => {
                    "🤔 Can't parse the date. Use DD.MM.YYYY format (e.g., 15.03.1990)"
                }
                Self::ProfileCreated => {
                    "🔮 Great! Your profile is created.\n\nLet me tell you about your numbers..."
                }
                Self::ProfileCreatedHint => {
                    "💡 You can ask me any questions!\n\n• \"What job suits me?\"\n• \"How to improve relationships?\"\n• \"What awaits me in finances?\"\n• \"When to focus on health?\"\n\nI'll answer based on your numbers ✨"
                }
                Self::QuestionLimit => {
                    "😔 Free questions for today are used up.\n\nWant to continue? Choose a plan:"
                }
                Self::QuestionRemaining => "💬 Free questions remaining today: {count}",
                Self::Thinking => "🔮 Analyzing...",
                Self::CompatibilityAsk => "👫 Enter the second person's birth date (DD.MM.YYYY):",
                Self::CompatibilityLimit => {
                    "😔 Free compatibility checks for this week are used up.\n\nThey reset in a week, or choose a plan:"
                }
                Self::CompatibilityHeader => "👫 *Compatibility: {score}%*",
                Self::TodayHeader => "📅 *Today's forecast*",
                Self::BuySuccess => "🎉 Thank you! Your {plan} plan is activated for {days} days.",
                Self::ReportPurchased => {
                    "🎉 Thank you! The \"{report}\" report is available in the app."
                }
                Self::Help => {
                    "🔮 *AI Numerologist* — your personal guide to the world of numbers\n\n*Commands:*\n/profile — your numerology portrait\n/today — today's forecast\n/compatibility — check compatibility\n/buy — plans and purchase\n/invite — invite a friend\n/settings — settings\n/help — this help\n\n*Just write a question* — and I'll answer based on your numbers!"
                }
                Self::Invite => {
                    "👋 Invite a friend and get +{bonus} questions + 1 premium report!\n\nYour link:\n{link}"
                }
                Self::Settings => {
                    "⚙️ *Settings*\n\nLanguage: {lang}\nNotifications: {notifications}\nNotification time: {time}"
                }
                Self::StartFirst => "Please start with /start first",
                Self::OnboardingRequired => {
                    "Let's get acquainted first! Press /start and tell me your name and birth date."
                }
                Self::GenerationFailed => "😔 I couldn't get an answer. Please try again a bit later.",
                Self::DailyNotificationHeader => "🌅 *Good morning, {name}!*",
            },
        }
    }

    /// Template with placeholders filled in.
    #[must_use]
    pub fn render(self, language: Language, args: &[(&str, &str)]) -> String {
        fill(self.template(language), args)
    }
}

/// Replace `{key}` placeholders; unknown placeholders stay as they are.
#[must_use]
pub fn fill(template: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{key}}}"), value)
    })
}

/// Description of the plans, with current prices.
#[must_use]
pub fn plans(language: Language, pricing: &PricingConfig, limits: (u32, u32)) -> String {
    let (questions, compatibility) = limits;
    let template = match language {
        Language::Ru => {
            "💎 *Тарифы*\n\n*FREE* — бесплатно\n• {questions} вопроса в день\n• {compatibility} проверки совместимости в неделю\n• Базовый портрет\n\n*LITE* — {lite}★ на {days} дней\n• Безлимит вопросов\n• Безлимит совместимости\n\n*PRO* — {pro}★ на {days} дней\n• Всё из LITE\n• Все премиум отчёты включены\n  - Полный портрет\n  - Финансовый код\n  - Календарь дат\n  - Совместимость PRO\n  - Подбор имени"
        }
        Language::En => {
            "💎 *Plans*\n\n*FREE* — free\n• {questions} questions per day\n• {compatibility} compatibility checks per week\n• Basic profile\n\n*LITE* — {lite}★ for {days} days\n• Unlimited questions\n• Unlimited compatibility\n\n*PRO* — {pro}★ for {days} days\n• Everything in LITE\n• All premium reports included\n  - Full portrait\n  - Financial code\n  - Date calendar\n  - Compatibility PRO\n  - Name selection"
        }
    };
    fill(
        template,
        &[
            ("questions", questions.to_string().as_str()),
            ("compatibility", compatibility.to_string().as_str()),
            ("lite", pricing.lite.to_string().as_str()),
            ("pro", pricing.pro.to_string().as_str()),
            ("days", pricing.subscription_days.to_string().as_str()),
        ],
    )
}

/// Human name of a language.
#[must_use]
pub fn language_name(language: Language) -> &'static str {
    match language {
        Language::Ru => "Русский",
        Language::En => "English",
    }
}

/// Localized on/off.
#[must_use]
pub fn on_off(language: Language, enabled: bool) -> &'static str {
    match (language, enabled) {
        (Language::Ru, true) => "вкл",
        (Language::Ru, false) => "выкл",
        (Language::En, true) => "on",
        (Language::En, false) => "off",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_placeholders() {
        let text = Text::AskBirthDate.render(Language::En, &[("name", "Anna")]);
        assert!(text.starts_with("Great, Anna!"));

        let text = Text::QuestionRemaining.render(Language::Ru, &[("count", "2")]);
        assert!(text.ends_with(": 2"));
    }

    #[test]
    fn test_unknown_placeholder_left_alone() {
        assert_eq!(fill("{a} {b}", &[("a", "1")]), "1 {b}");
    }

    #[test]
    fn test_plans_use_configured_prices() {
        let pricing = PricingConfig {
            lite: 200,
            pro: 600,
            subscription_days: 30,
        };
        let text = plans(Language::En, &pricing, (3, 2));
        assert!(text.contains("*LITE* — 200★ for 30 days"));
        assert!(text.contains("*PRO* — 600★"));
        assert!(text.contains("3 questions per day"));
        assert!(!text.contains('{'));
    }

    #[test]
    fn test_every_text_has_both_languages() {
        let all = [
            Text::Welcome,
            Text::WelcomeBack,
            Text::Help,
            Text::Settings,
            Text::StartFirst,
            Text::DailyNotificationHeader,
        ];
        for text in all {
            assert_ne!(text.template(Language::Ru), text.template(Language::En));
        }
    }
}
