//! Inline keyboards.

use crate::config::PricingConfig;
use crate::models::Language;
use crate::telegram::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Callback data of the buttons.
pub mod callback {
    pub const PROFILE: &str = "profile";
    pub const TODAY: &str = "today";
    pub const COMPATIBILITY: &str = "compatibility";
    pub const BUY: &str = "buy";
    pub const BUY_LITE: &str = "buy_lite";
    pub const BUY_PRO: &str = "buy_pro";
    pub const MENU: &str = "menu";
}

/// Main menu; the settings button opens the mini-app.
#[must_use]
pub fn main_menu(language: Language, webapp_url: &str) -> InlineKeyboardMarkup {
    let labels = match language {
        Language::Ru => [
            "🔮 Мой профиль",
            "📅 Прогноз на сегодня",
            "👫 Совместимость",
            "💎 Тарифы",
            "⚙️ Настройки",
        ],
        Language::En => [
            "🔮 My Profile",
            "📅 Today's Forecast",
            "👫 Compatibility",
            "💎 Plans",
            "⚙️ Settings",
        ],
    };
    let [profile, today, compatibility, plans, settings] = labels;

    InlineKeyboardMarkup::single_column(vec![
        InlineKeyboardButton::callback(profile, callback::PROFILE),
        InlineKeyboardButton::callback(today, callback::TODAY),
        InlineKeyboardButton::callback(compatibility, callback::COMPATIBILITY),
        InlineKeyboardButton::callback(plans, callback::BUY),
        InlineKeyboardButton::web_app(settings, webapp_url),
    ])
}

/// Plan choice with a way back to the menu.
#[must_use]
pub fn plans(language: Language, pricing: &PricingConfig) -> InlineKeyboardMarkup {
    let back = match language {
        Language::Ru => "◀️ Назад",
        Language::En => "◀️ Back",
    };
    InlineKeyboardMarkup::single_column(vec![
        InlineKeyboardButton::callback(format!("⭐ LITE — {}★", pricing.lite), callback::BUY_LITE),
        InlineKeyboardButton::callback(format!("💎 PRO — {}★", pricing.pro), callback::BUY_PRO),
        InlineKeyboardButton::callback(back, callback::MENU),
    ])
}
