//! Purchasable reports and invoice products.

use std::fmt;
use std::str::FromStr;

use crate::config::PricingConfig;
use crate::error::{Error, Result};
use crate::models::{Language, SubscriptionType, CURRENCY};
use crate::telegram::{Invoice, LabeledPrice};

/// Prefix of report invoice payloads.
const REPORT_PREFIX: &str = "report_";

/// Report type under which the cached profile interpretation is stored.
pub const PROFILE_INTERPRETATION: &str = "profile_interpretation";

/// A report that can be bought or unlocked by PRO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSpec {
    /// Stable identifier.
    pub id: &'static str,
    /// Russian title.
    pub name_ru: &'static str,
    /// English title.
    pub name_en: &'static str,
    /// Price in Telegram Stars.
    pub price: u32,
    /// Kind of input the mini-app collects before generation.
    pub requires_input: Option<&'static str>,
    /// Whether the report may be generated many times with different input.
    pub multi_instance: bool,
}

impl ReportSpec {
    /// Title in the given language.
    #[must_use]
    pub fn name(&self, language: Language) -> &'static str {
        match language {
            Language::Ru => self.name_ru,
            Language::En => self.name_en,
        }
    }
}

/// All reports, in display order.
pub const REPORTS: [ReportSpec; 6] = [
    ReportSpec {
        id: "full_portrait",
        name_ru: "Полный портрет",
        name_en: "Full Portrait",
        price: 120,
        requires_input: None,
        multi_instance: false,
    },
    ReportSpec {
        id: "financial_code",
        name_ru: "Финансовый код",
        name_en: "Financial Code",
        price: 150,
        requires_input: None,
        multi_instance: false,
    },
    ReportSpec {
        id: "date_calendar",
        name_ru: "Календарь дат",
        name_en: "Date Calendar",
        price: 130,
        requires_input: Some("month_year"),
        multi_instance: true,
    },
    ReportSpec {
        id: "year_forecast",
        name_ru: "Прогноз на год",
        name_en: "Year Forecast",
        price: 150,
        requires_input: Some("year"),
        multi_instance: true,
    },
    ReportSpec {
        id: "name_selection",
        name_ru: "Подбор имени",
        name_en: "Name Selection",
        price: 140,
        requires_input: Some("name_context"),
        multi_instance: true,
    },
    ReportSpec {
        id: "compatibility_pro",
        name_ru: "Совместимость PRO",
        name_en: "Compatibility PRO",
        price: 150,
        requires_input: Some("partner_data"),
        multi_instance: true,
    },
];

/// Look up a report by id.
#[must_use]
pub fn find_report(id: &str) -> Option<&'static ReportSpec> {
    REPORTS.iter().find(|report| report.id == id)
}

/// Whether reports of this id are stored as instances.
#[must_use]
pub fn is_multi_instance(id: &str) -> bool {
    find_report(id).is_some_and(|report| report.multi_instance)
}

/// Something a user can pay for. The string form is the invoice payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product {
    /// A subscription period.
    Subscription(SubscriptionType),
    /// A single report.
    Report(&'static ReportSpec),
}

impl Product {
    /// Price in Telegram Stars.
    #[must_use]
    pub fn price(&self, pricing: &PricingConfig) -> u32 {
        match self {
            Self::Subscription(SubscriptionType::Pro) => pricing.pro,
            Self::Subscription(_) => pricing.lite,
            Self::Report(report) => report.price,
        }
    }

    /// Invoice title.
    #[must_use]
    pub fn title(&self, language: Language, pricing: &PricingConfig) -> String {
        match (self, language) {
            (Self::Subscription(kind), Language::Ru) => {
                format!("{} — {} дней", kind.display_name(), pricing.subscription_days)
            }
            (Self::Subscription(kind), Language::En) => {
                format!("{} — {} days", kind.display_name(), pricing.subscription_days)
            }
            (Self::Report(report), _) => report.name(language).to_string(),
        }
    }

    /// Invoice description.
    #[must_use]
    pub fn description(&self, language: Language) -> String {
        let text = match (self, language) {
            (Self::Subscription(SubscriptionType::Pro), Language::Ru) => {
                "Безлимит + все премиум отчёты"
            }
            (Self::Subscription(SubscriptionType::Pro), Language::En) => {
                "Unlimited + all premium reports"
            }
            (Self::Subscription(_), Language::Ru) => "Безлимит вопросов и совместимости",
            (Self::Subscription(_), Language::En) => "Unlimited questions and compatibility",
            (Self::Report(report), _) => report.name(language),
        };
        text.to_string()
    }

    /// Invoice in Telegram Stars for this product.
    #[must_use]
    pub fn invoice(&self, language: Language, pricing: &PricingConfig) -> Invoice {
        let title = self.title(language, pricing);
        Invoice {
            description: self.description(language),
            payload: self.to_string(),
            currency: CURRENCY.to_string(),
            prices: vec![LabeledPrice {
                label: title.clone(),
                amount: self.price(pricing),
            }],
            title,
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscription(kind) => write!(f, "subscription_{kind}"),
            Self::Report(report) => write!(f, "{REPORT_PREFIX}{}", report.id),
        }
    }
}

impl FromStr for Product {
    type Err = Error;

    fn from_str(payload: &str) -> Result<Self> {
        match payload {
            "subscription_lite" => Ok(Self::Subscription(SubscriptionType::Lite)),
            "subscription_pro" => Ok(Self::Subscription(SubscriptionType::Pro)),
            _ => payload
                .strip_prefix(REPORT_PREFIX)
                .and_then(find_report)
                .map(Self::Report)
                .ok_or_else(|| Error::invalid_input(format!("unknown product: {payload}"))),
        }
    }
}
