//! Prompt construction.
//!
//! Everything here is pure string building so prompts can be checked without
//! calling a model.

use std::fmt::Write as _;

use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use crate::models::Language;
use crate::numerology::knowledge::{life_path_meaning, matrix_meaning, personal_year_meaning};
use crate::numerology::{self, CompatibilityScores, NumerologyProfile};

const SYSTEM_PROMPT_RU: &str = "Ты дружелюбный AI-нумеролог и помогаешь людям понять себя через числа.

Как ты общаешься:
- просто и понятно, без тяжёлой эзотерической терминологии;
- как умный друг, а не формальный консультант, на «ты»;
- без категоричности: «это может означать», а не «это значит»;
- с практическими советами, а не только описаниями;
- не противореча базовым значениям чисел;
- с умеренным количеством эмодзи (✨ 🔮 💫);
- кратко и по делу, не больше 3-5 абзацев.

Ты знаешь пифагорейскую, каббалистическую и ведическую нумерологию.";

const SYSTEM_PROMPT_EN: &str = "You are a friendly AI numerologist who helps people understand themselves through numbers.

How you communicate:
- simply and clearly, without heavy esoteric terminology;
- like a smart friend rather than a formal consultant, in a casual tone;
- without being categorical: \"this may mean\" rather than \"this means\";
- with practical advice, not just descriptions;
- without contradicting the basic meanings of numbers;
- with a moderate amount of emoji (✨ 🔮 💫);
- concisely, 3-5 paragraphs at most.

You know Pythagorean, Kabbalistic and Vedic numerology.";

/// Matrix cells summarized in the profile prompt.
const MATRIX_CELLS_IN_PROFILE: usize = 5;

/// Persona instructions for the given language.
#[must_use]
pub fn system_prompt(language: Language) -> &'static str {
    match language {
        Language::Ru => SYSTEM_PROMPT_RU,
        Language::En => SYSTEM_PROMPT_EN,
    }
}

fn matrix_summary(profile: &NumerologyProfile, language: Language) -> String {
    profile
        .matrix
        .iter()
        .filter_map(|(&position, &count)| matrix_meaning(position, count, language))
        .take(MATRIX_CELLS_IN_PROFILE)
        .map(|meaning| format!("{}: {}", meaning.name, meaning.interpretation))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for the personal profile interpretation.
#[must_use]
pub fn profile_prompt(
    name: &str,
    birth_date: NaiveDate,
    profile: &NumerologyProfile,
    language: Language,
) -> String {
    let life_path = life_path_meaning(profile.life_path, language);
    let year = personal_year_meaning(profile.personal_year, language);
    let matrix = matrix_summary(profile, language);

    match language {
        Language::Ru => format!(
            "Составь краткий персональный нумерологический портрет для {name}.

Данные:
- Дата рождения: {birth_date}
- Число Судьбы: {lp} «{lp_name}»
- Число Души: {soul}
- Число Имени: {expr}
- Персональный год: {py}
- Персональный день: {pd}

Число {lp}: {lp_desc}

Персональный год {py}: {year}

Матрица Пифагора:
{matrix}

Напиши дружелюбный персональный разбор в 3-4 абзацах, обращайся к {name} на «ты» \
и дай практический совет на текущий период.",
            lp = profile.life_path,
            lp_name = life_path.name,
            lp_desc = life_path.description,
            soul = profile.soul_number,
            expr = profile.expression_number,
            py = profile.personal_year,
            pd = profile.personal_day,
        ),
        Language::En => format!(
            "Create a brief personal numerology profile for {name}.

Data:
- Birth date: {birth_date}
- Life Path: {lp} \"{lp_name}\"
- Soul Number: {soul}
- Expression Number: {expr}
- Personal Year: {py}
- Personal Day: {pd}

Life Path {lp}: {lp_desc}

Personal Year {py}: {year}

Pythagoras square:
{matrix}

Write a friendly personal analysis in 3-4 paragraphs, address {name} casually \
and give practical advice for the current period.",
            lp = profile.life_path,
            lp_name = life_path.name,
            lp_desc = life_path.description,
            soul = profile.soul_number,
            expr = profile.expression_number,
            py = profile.personal_year,
            pd = profile.personal_day,
        ),
    }
}

/// Prompt wrapping a free-form question with the asker's numbers.
#[must_use]
pub fn question_prompt(
    name: &str,
    profile: &NumerologyProfile,
    question: &str,
    language: Language,
) -> String {
    let life_path = life_path_meaning(profile.life_path, language);
    match language {
        Language::Ru => format!(
            "Контекст пользователя {name}:
- Число Судьбы: {lp} ({lp_name})
- Число Души: {soul}
- Персональный год: {py}
- Персональный месяц: {pm}
- Персональный день: {pd}

{short}

Вопрос пользователя: {question}

Ответь с учётом нумерологического профиля и дай практический совет.",
            lp = profile.life_path,
            lp_name = life_path.name,
            short = life_path.short,
            soul = profile.soul_number,
            py = profile.personal_year,
            pm = profile.personal_month,
            pd = profile.personal_day,
        ),
        Language::En => format!(
            "User context for {name}:
- Life Path: {lp} ({lp_name})
- Soul Number: {soul}
- Personal Year: {py}
- Personal Month: {pm}
- Personal Day: {pd}

{short}

User's question: {question}

Answer with the numerology profile in mind and give practical advice.",
            lp = profile.life_path,
            lp_name = life_path.name,
            short = life_path.short,
            soul = profile.soul_number,
            py = profile.personal_year,
            pm = profile.personal_month,
            pd = profile.personal_day,
        ),
    }
}

/// Prompt for the short forecast of the current day.
#[must_use]
pub fn daily_forecast_prompt(name: &str, profile: &NumerologyProfile, language: Language) -> String {
    match language {
        Language::Ru => format!(
            "Составь краткий прогноз на сегодня для {name}.

Персональный день: {pd}
Персональный месяц: {pm}
Персональный год: {py}
Число Судьбы: {lp}

Напиши 3-4 предложения: общая энергия дня, что стоит делать и чего избегать. \
Будь конкретным и практичным.",
            pd = profile.personal_day,
            pm = profile.personal_month,
            py = profile.personal_year,
            lp = profile.life_path,
        ),
        Language::En => format!(
            "Write a brief forecast for today for {name}.

Personal Day: {pd}
Personal Month: {pm}
Personal Year: {py}
Life Path: {lp}

Write 3-4 sentences: the overall energy of the day, what to do and what to avoid. \
Be specific and practical.",
            pd = profile.personal_day,
            pm = profile.personal_month,
            py = profile.personal_year,
            lp = profile.life_path,
        ),
    }
}

/// Prompt for the analysis of a compatibility check.
#[must_use]
pub fn compatibility_prompt(
    scores: &CompatibilityScores,
    partner_date: Option<NaiveDate>,
    language: Language,
) -> String {
    let mut prompt = match language {
        Language::Ru => format!(
            "Проанализируй совместимость двух людей.

Данные:
- Общая совместимость: {overall}%
- Совместимость по Числу Судьбы: {lp}%
- Совместимость по Числу Души: {soul}%

Человек 1: Число Судьбы {p1_lp}, Число Души {p1_soul}
Человек 2: Число Судьбы {p2_lp}, Число Души {p2_soul}
",
            overall = scores.overall_score,
            lp = scores.life_path_score,
            soul = scores.soul_score,
            p1_lp = scores.person1.life_path,
            p1_soul = scores.person1.soul,
            p2_lp = scores.person2.life_path,
            p2_soul = scores.person2.soul,
        ),
        Language::En => format!(
            "Analyze the compatibility of two people.

Data:
- Overall compatibility: {overall}%
- Life Path compatibility: {lp}%
- Soul compatibility: {soul}%

Person 1: Life Path {p1_lp}, Soul {p1_soul}
Person 2: Life Path {p2_lp}, Soul {p2_soul}
",
            overall = scores.overall_score,
            lp = scores.life_path_score,
            soul = scores.soul_score,
            p1_lp = scores.person1.life_path,
            p1_soul = scores.person1.soul,
            p2_lp = scores.person2.life_path,
            p2_soul = scores.person2.soul,
        ),
    };

    if let Some(date) = partner_date {
        let _ = match language {
            Language::Ru => writeln!(prompt, "Дата рождения второго человека: {date}"),
            Language::En => writeln!(prompt, "Second person's birth date: {date}"),
        };
    }

    prompt.push_str(match language {
        Language::Ru => {
            "\nНапиши краткий анализ в 2-3 абзацах: сильные стороны пары, \
возможные сложности и совет для гармоничных отношений."
        }
        Language::En => {
            "\nWrite a brief analysis in 2-3 paragraphs: strengths of the pair, \
potential challenges and advice for a harmonious relationship."
        }
    });
    prompt
}

/// A premium report with the parameters it is generated for.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportRequest {
    /// In-depth portrait of every number.
    FullPortrait,
    /// Money habits and favourable financial periods.
    FinancialCode,
    /// Month-by-month outlook for a year.
    YearForecast {
        /// Year forecast.
        year: i32,
    },
    /// Favourable and unfavourable days of a month.
    DateCalendar {
        /// Month, 1-12.
        month: u32,
        /// Year.
        year: i32,
    },
    /// Name suggestions for a child, business or pet.
    NameSelection {
        /// Free-form parameters from the mini-app.
        context: Value,
    },
    /// Extended compatibility with a named partner.
    CompatibilityPro {
        /// Partner name, when given.
        partner_name: Option<String>,
        /// Scores against the partner's birth date, when given.
        scores: Option<CompatibilityScores>,
    },
}

impl ReportRequest {
    /// Build the request for a report id from the mini-app context.
    ///
    /// Missing year and month default to `today`'s. Returns `None` for ids
    /// outside the catalog.
    #[must_use]
    pub fn from_context(
        report_id: &str,
        context: &Value,
        birth_date: NaiveDate,
        today: NaiveDate,
    ) -> Option<Self> {
        let year = context
            .get("year")
            .and_then(Value::as_i64)
            .and_then(|y| i32::try_from(y).ok())
            .unwrap_or_else(|| today.year());
        let month = context
            .get("month")
            .and_then(Value::as_u64)
            .and_then(|m| u32::try_from(m).ok())
            .filter(|m| (1..=12).contains(m))
            .unwrap_or_else(|| today.month());

        let request = match report_id {
            "full_portrait" => Self::FullPortrait,
            "financial_code" => Self::FinancialCode,
            "year_forecast" => Self::YearForecast { year },
            "date_calendar" => Self::DateCalendar { month, year },
            "name_selection" => Self::NameSelection {
                context: context.clone(),
            },
            "compatibility_pro" => {
                let partner_name = context
                    .get("partner_name")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let scores = context
                    .get("partner_birth_date")
                    .and_then(Value::as_str)
                    .and_then(numerology::parse_birth_date)
                    .map(|partner| numerology::compatibility(birth_date, partner));
                Self::CompatibilityPro {
                    partner_name,
                    scores,
                }
            }
            _ => return None,
        };
        Some(request)
    }
}

/// Prompt for a premium report.
#[must_use]
pub fn report_prompt(
    request: &ReportRequest,
    name: &str,
    birth_date: NaiveDate,
    profile: &NumerologyProfile,
    language: Language,
) -> String {
    let ru = language == Language::Ru;
    let mut prompt = if ru {
        format!(
            "Пользователь: {name}, дата рождения {birth_date}.
Число Судьбы {lp}, Число Души {soul}, Число Имени {expr}, Число Личности {pers}, \
Число Дня рождения {bday}, Число Зрелости {mat}, персональный год {py}.
Матрица Пифагора (цифра: количество): {matrix}

",
            lp = profile.life_path,
            soul = profile.soul_number,
            expr = profile.expression_number,
            pers = profile.personality_number,
            bday = profile.birthday_number,
            mat = profile.maturity_number,
            py = profile.personal_year,
            matrix = matrix_counts(profile),
        )
    } else {
        format!(
            "User: {name}, born {birth_date}.
Life Path {lp}, Soul {soul}, Expression {expr}, Personality {pers}, \
Birthday {bday}, Maturity {mat}, Personal Year {py}.
Pythagoras square (digit: count): {matrix}

",
            lp = profile.life_path,
            soul = profile.soul_number,
            expr = profile.expression_number,
            pers = profile.personality_number,
            bday = profile.birthday_number,
            mat = profile.maturity_number,
            py = profile.personal_year,
            matrix = matrix_counts(profile),
        )
    };

    let task = match request {
        ReportRequest::FullPortrait if ru => "Напиши полный нумерологический портрет: характер, \
таланты, отношения, карьера, зоны роста. Используй подзаголовки, 6-8 абзацев."
            .to_string(),
        ReportRequest::FullPortrait => "Write a full numerology portrait: character, talents, \
relationships, career, growth areas. Use subheadings, 6-8 paragraphs."
            .to_string(),
        ReportRequest::FinancialCode if ru => "Разбери финансовый код: отношение к деньгам, \
сильные стороны в заработке, риски, благоприятные периоды этого года и три практических совета."
            .to_string(),
        ReportRequest::FinancialCode => "Analyze the financial code: attitude to money, \
earning strengths, risks, favourable periods this year and three practical tips."
            .to_string(),
        ReportRequest::YearForecast { year } if ru => format!(
            "Составь прогноз на {year} год: общая тема года и короткий прогноз по каждому месяцу."
        ),
        ReportRequest::YearForecast { year } => format!(
            "Write a forecast for {year}: the overall theme of the year and a short outlook for every month."
        ),
        ReportRequest::DateCalendar { month, year } if ru => format!(
            "Составь календарь благоприятных дат на {month:02}.{year}: лучшие дни для важных дел, \
встреч и отдыха, и дни, когда стоит быть осторожнее."
        ),
        ReportRequest::DateCalendar { month, year } => format!(
            "Build a calendar of favourable dates for {month:02}/{year}: best days for important \
matters, meetings and rest, and days to be careful."
        ),
        ReportRequest::NameSelection { context } if ru => format!(
            "Подбери 5-7 имён по нумерологии под запрос пользователя: {context}. \
Для каждого имени укажи его число и почему оно подходит."
        ),
        ReportRequest::NameSelection { context } => format!(
            "Suggest 5-7 names by numerology for the user's request: {context}. \
For each name give its number and why it fits."
        ),
        ReportRequest::CompatibilityPro {
            partner_name,
            scores,
        } => {
            let partner = partner_name.as_deref().unwrap_or(if ru { "партнёр" } else { "partner" });
            let mut task = if ru {
                format!("Сделай расширенный разбор совместимости с {partner}.")
            } else {
                format!("Write an extended compatibility analysis with {partner}.")
            };
            if let Some(scores) = scores {
                let _ = if ru {
                    write!(
                        task,
                        " Общая совместимость {}%, по Числу Судьбы {}%, по Числу Души {}%.",
                        scores.overall_score, scores.life_path_score, scores.soul_score
                    )
                } else {
                    write!(
                        task,
                        " Overall {}%, Life Path {}%, Soul {}%.",
                        scores.overall_score, scores.life_path_score, scores.soul_score
                    )
                };
            }
            task.push_str(if ru {
                " Опиши эмоциональную связь, быт, конфликты и как их решать, перспективы пары."
            } else {
                " Cover emotional connection, daily life, conflicts and how to resolve them, and the pair's prospects."
            });
            task
        }
    };

    prompt.push_str(&task);
    prompt
}

fn matrix_counts(profile: &NumerologyProfile) -> String {
    profile
        .matrix
        .iter()
        .map(|(position, count)| format!("{position}: {count}"))
        .collect::<Vec<_>>()
        .join(", ")
}
