use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use super::prompts::{self, ReportRequest};
use super::LanguageModel;
use crate::error::Result;
use crate::models::{ChatMessage, Language};
use crate::numerology::{CompatibilityScores, NumerologyProfile};

/// History messages sent along with a question.
const QUESTION_HISTORY: usize = 10;

/// Turns numerology data into text through a [`LanguageModel`].
#[derive(Clone)]
pub struct Interpreter {
    model: Arc<dyn LanguageModel>,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter").finish_non_exhaustive()
    }
}

impl Interpreter {
    /// Create an interpreter backed by `model`.
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    async fn ask(
        &self,
        language: Language,
        history: &[ChatMessage],
        prompt: String,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(prompts::system_prompt(language)));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(prompt));
        self.model.complete(&messages, max_tokens, temperature).await
    }

    /// Personal profile interpretation.
    ///
    /// # Errors
    ///
    /// Returns an error if the model call fails.
    pub async fn profile_interpretation(
        &self,
        name: &str,
        birth_date: NaiveDate,
        profile: &NumerologyProfile,
        language: Language,
    ) -> Result<String> {
        let prompt = prompts::profile_prompt(name, birth_date, profile, language);
        self.ask(language, &[], prompt, 1000, 0.7).await
    }

    /// Answer a question, with the tail of the conversation as context.
    ///
    /// # Errors
    ///
    /// Returns an error if the model call fails.
    pub async fn answer_question(
        &self,
        name: &str,
        profile: &NumerologyProfile,
        question: &str,
        history: &[ChatMessage],
        language: Language,
    ) -> Result<String> {
        let recent = &history[history.len().saturating_sub(QUESTION_HISTORY)..];
        let prompt = prompts::question_prompt(name, profile, question, language);
        self.ask(language, recent, prompt, 800, 0.7).await
    }

    /// Short forecast for the current day.
    ///
    /// # Errors
    ///
    /// Returns an error if the model call fails.
    pub async fn daily_forecast(
        &self,
        name: &str,
        profile: &NumerologyProfile,
        language: Language,
    ) -> Result<String> {
        let prompt = prompts::daily_forecast_prompt(name, profile, language);
        self.ask(language, &[], prompt, 300, 0.8).await
    }

    /// Analysis of compatibility scores.
    ///
    /// # Errors
    ///
    /// Returns an error if the model call fails.
    pub async fn compatibility_analysis(
        &self,
        scores: &CompatibilityScores,
        partner_date: Option<NaiveDate>,
        language: Language,
    ) -> Result<String> {
        let prompt = prompts::compatibility_prompt(scores, partner_date, language);
        self.ask(language, &[], prompt, 600, 0.7).await
    }

    /// Premium report text.
    ///
    /// # Errors
    ///
    /// Returns an error if the model call fails.
    pub async fn report(
        &self,
        request: &ReportRequest,
        name: &str,
        birth_date: NaiveDate,
        profile: &NumerologyProfile,
        language: Language,
    ) -> Result<String> {
        debug!("Generating report {:?}", request);
        let prompt = prompts::report_prompt(request, name, birth_date, profile, language);
        self.ask(language, &[], prompt, 2000, 0.7).await
    }
}
