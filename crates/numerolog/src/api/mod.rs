//! REST facade for the mini-app.
//!
//! Requests are authenticated with the signed `initData` the client gets from
//! Telegram. Paths are matched from `/api/` on, so a deployment stage prefix
//! such as `/prod/api/user` routes the same as `/api/user`.

pub mod init_data;

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use warp::http::{Method, StatusCode};

use crate::ai::{Interpreter, ReportRequest};
use crate::catalog::{self, Product, ReportSpec, PROFILE_INTERPRETATION, REPORTS};
use crate::config::Config;
use crate::error::Error;
use crate::models::{Language, StoredReport, User};
use crate::numerology;
use crate::storage::Storage;
use crate::telegram::BotApi;

/// Header carrying the signed init data.
pub const INIT_DATA_HEADER: &str = "X-Telegram-Init-Data";

/// An incoming API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Request path, possibly with a stage prefix.
    pub path: String,
    /// Value of [`INIT_DATA_HEADER`].
    pub init_data: Option<String>,
    /// Raw body.
    pub body: Vec<u8>,
}

/// Result of an API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// JSON body; `None` for an empty body.
    pub body: Option<Value>,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: Some(body),
        }
    }
}

/// CORS headers attached to every API response.
#[must_use]
pub fn cors_headers(origin: &str) -> [(&'static str, String); 3] {
    [
        ("Access-Control-Allow-Origin", origin.to_string()),
        (
            "Access-Control-Allow-Methods",
            "GET, PUT, POST, DELETE, OPTIONS".to_string(),
        ),
        (
            "Access-Control-Allow-Headers",
            format!("Content-Type, {INIT_DATA_HEADER}"),
        ),
    ]
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn into_response(self) -> ApiResponse {
        ApiResponse {
            status: self.status,
            body: Some(json!({ "error": self.message })),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        error!("API request failed: {}", err);
        if err.is_llm_error() {
            Self::new(StatusCode::BAD_GATEWAY, "Generation failed")
        } else {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

type Reply = std::result::Result<Value, ApiError>;

/// Known API paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    User,
    UserSettings,
    UserInterpretation,
    Payments,
    Compatibility,
    CompatibilityResult(&'a str),
    CompatibilityInterpret(&'a str),
    Reports,
    Report {
        report_id: &'a str,
        instance_id: Option<&'a str>,
    },
    GenerateReport(&'a str),
    Invoice,
}

impl<'a> Route<'a> {
    fn parse(path: &'a str) -> Option<Self> {
        let (_, rest) = path.split_once("/api/")?;
        let segments: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        let route = match *segments.as_slice() {
            ["user"] => Self::User,
            ["user", "settings"] => Self::UserSettings,
            ["user", "interpretation"] => Self::UserInterpretation,
            ["payments"] => Self::Payments,
            ["compatibility"] => Self::Compatibility,
            ["compatibility", id] if !id.is_empty() => Self::CompatibilityResult(id),
            ["compatibility", id, "interpret"] if !id.is_empty() => {
                Self::CompatibilityInterpret(id)
            }
            ["reports"] => Self::Reports,
            ["reports", id] if !id.is_empty() => Self::Report {
                report_id: id,
                instance_id: None,
            },
            ["reports", id, "generate"] if !id.is_empty() => Self::GenerateReport(id),
            ["reports", id, instance] if !id.is_empty() && !instance.is_empty() => Self::Report {
                report_id: id,
                instance_id: Some(instance),
            },
            ["invoice"] => Self::Invoice,
            _ => return None,
        };
        Some(route)
    }

    fn allows(self, method: &Method) -> bool {
        let allowed: &[Method] = match self {
            Self::User
            | Self::UserInterpretation
            | Self::Payments
            | Self::Reports
            | Self::Report {
                instance_id: None, ..
            } => &[Method::GET],
            Self::UserSettings => &[Method::PUT],
            Self::Compatibility => &[Method::GET, Method::POST],
            Self::CompatibilityResult(_)
            | Self::Report {
                instance_id: Some(_),
                ..
            } => &[Method::GET, Method::DELETE],
            Self::CompatibilityInterpret(_) | Self::GenerateReport(_) | Self::Invoice => {
                &[Method::POST]
            }
        };
        allowed.contains(method)
    }
}

/// Whether `HH:MM` is a valid time of day.
fn is_valid_time(value: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("Invalid regex pattern"))
        .is_match(value)
}

fn report_json(spec: &ReportSpec, report: &StoredReport) -> Value {
    let mut body = json!({
        "id": spec.id,
        "title_ru": spec.name_ru,
        "title_en": spec.name_en,
        "content": report.content,
        "generated_at": report.created_at,
    });
    if spec.multi_instance {
        body["instance_id"] = json!(report.instance_id);
        body["context"] = report.context.clone();
    }
    body
}

/// Serves mini-app requests.
#[derive(Clone)]
pub struct Api {
    config: Arc<Config>,
    storage: Arc<Storage>,
    bot_api: Arc<dyn BotApi>,
    interpreter: Interpreter,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl Api {
    /// Create the API facade.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        storage: Arc<Storage>,
        bot_api: Arc<dyn BotApi>,
        interpreter: Interpreter,
    ) -> Self {
        Self {
            config,
            storage,
            bot_api,
            interpreter,
        }
    }

    /// Handle one request. Failures become JSON error responses.
    pub async fn handle(&self, request: &ApiRequest, now: DateTime<Utc>) -> ApiResponse {
        if request.method == Method::OPTIONS {
            return ApiResponse {
                status: StatusCode::OK,
                body: None,
            };
        }

        let telegram_id = match init_data::validate(
            request.init_data.as_deref(),
            &self.config.telegram.bot_token,
        ) {
            Ok(id) => id,
            Err(e) => {
                debug!("Rejected API request to {}: {:?}", request.path, e);
                return ApiError::new(StatusCode::UNAUTHORIZED, e.message()).into_response();
            }
        };

        let Some(route) = Route::parse(&request.path) else {
            return ApiError::not_found("Not found").into_response();
        };
        if !route.allows(&request.method) {
            return ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
                .into_response();
        }

        let body = if request.body.is_empty() {
            json!({})
        } else {
            match serde_json::from_slice(&request.body) {
                Ok(body) => body,
                Err(_) => return ApiError::bad_request("Invalid JSON").into_response(),
            }
        };

        debug!("API {} {:?} for {}", request.method, route, telegram_id);
        match self.dispatch(route, &request.method, telegram_id, &body, now).await {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => e.into_response(),
        }
    }

    async fn dispatch(
        &self,
        route: Route<'_>,
        method: &Method,
        telegram_id: i64,
        body: &Value,
        now: DateTime<Utc>,
    ) -> Reply {
        match route {
            Route::User => self.get_user(telegram_id, now),
            Route::UserSettings => self.update_settings(telegram_id, body),
            Route::UserInterpretation => self.interpretation(telegram_id, now).await,
            Route::Payments => self.payments(telegram_id),
            Route::Compatibility if method == Method::POST => {
                self.create_compatibility(telegram_id, body, now)
            }
            Route::Compatibility => self.compatibility_history(telegram_id),
            Route::CompatibilityResult(id) if method == Method::DELETE => {
                self.delete_compatibility(telegram_id, id)
            }
            Route::CompatibilityResult(id) => self.compatibility_result(telegram_id, id),
            Route::CompatibilityInterpret(id) => self.interpret_compatibility(telegram_id, id).await,
            Route::Reports => self.reports(telegram_id, now),
            Route::Report {
                report_id,
                instance_id: Some(instance_id),
            } if method == Method::DELETE => {
                self.delete_report_instance(telegram_id, report_id, instance_id, now)
            }
            Route::Report {
                report_id,
                instance_id,
            } => self.report_content(telegram_id, report_id, instance_id, now),
            Route::GenerateReport(report_id) => {
                self.generate_report(telegram_id, report_id, body, now)
                    .await
            }
            Route::Invoice => self.create_invoice(telegram_id, body).await,
        }
    }

    // === Helpers ===

    fn user(&self, telegram_id: i64) -> std::result::Result<User, ApiError> {
        self.storage
            .get_user(telegram_id)?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// The user with name and birth date.
    fn onboarded_user(
        &self,
        telegram_id: i64,
    ) -> std::result::Result<(User, String, NaiveDate), ApiError> {
        let user = self
            .storage
            .get_user(telegram_id)?
            .ok_or_else(|| ApiError::bad_request("User not onboarded"))?;
        let (name, birth_date) = user
            .identity()
            .map(|(name, date)| (name.to_string(), date))
            .ok_or_else(|| ApiError::bad_request("User not onboarded"))?;
        Ok((user, name, birth_date))
    }

    fn report_spec(report_id: &str) -> std::result::Result<&'static ReportSpec, ApiError> {
        catalog::find_report(report_id).ok_or_else(|| ApiError::not_found("Unknown report type"))
    }

    // === User ===

    fn get_user(&self, telegram_id: i64, now: DateTime<Utc>) -> Reply {
        let user = self.user(telegram_id)?;
        let today = now.date_naive();
        let limits = &self.config.limits;

        let numerology = match user.identity() {
            Some((name, birth_date)) => {
                serde_json::to_value(numerology::full_profile(name, birth_date, today))
                    .map_err(Error::from)?
            }
            None => Value::Null,
        };

        Ok(json!({
            "is_onboarded": user.is_onboarded(),
            "user": {
                "name": user.name,
                "birth_date": user.birth_date,
                "language": user.language,
                "notifications_enabled": user.notifications_enabled,
                "notification_time": user.notification_time,
                "created_at": user.created_at,
            },
            "subscription": {
                "type": user.subscription_type,
                "expires": user.subscription_expires,
                "is_active": user.is_premium(now),
            },
            "referral": {
                "code": user.referral_code,
                "link": format!(
                    "https://t.me/{}?start=ref_{}",
                    self.config.telegram.bot_username, user.referral_code
                ),
                "referrals_count": user.referrals_count,
                "questions_bonus": user.questions_bonus,
            },
            "reports": {
                "purchased": user.purchased_reports,
                "available": REPORTS.iter().map(|report| report.id).collect::<Vec<_>>(),
            },
            "limits": {
                "questions_today": user.questions_used(today),
                "questions_limit": limits.free_questions_per_day,
                "compatibility_this_week": user.compatibility_used(today),
                "compatibility_limit": limits.free_compatibility_per_week,
            },
            "numerology": numerology,
        }))
    }

    fn update_settings(&self, telegram_id: i64, body: &Value) -> Reply {
        let mut user = self.user(telegram_id)?;

        if let Some(language) = body
            .get("language")
            .and_then(Value::as_str)
            .and_then(|value| value.parse::<Language>().ok())
        {
            user.language = language;
        }
        if let Some(enabled) = body.get("notifications_enabled").and_then(Value::as_bool) {
            user.notifications_enabled = enabled;
        }
        if let Some(time) = body
            .get("notification_time")
            .and_then(Value::as_str)
            .filter(|time| is_valid_time(time))
        {
            user.notification_time = time.to_string();
        }

        self.storage.put_user(&user)?;
        Ok(json!({ "success": true }))
    }

    async fn interpretation(&self, telegram_id: i64, now: DateTime<Utc>) -> Reply {
        let (user, name, birth_date) = self.onboarded_user(telegram_id)?;
        if let Some(cached) = self.storage.get_report(telegram_id, PROFILE_INTERPRETATION)? {
            return Ok(json!({ "interpretation": cached.content }));
        }

        let profile = numerology::full_profile(&name, birth_date, now.date_naive());
        let text = self
            .interpreter
            .profile_interpretation(&name, birth_date, &profile, user.language)
            .await?;
        self.storage
            .save_report(telegram_id, PROFILE_INTERPRETATION, &text, now)?;
        Ok(json!({ "interpretation": text }))
    }

    fn payments(&self, telegram_id: i64) -> Reply {
        let user = self.user(telegram_id)?;
        Ok(json!({ "payments": user.payment_history }))
    }

    // === Compatibility ===

    fn compatibility_history(&self, telegram_id: i64) -> Reply {
        self.user(telegram_id)?;
        let history = self.storage.compatibility_history(telegram_id)?;
        Ok(json!({ "compatibility": history }))
    }

    fn create_compatibility(&self, telegram_id: i64, body: &Value, now: DateTime<Utc>) -> Reply {
        let (mut user, _, birth_date) = self.onboarded_user(telegram_id)?;
        if !user.can_check_compatibility(now, self.config.limits.free_compatibility_per_week) {
            return Err(ApiError::forbidden("Limit reached"));
        }

        let partner_date = body
            .get("partner_date")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::bad_request("Missing partner_date"))?;
        let partner_date = NaiveDate::parse_from_str(partner_date, "%Y-%m-%d")
            .map_err(|_| ApiError::bad_request("Invalid partner_date"))?;

        if !user.is_premium(now) {
            user.record_compatibility(now.date_naive());
            self.storage.put_user(&user)?;
        }

        let scores = numerology::compatibility(birth_date, partner_date);
        let record = self
            .storage
            .save_compatibility(telegram_id, partner_date, scores, now)?;
        Ok(json!({ "result_id": record.id, "scores": scores }))
    }

    fn compatibility_result(&self, telegram_id: i64, result_id: &str) -> Reply {
        self.user(telegram_id)?;
        let record = self
            .storage
            .get_compatibility(telegram_id, result_id)?
            .ok_or_else(|| ApiError::not_found("Result not found"))?;
        Ok(serde_json::to_value(record).map_err(Error::from)?)
    }

    fn delete_compatibility(&self, telegram_id: i64, result_id: &str) -> Reply {
        self.user(telegram_id)?;
        if !self.storage.delete_compatibility(telegram_id, result_id)? {
            return Err(ApiError::not_found("Result not found"));
        }
        Ok(json!({ "success": true }))
    }

    async fn interpret_compatibility(&self, telegram_id: i64, result_id: &str) -> Reply {
        let (user, _, _) = self.onboarded_user(telegram_id)?;
        let record = self
            .storage
            .get_compatibility(telegram_id, result_id)?
            .ok_or_else(|| ApiError::not_found("Result not found"))?;
        if let Some(cached) = record.ai_interpretation {
            return Ok(json!({ "interpretation": cached }));
        }

        let text = self
            .interpreter
            .compatibility_analysis(&record.scores, Some(record.partner_date), user.language)
            .await?;
        self.storage
            .set_compatibility_interpretation(telegram_id, result_id, &text)?;
        Ok(json!({ "interpretation": text }))
    }

    // === Reports ===

    fn reports(&self, telegram_id: i64, now: DateTime<Utc>) -> Reply {
        let user = self.user(telegram_id)?;
        let is_pro = user.is_pro(now);

        let mut reports = Vec::with_capacity(REPORTS.len());
        for spec in &REPORTS {
            let status = if user.purchased_reports.iter().any(|id| id == spec.id) {
                "purchased"
            } else if is_pro {
                "included_in_pro"
            } else {
                "available"
            };
            let accessible = status != "available";

            let mut entry = json!({
                "id": spec.id,
                "name_ru": spec.name_ru,
                "name_en": spec.name_en,
                "price": spec.price,
                "status": status,
                "requires_input": spec.requires_input,
                "multi_instance": spec.multi_instance,
            });

            if spec.multi_instance && accessible {
                let instances: Vec<Value> = self
                    .storage
                    .report_instances(telegram_id, spec.id)?
                    .into_iter()
                    .map(|instance| {
                        json!({
                            "instance_id": instance.instance_id,
                            "context": instance.context,
                            "created_at": instance.created_at,
                        })
                    })
                    .collect();
                entry["instance_count"] = json!(instances.len());
                entry["is_generated"] = json!(!instances.is_empty());
                entry["instances"] = Value::Array(instances);
            } else {
                let generated =
                    accessible && self.storage.get_report(telegram_id, spec.id)?.is_some();
                entry["is_generated"] = json!(generated);
            }
            reports.push(entry);
        }

        Ok(json!({ "reports": reports }))
    }

    fn report_content(
        &self,
        telegram_id: i64,
        report_id: &str,
        instance_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Reply {
        let user = self.user(telegram_id)?;
        let spec = Self::report_spec(report_id)?;
        if !user.has_report(report_id, now) {
            return Err(ApiError::forbidden("Report not purchased"));
        }

        let report = match (spec.multi_instance, instance_id) {
            (true, Some(instance_id)) => {
                self.storage
                    .get_report_instance(telegram_id, report_id, instance_id)?
            }
            (true, None) => self
                .storage
                .report_instances(telegram_id, report_id)?
                .into_iter()
                .next(),
            (false, _) => self.storage.get_report(telegram_id, report_id)?,
        };
        let report = report.ok_or_else(|| ApiError::not_found("Report not generated yet"))?;
        Ok(report_json(spec, &report))
    }

    fn delete_report_instance(
        &self,
        telegram_id: i64,
        report_id: &str,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> Reply {
        let user = self.user(telegram_id)?;
        let spec = Self::report_spec(report_id)?;
        if !spec.multi_instance {
            return Err(ApiError::bad_request("Cannot delete single-instance report"));
        }
        if !user.has_report(report_id, now) {
            return Err(ApiError::forbidden("Report not purchased"));
        }
        if !self
            .storage
            .delete_report_instance(telegram_id, report_id, instance_id)?
        {
            return Err(ApiError::not_found("Report instance not found"));
        }
        Ok(json!({ "success": true }))
    }

    async fn generate_report(
        &self,
        telegram_id: i64,
        report_id: &str,
        body: &Value,
        now: DateTime<Utc>,
    ) -> Reply {
        let (user, name, birth_date) = self.onboarded_user(telegram_id)?;
        let spec = Self::report_spec(report_id)?;
        if !user.has_report(report_id, now) {
            return Err(ApiError::forbidden("Report not purchased"));
        }

        let context = body.get("context").cloned().unwrap_or_else(|| json!({}));
        let today = now.date_naive();
        let request = ReportRequest::from_context(report_id, &context, birth_date, today)
            .ok_or_else(|| ApiError::bad_request("Unknown report type"))?;

        let ttl = self.config.report_lock_ttl();
        if !self
            .storage
            .try_acquire_report_lock(telegram_id, report_id, now, ttl)?
        {
            debug!("Report {} for {} is already generating", report_id, telegram_id);
            return Ok(json!({ "status": "generating" }));
        }

        let profile = numerology::full_profile(&name, birth_date, today);
        let generated = self
            .interpreter
            .report(&request, &name, birth_date, &profile, user.language)
            .await;
        let stored = generated.and_then(|content| {
            let instance_id = if spec.multi_instance {
                Some(self.storage.save_report_instance(
                    telegram_id,
                    report_id,
                    &content,
                    &context,
                    now,
                )?)
            } else {
                self.storage.save_report(telegram_id, report_id, &content, now)?;
                None
            };
            Ok((instance_id, content))
        });

        if let Err(e) = self.storage.release_report_lock(telegram_id, report_id) {
            warn!("Failed to release lock on {} for {}: {}", report_id, telegram_id, e);
        }
        let (instance_id, content) = stored?;

        // Re-read: the user may have changed while the report was generating.
        if let Some(mut fresh) = self.storage.get_user(telegram_id)? {
            if fresh.add_purchased_report(report_id) {
                self.storage.put_user(&fresh)?;
            }
        }

        Ok(json!({
            "status": "completed",
            "instance_id": instance_id,
            "content": content,
        }))
    }

    // === Payments ===

    async fn create_invoice(&self, telegram_id: i64, body: &Value) -> Reply {
        let user = self.user(telegram_id)?;
        let payload = body
            .get("type")
            .and_then(Value::as_str)
            .filter(|payload| !payload.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing product type"))?;
        let product: Product = payload
            .parse()
            .map_err(|_| ApiError::bad_request("Invalid product type"))?;

        let invoice = product.invoice(user.language, &self.config.pricing);
        let link = self.bot_api.create_invoice_link(&invoice).await?;
        Ok(json!({ "invoice_url": link }))
    }
}
