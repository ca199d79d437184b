//! `numerolog` - CLI for the numerology bot
//!
//! This binary runs the webhook and mini-app API server and provides the
//! maintenance commands around it.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use chrono::{Timelike, Utc};
use clap::Parser;

use numerolog::ai::{Interpreter, OpenAiClient};
use numerolog::cli::{
    Cli, Command, ConfigCommand, MigrateReportsCommand, ProfileCommand, ServeCommand,
    WebhookCommand,
};
use numerolog::notifications::Notifier;
use numerolog::server::{self, AppState};
use numerolog::telegram::{BotApi, TelegramClient};
use numerolog::{init_logging, numerology, Api, Bot, Config, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Serve(cmd) => handle_serve(config, &cmd).await,
        Command::Notify(cmd) => {
            let hour = cmd.hour.unwrap_or_else(|| Utc::now().hour());
            handle_notify(&config, hour).await
        }
        Command::Webhook(cmd) => handle_webhook(&config, &cmd).await,
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::MigrateReports(cmd) => handle_migrate(&config, &cmd),
        Command::Profile(cmd) => handle_profile(&cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Arc<Storage>> {
    let path = config.database_path();
    let storage =
        Storage::open(&path).with_context(|| format!("opening {}", path.display()))?;
    Ok(Arc::new(storage))
}

fn interpreter(config: &Config) -> anyhow::Result<Interpreter> {
    let model = OpenAiClient::from_config(&config.openai)?;
    Ok(Interpreter::new(Arc::new(model)))
}

async fn handle_serve(mut config: Config, cmd: &ServeCommand) -> anyhow::Result<()> {
    if let Some(bind) = &cmd.bind {
        config.server.bind_address.clone_from(bind);
    }
    config.validate()?;
    let addr = config.bind_address()?;

    let config = Arc::new(config);
    let storage = open_storage(&config)?;
    let bot_api: Arc<dyn BotApi> = Arc::new(TelegramClient::from_config(&config.telegram)?);
    let interpreter = interpreter(&config)?;

    let bot = Bot::new(
        config.clone(),
        storage.clone(),
        bot_api.clone(),
        interpreter.clone(),
    );
    let api = Api::new(config.clone(), storage, bot_api, interpreter);

    server::serve(AppState::new(config, bot, api), addr).await?;
    Ok(())
}

async fn handle_notify(config: &Config, hour: u32) -> anyhow::Result<()> {
    config.validate()?;
    let storage = open_storage(config)?;
    let bot_api = Arc::new(TelegramClient::from_config(&config.telegram)?);
    let notifier = Notifier::new(storage, bot_api, interpreter(config)?);

    let summary = notifier.send_daily_forecasts(hour, Utc::now()).await?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

async fn handle_webhook(config: &Config, cmd: &WebhookCommand) -> anyhow::Result<()> {
    let client = TelegramClient::from_config(&config.telegram)?;
    match cmd {
        WebhookCommand::Set { url } => {
            client
                .set_webhook(url, config.telegram.webhook_secret.as_deref())
                .await?;
            println!("Webhook set to {url}");
        }
        WebhookCommand::Delete => {
            client.delete_webhook().await?;
            println!("Webhook deleted");
        }
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "users": stats.users,
            "messages": stats.messages,
            "reports": stats.reports,
            "compatibility_results": stats.compatibility_results,
            "locks": stats.locks,
            "total_items": stats.total_items,
            "db_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("numerolog status");
        println!("----------------");
        println!("Database:      {}", config.database_path().display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Users:         {}", stats.users);
        println!("Messages:      {}", stats.messages);
        println!("Reports:       {}", stats.reports);
        println!("Compatibility: {}", stats.compatibility_results);
        println!("Active locks:  {}", stats.locks);
    }
    Ok(())
}

fn handle_migrate(config: &Config, cmd: &MigrateReportsCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;

    if !cmd.apply {
        for row in storage.legacy_report_rows()? {
            println!("would migrate {} {}", row.pk, row.sk);
        }
    }

    let summary = storage.migrate_legacy_reports(cmd.apply, Utc::now())?;
    println!(
        "{}: scanned {}, {} {}, skipped {}",
        if cmd.apply { "Applied" } else { "Dry run" },
        summary.scanned,
        if cmd.apply { "migrated" } else { "to migrate" },
        summary.migrated,
        summary.skipped
    );
    Ok(())
}

fn handle_profile(cmd: &ProfileCommand) -> anyhow::Result<()> {
    let birth_date = numerology::parse_birth_date(&cmd.date)
        .with_context(|| format!("cannot parse birth date {:?}", cmd.date))?;
    let profile = numerology::full_profile(&cmd.name, birth_date, Utc::now().date_naive());

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    println!("{} ({})", cmd.name, birth_date.format("%d.%m.%Y"));
    println!();
    println!("Life path:     {}", profile.life_path);
    println!("Soul:          {}", profile.soul_number);
    println!("Expression:    {}", profile.expression_number);
    println!("Personality:   {}", profile.personality_number);
    println!("Birthday:      {}", profile.birthday_number);
    println!("Maturity:      {}", profile.maturity_number);
    println!(
        "Personal:      year {}, month {}, day {}",
        profile.personal_year, profile.personal_month, profile.personal_day
    );
    println!();
    println!("Matrix:");
    for row in [[1u8, 4, 7], [2, 5, 8], [3, 6, 9]] {
        let cells: Vec<String> = row
            .iter()
            .map(|digit| {
                let count = profile.matrix.get(digit).copied().unwrap_or(0);
                let count = usize::try_from(count).unwrap_or(0);
                if count == 0 {
                    "-".to_string()
                } else {
                    digit.to_string().repeat(count)
                }
            })
            .collect();
        println!("  {:<8}{:<8}{:<8}", cells[0], cells[1], cells[2]);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let mut shown = config.clone();
            mask(&mut shown.telegram.bot_token);
            mask(&mut shown.openai.api_key);
            if let Some(secret) = shown.telegram.webhook_secret.as_mut() {
                mask(secret);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Telegram]");
                println!("  Bot token:          {}", shown.telegram.bot_token);
                println!("  Bot username:       {}", shown.telegram.bot_username);
                println!("  Mini-app URL:       {}", shown.telegram.webapp_url);
                println!();
                println!("[OpenAI]");
                println!("  API key:            {}", shown.openai.api_key);
                println!("  Model:              {}", shown.openai.model);
                println!("  Max retries:        {}", shown.openai.max_retries);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  History limit:      {}", config.storage.history_limit);
                println!();
                println!("[Limits]");
                println!(
                    "  Questions per day:  {}",
                    config.limits.free_questions_per_day
                );
                println!(
                    "  Compat. per week:   {}",
                    config.limits.free_compatibility_per_week
                );
                println!();
                println!("[Pricing]");
                println!(
                    "  LITE / PRO:         {}★ / {}★ for {} days",
                    config.pricing.lite, config.pricing.pro, config.pricing.subscription_days
                );
                println!();
                println!("[Server]");
                println!("  Bind address:       {}", config.server.bind_address);
                println!("  CORS origin:        {}", config.server.cors_origin);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)).and_then(|config| config.validate()) {
                Ok(()) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn mask(secret: &mut String) {
    if !secret.is_empty() {
        *secret = "********".to_string();
    }
}
