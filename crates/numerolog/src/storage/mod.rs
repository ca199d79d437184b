//! Storage layer for numerolog.
//!
//! Users, conversations, reports, compatibility results and locks all live in
//! one `SQLite` key-value table (see [`keys`] for the layout). Each item is a
//! JSON document addressed by a partition key and a sort key.

mod keys;
pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::config::ReferralConfig;
use crate::error::{Error, Result};
use crate::models::{
    ChatMessage, CompatibilityRecord, FlowState, Language, StoredReport, User,
};
use crate::numerology::CompatibilityScores;

use keys::{PROFILE, REFCODE_USER, STATE};

/// Attempts at drawing a referral code that is not taken yet.
const REFERRAL_CODE_ATTEMPTS: usize = 5;

/// Rows with a sort key starting with a prefix, in insertion order.
const PREFIX_QUERY_ASC: &str = r"
SELECT sk, data FROM items
WHERE pk = ?1 AND substr(sk, 1, length(?2)) = ?2
ORDER BY rowid ASC LIMIT ?3
";

/// Rows with a sort key starting with a prefix, newest first.
const PREFIX_QUERY_DESC: &str = r"
SELECT sk, data FROM items
WHERE pk = ?1 AND substr(sk, 1, length(?2)) = ?2
ORDER BY rowid DESC LIMIT ?3
";

/// Storage engine for all per-user state.
///
/// The connection sits behind a mutex so one `Storage` can be shared by the
/// webhook and API handlers. The guard is never held across an `.await`.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

/// Referral code index item.
#[derive(Debug, Serialize, Deserialize)]
struct ReferralCodeItem {
    telegram_id: i64,
}

/// Conversation message item.
#[derive(Debug, Serialize, Deserialize)]
struct MessageItem {
    #[serde(flatten)]
    message: ChatMessage,
    timestamp: DateTime<Utc>,
}

/// Report generation lock item.
#[derive(Debug, Serialize, Deserialize)]
struct LockItem {
    acquired_at: DateTime<Utc>,
}

/// A report stored under the single-instance key of a multi-instance type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyReport {
    /// Partition key of the owning user.
    pub pk: String,
    /// Current sort key.
    pub sk: String,
    /// Report type.
    pub report_type: String,
}

/// Outcome of a legacy report migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Report rows examined.
    pub scanned: usize,
    /// Rows converted (or that would be, on a dry run).
    pub migrated: usize,
    /// Rows already in the current layout.
    pub skipped: usize,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets the notifier read while the server writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("storage connection mutex poisoned"))
    }

    // === Users ===

    /// Get a user by Telegram id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the record is corrupt.
    pub fn get_user(&self, telegram_id: i64) -> Result<Option<User>> {
        let conn = self.connection()?;
        get_item(&conn, &keys::user_pk(telegram_id), PROFILE)
    }

    /// Insert or replace a user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_user(&self, user: &User) -> Result<()> {
        let conn = self.connection()?;
        put_item(&conn, &keys::user_pk(user.telegram_id), PROFILE, user)
    }

    /// Create a user with a fresh referral code.
    ///
    /// When `referred_by` names another existing user, that user is credited
    /// with the referral reward. An existing user is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn create_user(
        &self,
        telegram_id: i64,
        language: Language,
        referred_by: Option<i64>,
        reward: &ReferralConfig,
        now: DateTime<Utc>,
    ) -> Result<User> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let pk = keys::user_pk(telegram_id);
        if let Some(existing) = get_item::<User>(&tx, &pk, PROFILE)? {
            debug!("User {} already exists", telegram_id);
            return Ok(existing);
        }

        let mut user = User::new(telegram_id, language, now);
        user.referral_code = unused_referral_code(&tx)?;

        let referrer_id = referred_by.filter(|id| *id != telegram_id);
        if let Some(referrer_id) = referrer_id {
            let referrer_pk = keys::user_pk(referrer_id);
            match get_item::<User>(&tx, &referrer_pk, PROFILE)? {
                Some(mut referrer) => {
                    credit_referral(&mut referrer, reward);
                    put_item(&tx, &referrer_pk, PROFILE, &referrer)?;
                    user.referred_by = Some(referrer_id);
                    info!(
                        "User {} credited for referring {} ({} referrals)",
                        referrer_id, telegram_id, referrer.referrals_count
                    );
                }
                None => warn!("Referrer {} not found for user {}", referrer_id, telegram_id),
            }
        }

        put_item(&tx, &pk, PROFILE, &user)?;
        put_item(
            &tx,
            &keys::refcode_pk(&user.referral_code),
            REFCODE_USER,
            &ReferralCodeItem { telegram_id },
        )?;
        tx.commit()?;

        info!("Created user {}", telegram_id);
        Ok(user)
    }

    /// Resolve a referral code to its owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>> {
        let conn = self.connection()?;
        let index: Option<ReferralCodeItem> = get_item(
            &conn,
            &keys::refcode_pk(&code.to_ascii_uppercase()),
            REFCODE_USER,
        )?;
        match index {
            Some(item) => get_item(&conn, &keys::user_pk(item.telegram_id), PROFILE),
            None => Ok(None),
        }
    }

    /// List all users. Corrupt records are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.connection()?;
        let mut stmt =
            conn.prepare("SELECT pk, data FROM items WHERE sk = ?1 ORDER BY rowid ASC")?;
        let rows = stmt
            .query_map([PROFILE], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let users = rows
            .into_iter()
            .filter_map(|(pk, data)| match decode::<User>(&pk, PROFILE, &data) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("Skipping user: {}", e);
                    None
                }
            })
            .collect();
        Ok(users)
    }

    /// Onboarded users with notifications on whose delivery time falls in `hour`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn users_for_notifications(&self, hour: u32) -> Result<Vec<User>> {
        let hour_prefix = format!("{hour:02}:");
        Ok(self
            .list_users()?
            .into_iter()
            .filter(|user| {
                user.notifications_enabled
                    && user.is_onboarded()
                    && user.notification_time.starts_with(&hour_prefix)
            })
            .collect())
    }

    // === Flow state ===

    /// Get the pending input flow of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_flow_state(&self, telegram_id: i64) -> Result<Option<FlowState>> {
        let conn = self.connection()?;
        get_item(&conn, &keys::user_pk(telegram_id), STATE)
    }

    /// Set the pending input flow of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_flow_state(&self, telegram_id: i64, state: &FlowState) -> Result<()> {
        let conn = self.connection()?;
        put_item(&conn, &keys::user_pk(telegram_id), STATE, state)
    }

    /// Clear the pending input flow of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear_flow_state(&self, telegram_id: i64) -> Result<()> {
        let conn = self.connection()?;
        delete_item(&conn, &keys::user_pk(telegram_id), STATE)?;
        Ok(())
    }

    // === Conversation ===

    /// Append a message to a user's conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_message(
        &self,
        telegram_id: i64,
        message: &ChatMessage,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.connection()?;
        let item = MessageItem {
            message: message.clone(),
            timestamp: now,
        };
        put_item(
            &conn,
            &keys::user_pk(telegram_id),
            &keys::message_sk(now, &keys::new_id()),
            &item,
        )
    }

    /// The most recent `limit` messages, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn conversation_history(&self, telegram_id: i64, limit: usize) -> Result<Vec<ChatMessage>> {
        let conn = self.connection()?;
        let pk = keys::user_pk(telegram_id);
        let mut messages = query_prefix::<MessageItem>(&conn, &pk, keys::MSG_PREFIX, true, Some(limit))?
            .into_iter()
            .map(|(_, item)| item.message)
            .collect::<Vec<_>>();
        messages.reverse();
        Ok(messages)
    }

    // === Reports ===

    /// Store a single-instance report, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_report(
        &self,
        telegram_id: i64,
        report_type: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.connection()?;
        let report = StoredReport {
            content: content.to_string(),
            created_at: now,
            instance_id: None,
            context: serde_json::Value::Null,
        };
        put_item(
            &conn,
            &keys::user_pk(telegram_id),
            &keys::report_sk(report_type),
            &report,
        )
    }

    /// Get a single-instance report.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_report(&self, telegram_id: i64, report_type: &str) -> Result<Option<StoredReport>> {
        let conn = self.connection()?;
        get_item(&conn, &keys::user_pk(telegram_id), &keys::report_sk(report_type))
    }

    /// Store a new instance of a multi-instance report and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_report_instance(
        &self,
        telegram_id: i64,
        report_type: &str,
        content: &str,
        context: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let conn = self.connection()?;
        let instance_id = keys::new_id();
        let report = StoredReport {
            content: content.to_string(),
            created_at: now,
            instance_id: Some(instance_id.clone()),
            context: context.clone(),
        };
        put_item(
            &conn,
            &keys::user_pk(telegram_id),
            &keys::report_instance_sk(report_type, &instance_id),
            &report,
        )?;
        debug!(
            "Saved {} instance {} for user {}",
            report_type, instance_id, telegram_id
        );
        Ok(instance_id)
    }

    /// Get one instance of a multi-instance report.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_report_instance(
        &self,
        telegram_id: i64,
        report_type: &str,
        instance_id: &str,
    ) -> Result<Option<StoredReport>> {
        let conn = self.connection()?;
        get_item(
            &conn,
            &keys::user_pk(telegram_id),
            &keys::report_instance_sk(report_type, instance_id),
        )
    }

    /// All instances of a report type, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn report_instances(&self, telegram_id: i64, report_type: &str) -> Result<Vec<StoredReport>> {
        let conn = self.connection()?;
        Ok(query_prefix::<StoredReport>(
            &conn,
            &keys::user_pk(telegram_id),
            &keys::report_instance_prefix(report_type),
            true,
            None,
        )?
        .into_iter()
        .map(|(_, report)| report)
        .collect())
    }

    /// Delete one report instance. Returns `false` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_report_instance(
        &self,
        telegram_id: i64,
        report_type: &str,
        instance_id: &str,
    ) -> Result<bool> {
        let conn = self.connection()?;
        delete_item(
            &conn,
            &keys::user_pk(telegram_id),
            &keys::report_instance_sk(report_type, instance_id),
        )
    }

    // === Report generation locks ===

    /// Take the generation lock of a report type.
    ///
    /// Returns `false` while another holder's lock is younger than `ttl`;
    /// older locks are treated as abandoned and taken over.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn try_acquire_report_lock(
        &self,
        telegram_id: i64,
        report_type: &str,
        now: DateTime<Utc>,
        ttl: std::time::Duration,
    ) -> Result<bool> {
        let conn = self.connection()?;
        let pk = keys::user_pk(telegram_id);
        let sk = keys::lock_sk(report_type);

        if let Some(lock) = get_item::<LockItem>(&conn, &pk, &sk)? {
            if lock_is_live(&lock, now, ttl) {
                return Ok(false);
            }
            warn!(
                "Taking over stale {} lock of user {} from {}",
                report_type, telegram_id, lock.acquired_at
            );
        }

        put_item(&conn, &pk, &sk, &LockItem { acquired_at: now })?;
        Ok(true)
    }

    /// Release the generation lock of a report type.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn release_report_lock(&self, telegram_id: i64, report_type: &str) -> Result<bool> {
        let conn = self.connection()?;
        delete_item(&conn, &keys::user_pk(telegram_id), &keys::lock_sk(report_type))
    }

    /// Whether a live generation lock exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn is_report_locked(
        &self,
        telegram_id: i64,
        report_type: &str,
        now: DateTime<Utc>,
        ttl: std::time::Duration,
    ) -> Result<bool> {
        let conn = self.connection()?;
        let lock: Option<LockItem> =
            get_item(&conn, &keys::user_pk(telegram_id), &keys::lock_sk(report_type))?;
        Ok(lock.is_some_and(|lock| lock_is_live(&lock, now, ttl)))
    }

    // === Compatibility ===

    /// Store a compatibility result.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_compatibility(
        &self,
        telegram_id: i64,
        partner_date: NaiveDate,
        scores: CompatibilityScores,
        now: DateTime<Utc>,
    ) -> Result<CompatibilityRecord> {
        let conn = self.connection()?;
        let record = CompatibilityRecord {
            id: keys::new_id(),
            partner_date,
            scores,
            ai_interpretation: None,
            created_at: now,
        };
        put_item(
            &conn,
            &keys::user_pk(telegram_id),
            &keys::compat_sk(&record.id),
            &record,
        )?;
        Ok(record)
    }

    /// Get a compatibility result.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_compatibility(
        &self,
        telegram_id: i64,
        result_id: &str,
    ) -> Result<Option<CompatibilityRecord>> {
        let conn = self.connection()?;
        get_item(&conn, &keys::user_pk(telegram_id), &keys::compat_sk(result_id))
    }

    /// All compatibility results of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn compatibility_history(&self, telegram_id: i64) -> Result<Vec<CompatibilityRecord>> {
        let conn = self.connection()?;
        Ok(query_prefix::<CompatibilityRecord>(
            &conn,
            &keys::user_pk(telegram_id),
            keys::COMPAT_PREFIX,
            true,
            None,
        )?
        .into_iter()
        .map(|(_, record)| record)
        .collect())
    }

    /// Cache the language model analysis on a result.
    /// Returns `false` when the result does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_compatibility_interpretation(
        &self,
        telegram_id: i64,
        result_id: &str,
        interpretation: &str,
    ) -> Result<bool> {
        let conn = self.connection()?;
        let pk = keys::user_pk(telegram_id);
        let sk = keys::compat_sk(result_id);
        let Some(mut record) = get_item::<CompatibilityRecord>(&conn, &pk, &sk)? else {
            return Ok(false);
        };
        record.ai_interpretation = Some(interpretation.to_string());
        put_item(&conn, &pk, &sk, &record)?;
        Ok(true)
    }

    /// Delete a compatibility result.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_compatibility(&self, telegram_id: i64, result_id: &str) -> Result<bool> {
        let conn = self.connection()?;
        delete_item(&conn, &keys::user_pk(telegram_id), &keys::compat_sk(result_id))
    }

    // === Maintenance ===

    /// Report rows of multi-instance types still stored under a single-instance key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn legacy_report_rows(&self) -> Result<Vec<LegacyReport>> {
        let conn = self.connection()?;
        Ok(legacy_rows(&conn)?.1)
    }

    /// Move legacy report rows to instance keys.
    ///
    /// Each converted row gets a new instance id and a context marked
    /// `migrated`. Nothing is written unless `apply` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn migrate_legacy_reports(
        &self,
        apply: bool,
        now: DateTime<Utc>,
    ) -> Result<MigrationSummary> {
        let mut conn = self.connection()?;
        let (scanned, rows) = legacy_rows(&conn)?;
        let summary = MigrationSummary {
            scanned,
            migrated: rows.len(),
            skipped: scanned - rows.len(),
        };

        if !apply {
            return Ok(summary);
        }

        let tx = conn.transaction()?;
        for row in &rows {
            let Some(mut report) = get_item::<StoredReport>(&tx, &row.pk, &row.sk)? else {
                continue;
            };
            let instance_id = keys::new_id();
            report.instance_id = Some(instance_id.clone());
            report.context = migrated_context(&row.report_type, now);

            let new_sk = keys::report_instance_sk(&row.report_type, &instance_id);
            put_item(&tx, &row.pk, &new_sk, &report)?;
            delete_item(&tx, &row.pk, &row.sk)?;
            info!("Migrated {} {} -> {}", row.pk, row.sk, new_sk);
        }
        tx.commit()?;

        Ok(summary)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let conn = self.connection()?;
        let mut stats = conn.query_row(
            r"
            SELECT
                COUNT(*),
                COALESCE(SUM(sk = 'PROFILE'), 0),
                COALESCE(SUM(substr(sk, 1, 4) = 'MSG#'), 0),
                COALESCE(SUM(substr(sk, 1, 7) = 'REPORT#'), 0),
                COALESCE(SUM(substr(sk, 1, 7) = 'COMPAT#'), 0),
                COALESCE(SUM(substr(sk, 1, 5) = 'LOCK#'), 0),
                COALESCE(SUM(substr(pk, 1, 8) = 'REFCODE#'), 0)
            FROM items
            ",
            [],
            |row| {
                Ok(StorageStats {
                    total_items: row.get(0)?,
                    users: row.get(1)?,
                    messages: row.get(2)?,
                    reports: row.get(3)?,
                    compatibility_results: row.get(4)?,
                    locks: row.get(5)?,
                    referral_codes: row.get(6)?,
                    db_size_bytes: 0,
                })
            },
        )?;

        if self.path.to_string_lossy() != ":memory:" {
            stats.db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        }
        Ok(stats)
    }
}

/// Item counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// All items.
    pub total_items: i64,
    /// User records.
    pub users: i64,
    /// Conversation messages.
    pub messages: i64,
    /// Stored reports, single and multi-instance.
    pub reports: i64,
    /// Compatibility results.
    pub compatibility_results: i64,
    /// Report generation locks, live or stale.
    pub locks: i64,
    /// Referral code index items.
    pub referral_codes: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

fn decode<T: DeserializeOwned>(pk: &str, sk: &str, data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| Error::corrupt_item(pk, sk, e.to_string()))
}

fn get_item<T: DeserializeOwned>(conn: &Connection, pk: &str, sk: &str) -> Result<Option<T>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM items WHERE pk = ?1 AND sk = ?2",
            params![pk, sk],
            |row| row.get(0),
        )
        .optional()?;
    data.map(|data| decode(pk, sk, &data)).transpose()
}

/// Upsert in place so the row keeps its insertion position.
fn put_item<T: Serialize>(conn: &Connection, pk: &str, sk: &str, value: &T) -> Result<()> {
    let data = serde_json::to_string(value)?;
    conn.execute(
        r"
        INSERT INTO items (pk, sk, data, updated_at) VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(pk, sk) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
        ",
        params![pk, sk, data, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn delete_item(conn: &Connection, pk: &str, sk: &str) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM items WHERE pk = ?1 AND sk = ?2",
        params![pk, sk],
    )?;
    Ok(affected > 0)
}

fn query_prefix<T: DeserializeOwned>(
    conn: &Connection,
    pk: &str,
    prefix: &str,
    newest_first: bool,
    limit: Option<usize>,
) -> Result<Vec<(String, T)>> {
    let sql = if newest_first {
        PREFIX_QUERY_DESC
    } else {
        PREFIX_QUERY_ASC
    };
    // SQLite treats a negative LIMIT as no limit
    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![pk, prefix, limit], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(sk, data)| {
            let value = decode(pk, &sk, &data)?;
            Ok((sk, value))
        })
        .collect()
}

fn unused_referral_code(conn: &Connection) -> Result<String> {
    for _ in 0..REFERRAL_CODE_ATTEMPTS {
        let code = keys::new_referral_code();
        let taken: Option<ReferralCodeItem> =
            get_item(conn, &keys::refcode_pk(&code), REFCODE_USER)?;
        if taken.is_none() {
            return Ok(code);
        }
    }
    Err(Error::internal("could not draw an unused referral code"))
}

fn credit_referral(referrer: &mut User, reward: &ReferralConfig) {
    referrer.referrals_count += 1;
    referrer.questions_bonus += reward.bonus_questions;
    if referrer.referrals_count == 1 {
        referrer.add_purchased_report(&reward.first_referral_report);
    }
}

fn lock_is_live(lock: &LockItem, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
    // A lock stamped in the future counts as live
    now.signed_duration_since(lock.acquired_at)
        .to_std()
        .map_or(true, |age| age < ttl)
}

/// Count report rows and collect those needing migration.
fn legacy_rows(conn: &Connection) -> Result<(usize, Vec<LegacyReport>)> {
    let mut stmt = conn.prepare(
        "SELECT pk, sk FROM items WHERE substr(sk, 1, 7) = 'REPORT#' ORDER BY pk, sk",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let scanned = rows.len();
    let legacy = rows
        .into_iter()
        .filter_map(|(pk, sk)| {
            let (report_type, instance) = keys::parse_report_sk(&sk)?;
            if instance.is_some() || !catalog::is_multi_instance(report_type) {
                return None;
            }
            let report_type = report_type.to_string();
            Some(LegacyReport {
                pk,
                sk,
                report_type,
            })
        })
        .collect();
    Ok((scanned, legacy))
}

fn migrated_context(report_type: &str, now: DateTime<Utc>) -> serde_json::Value {
    match report_type {
        "compatibility_pro" => json!({"partner_name": "Unknown", "migrated": true}),
        "name_selection" => json!({"purpose": "unknown", "migrated": true}),
        "year_forecast" => json!({"year": now.year(), "migrated": true}),
        "date_calendar" => json!({"month": now.month(), "year": now.year(), "migrated": true}),
        _ => json!({"migrated": true}),
    }
}
