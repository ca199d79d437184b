//! Partition and sort keys of the item table.
//!
//! | pk | sk | item |
//! |----|----|------|
//! | `USER#<id>` | `PROFILE` | user record |
//! | `USER#<id>` | `STATE` | pending input flow |
//! | `USER#<id>` | `MSG#<ts>#<rand>` | conversation message |
//! | `USER#<id>` | `REPORT#<type>` | single-instance report |
//! | `USER#<id>` | `REPORT#<type>#<instance>` | multi-instance report |
//! | `USER#<id>` | `LOCK#REPORT#<type>` | report generation lock |
//! | `USER#<id>` | `COMPAT#<id>` | compatibility result |
//! | `REFCODE#<code>` | `USER` | referral code index |

use chrono::{DateTime, Utc};
use rand::Rng;

/// Sort key of the user record.
pub const PROFILE: &str = "PROFILE";
/// Sort key of the pending flow state.
pub const STATE: &str = "STATE";
/// Sort key of the referral code index item.
pub const REFCODE_USER: &str = "USER";
/// Prefix of conversation message sort keys.
pub const MSG_PREFIX: &str = "MSG#";
/// Prefix of report sort keys.
pub const REPORT_PREFIX: &str = "REPORT#";
/// Prefix of lock sort keys.
pub const LOCK_PREFIX: &str = "LOCK#";
/// Prefix of compatibility sort keys.
pub const COMPAT_PREFIX: &str = "COMPAT#";
/// Prefix of user partition keys.
pub const USER_PREFIX: &str = "USER#";
/// Prefix of referral code partition keys.
pub const REFCODE_PREFIX: &str = "REFCODE#";

pub fn user_pk(telegram_id: i64) -> String {
    format!("{USER_PREFIX}{telegram_id}")
}

pub fn refcode_pk(code: &str) -> String {
    format!("{REFCODE_PREFIX}{code}")
}

/// Message key; the timestamp has a fixed width so keys sort by time.
pub fn message_sk(at: DateTime<Utc>, suffix: &str) -> String {
    format!("{MSG_PREFIX}{}#{suffix}", at.format("%Y-%m-%dT%H:%M:%S%.6fZ"))
}

pub fn report_sk(report_type: &str) -> String {
    format!("{REPORT_PREFIX}{report_type}")
}

pub fn report_instance_prefix(report_type: &str) -> String {
    format!("{REPORT_PREFIX}{report_type}#")
}

pub fn report_instance_sk(report_type: &str, instance_id: &str) -> String {
    format!("{REPORT_PREFIX}{report_type}#{instance_id}")
}

pub fn lock_sk(report_type: &str) -> String {
    format!("{LOCK_PREFIX}{REPORT_PREFIX}{report_type}")
}

pub fn compat_sk(result_id: &str) -> String {
    format!("{COMPAT_PREFIX}{result_id}")
}

/// Split a report sort key into its type and optional instance id.
pub fn parse_report_sk(sk: &str) -> Option<(&str, Option<&str>)> {
    let rest = sk.strip_prefix(REPORT_PREFIX)?;
    match rest.split_once('#') {
        Some((report_type, instance)) => Some((report_type, Some(instance))),
        None => Some((rest, None)),
    }
}

/// Random 8-character lowercase hex id.
pub fn new_id() -> String {
    format!("{:08x}", rand::thread_rng().gen::<u32>())
}

/// Random 8-character uppercase referral code.
pub fn new_referral_code() -> String {
    format!("{:08X}", rand::thread_rng().gen::<u32>())
}
