//! Validation of mini-app `initData`.
//!
//! The data-check string is every `key=value` pair except `hash`, sorted by
//! key and joined with `\n`. The expected hash is
//! `hex(HMAC_SHA256(HMAC_SHA256("WebAppData", bot_token), data_check_string))`.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Why a request could not be authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No init data header.
    Missing,
    /// Malformed data or a signature mismatch.
    Invalid,
    /// Signed data without a user id.
    MissingUserId,
}

impl AuthError {
    /// Message returned to the client.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Missing => "Missing initData",
            Self::Invalid => "Invalid initData",
            Self::MissingUserId => "Missing user ID",
        }
    }
}

#[derive(Deserialize)]
struct InitUser {
    #[serde(default)]
    id: Option<i64>,
}

fn secret_key(bot_token: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(b"WebAppData").ok()?;
    mac.update(bot_token.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

fn data_check_string(pairs: &[(String, String)]) -> String {
    let mut fields: Vec<_> = pairs.iter().filter(|(key, _)| key != "hash").collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check the signature of `init_data` and return the Telegram user id.
///
/// # Errors
///
/// Returns an [`AuthError`] describing the first check that failed.
pub fn validate(init_data: Option<&str>, bot_token: &str) -> Result<i64, AuthError> {
    let init_data = init_data
        .filter(|data| !data.is_empty())
        .ok_or(AuthError::Missing)?;
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(init_data).map_err(|_| AuthError::Invalid)?;

    let received = pairs
        .iter()
        .find(|(key, _)| key == "hash")
        .and_then(|(_, value)| hex::decode(value).ok())
        .ok_or(AuthError::Invalid)?;

    let secret = secret_key(bot_token).ok_or(AuthError::Invalid)?;
    let mut mac = HmacSha256::new_from_slice(&secret).map_err(|_| AuthError::Invalid)?;
    mac.update(data_check_string(&pairs).as_bytes());
    mac.verify_slice(&received).map_err(|_| AuthError::Invalid)?;

    let user = pairs
        .iter()
        .find(|(key, _)| key == "user")
        .ok_or(AuthError::MissingUserId)?;
    let user: InitUser = serde_json::from_str(&user.1).map_err(|_| AuthError::Invalid)?;
    user.id.ok_or(AuthError::MissingUserId)
}

/// Build signed init data the way the client receives it.
#[cfg(test)]
pub(crate) fn sign(fields: &[(&str, &str)], bot_token: &str) -> String {
    let pairs: Vec<(String, String)> = fields
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    let mut mac = HmacSha256::new_from_slice(&secret_key(bot_token).unwrap()).unwrap();
    mac.update(data_check_string(&pairs).as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut signed = pairs;
    signed.push(("hash".to_string(), hash));
    serde_urlencoded::to_string(&signed).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123:abc";

    fn user_fields(user: &str) -> Vec<(&str, &str)> {
        vec![
            ("query_id", "AAHdF6IQAAAAAN0XohDhrOrc"),
            ("user", user),
            ("auth_date", "1700000000"),
        ]
    }

    #[test]
    fn test_valid_signature() {
        let data = sign(&user_fields(r#"{"id":42,"first_name":"Anna Maria"}"#), TOKEN);
        assert_eq!(validate(Some(&data), TOKEN), Ok(42));
    }

    #[test]
    fn test_missing_init_data() {
        assert_eq!(validate(None, TOKEN), Err(AuthError::Missing));
        assert_eq!(validate(Some(""), TOKEN), Err(AuthError::Missing));
    }

    #[test]
    fn test_wrong_token_rejected() {
        let data = sign(&user_fields(r#"{"id":42}"#), TOKEN);
        assert_eq!(validate(Some(&data), "999:other"), Err(AuthError::Invalid));
    }

    #[test]
    fn test_tampered_field_rejected() {
        let data = sign(&user_fields(r#"{"id":42}"#), TOKEN);
        let tampered = data.replace("1700000000", "1800000000");
        assert_eq!(validate(Some(&tampered), TOKEN), Err(AuthError::Invalid));
    }

    #[test]
    fn test_missing_hash_rejected() {
        assert_eq!(
            validate(Some("user=%7B%22id%22%3A42%7D&auth_date=1"), TOKEN),
            Err(AuthError::Invalid)
        );
    }

    #[test]
    fn test_missing_user_id() {
        let data = sign(&user_fields(r#"{"first_name":"Anna"}"#), TOKEN);
        assert_eq!(validate(Some(&data), TOKEN), Err(AuthError::MissingUserId));

        let data = sign(&[("auth_date", "1700000000")], TOKEN);
        assert_eq!(validate(Some(&data), TOKEN), Err(AuthError::MissingUserId));
    }

    #[test]
    fn test_data_check_string_sorted_without_hash() {
        let pairs = vec![
            ("user".to_string(), "u".to_string()),
            ("hash".to_string(), "h".to_string()),
            ("auth_date".to_string(), "1".to_string()),
        ];
        assert_eq!(data_check_string(&pairs), "auth_date=1\nuser=u");
    }
}
