//! Upload tickets
//!
//! A ticket authorizes exactly one `(submission id, object key)` pair until
//! its expiry:
//!
//! ```text
//! {expiry_ms}:{hex(HMAC-SHA256(secret, "{submission_id}:{key}:{expiry_ms}"))}
//! ```
//!
//! Nothing is stored server-side; validation recomputes the MAC.

use chrono::Duration;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// How long a freshly issued ticket stays valid
pub fn ticket_ttl() -> Duration {
    Duration::minutes(10)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TicketError {
    #[error("Upload token is malformed")]
    Malformed,

    #[error("Upload token has expired")]
    Expired,

    #[error("Upload token signature does not match")]
    BadSignature,
}

/// Deterministic object key for a submission's paper
pub fn object_key(submission_id: &str) -> String {
    format!("submissions/{}/paper.pdf", submission_id)
}

fn mac_for(secret: &str, submission_id: &str, key: &str, expiry: i64) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts any key length"));
    mac.update(format!("{}:{}:{}", submission_id, key, expiry).as_bytes());
    mac
}

/// Issue a ticket for `submission_id`/`key` valid until `expiry` (epoch ms)
pub fn generate_ticket(secret: &str, submission_id: &str, key: &str, expiry: i64) -> String {
    let signature = mac_for(secret, submission_id, key, expiry)
        .finalize()
        .into_bytes();
    format!("{}:{}", expiry, hex::encode(signature))
}

/// Validate a ticket at time `now` (epoch ms).
///
/// Returns the ticket's expiry on success. The signature is checked with
/// the MAC's constant-time verification.
pub fn validate_ticket(
    secret: &str,
    ticket: &str,
    submission_id: &str,
    key: &str,
    now: i64,
) -> Result<i64, TicketError> {
    let (expiry_part, signature_part) = ticket.split_once(':').ok_or(TicketError::Malformed)?;

    let expiry: i64 = expiry_part.parse().map_err(|_| TicketError::Malformed)?;
    // Only the canonical rendering of the expiry is ever signed
    if expiry.to_string() != expiry_part {
        return Err(TicketError::Malformed);
    }

    let is_lower_hex = signature_part
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if !is_lower_hex {
        return Err(TicketError::Malformed);
    }
    let signature = hex::decode(signature_part).map_err(|_| TicketError::Malformed)?;

    if now > expiry {
        return Err(TicketError::Expired);
    }

    mac_for(secret, submission_id, key, expiry)
        .verify_slice(&signature)
        .map_err(|_| TicketError::BadSignature)?;

    Ok(expiry)
}
