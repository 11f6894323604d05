//! Outgoing mail as handed to a transport.

use serde::{Deserialize, Serialize};

use crate::id::{RecordId, RuleId};
use crate::time::Timestamp;

/// One resolved mail recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    /// Display name, empty when the address came from a plain text field.
    #[serde(default)]
    pub name: String,
}

impl Recipient {
    #[must_use]
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
        }
    }
}

/// Rendered document attached to a mail.
///
/// `content` holds raw bytes so non-text documents fit the same shape; it
/// travels as base64 in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

impl Attachment {
    /// An HTML document attachment.
    #[must_use]
    pub fn html(filename: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content_type: "text/html".to_string(),
            content: html.into().into_bytes(),
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// A fully rendered mail produced by one rule for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub rule_id: RuleId,
    pub record_id: RecordId,
    pub from: String,
    pub to: String,
    pub cc: Vec<String>,
    pub subject: String,
    pub body_html: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: Timestamp,
}

/// Split resolved addresses into `to` and `cc`.
///
/// The first resolved address becomes `to`; the remaining ones and
/// `extra_cc` follow as `cc`, deduplicated case-insensitively in order of
/// appearance. Returns `None` when no recipient resolved to an address,
/// whatever `extra_cc` holds.
#[must_use]
pub fn split_recipients(
    resolved: &[Recipient],
    extra_cc: &[String],
) -> Option<(String, Vec<String>)> {
    if resolved.iter().all(|r| r.email.trim().is_empty()) {
        return None;
    }
    let mut seen: Vec<String> = Vec::new();
    let mut ordered: Vec<String> = Vec::new();
    let candidates = resolved
        .iter()
        .map(|r| r.email.as_str())
        .chain(extra_cc.iter().map(String::as_str));
    for address in candidates {
        let address = address.trim();
        if address.is_empty() {
            continue;
        }
        let folded = address.to_lowercase();
        if !seen.contains(&folded) {
            seen.push(folded);
            ordered.push(address.to_string());
        }
    }
    let mut iter = ordered.into_iter();
    let to = iter.next()?;
    Some((to, iter.collect()))
}
