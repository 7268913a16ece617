//! Human-readable challenge text signed by the wallet.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::gating::{Address, GatingError, GatingResult};

const STATEMENT: &str = " wants you to verify your wallet to join the discussion.";

/// Challenge for one (category, address) claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    pub domain: String,
    pub address: Address,
    pub category_type: String,
    pub post_id: String,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn malformed(reason: &str) -> GatingError {
    GatingError::MalformedMessage(reason.to_string())
}

fn field<'a>(line: Option<&'a str>, key: &str) -> GatingResult<&'a str> {
    line.and_then(|l| l.strip_prefix(key))
        .and_then(|l| l.strip_prefix(": "))
        .ok_or_else(|| malformed(&format!("expected '{}' line", key)))
}

fn parse_time(value: &str) -> GatingResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| malformed(&format!("bad timestamp '{}': {}", value, e)))
}

impl ChallengeMessage {
    pub fn render(&self) -> String {
        format!(
            "{}{}\n\nAddress: {}\nCategory: {}\nPost: {}\nNonce: {}\nIssued At: {}\nExpiration Time: {}",
            self.domain,
            STATEMENT,
            self.address.to_checksum(),
            self.category_type,
            self.post_id,
            self.nonce,
            timestamp(&self.issued_at),
            timestamp(&self.expires_at),
        )
    }

    /// Parse text produced by [`render`](Self::render). Anything else is rejected.
    pub fn parse(text: &str) -> GatingResult<Self> {
        let mut lines = text.split('\n');

        let domain = lines
            .next()
            .and_then(|l| l.strip_suffix(STATEMENT))
            .filter(|d| !d.is_empty())
            .ok_or_else(|| malformed("missing statement line"))?;
        if lines.next() != Some("") {
            return Err(malformed("expected blank line after statement"));
        }

        let address: Address = field(lines.next(), "Address")?
            .parse()
            .map_err(|_| malformed("bad address"))?;
        let category_type = field(lines.next(), "Category")?;
        let post_id = field(lines.next(), "Post")?;
        let nonce = field(lines.next(), "Nonce")?;
        let issued_at = parse_time(field(lines.next(), "Issued At")?)?;
        let expires_at = parse_time(field(lines.next(), "Expiration Time")?)?;
        if lines.next().is_some() {
            return Err(malformed("unexpected trailing lines"));
        }

        let message = ChallengeMessage {
            domain: domain.to_string(),
            address,
            category_type: category_type.to_string(),
            post_id: post_id.to_string(),
            nonce: nonce.to_string(),
            issued_at,
            expires_at,
        };
        // checksum casing and timestamp precision must match exactly
        if message.render() != text {
            return Err(malformed("message is not in canonical form"));
        }
        Ok(message)
    }
}

impl fmt::Display for ChallengeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> ChallengeMessage {
        ChallengeMessage {
            domain: "forum.example".to_string(),
            address: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap(),
            category_type: "ethereum_profile".to_string(),
            post_id: "post-42".to_string(),
            nonce: "abc123".to_string(),
            issued_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            expires_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap(),
        }
    }

    #[test]
    fn test_render_layout() {
        let text = sample().render();
        assert_eq!(
            text,
            "forum.example wants you to verify your wallet to join the discussion.\n\n\
             Address: 0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed\n\
             Category: ethereum_profile\n\
             Post: post-42\n\
             Nonce: abc123\n\
             Issued At: 2024-05-01T12:00:00Z\n\
             Expiration Time: 2024-05-01T12:05:00Z"
        );
    }

    #[test]
    fn test_parse_rendered_text() {
        let message = sample();
        assert_eq!(ChallengeMessage::parse(&message.render()).unwrap(), message);
    }

    #[test]
    fn test_parse_rejects_variations() {
        let text = sample().render();
        let lowercase = text.replace(
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
        );
        assert!(ChallengeMessage::parse(&lowercase).is_err());
        assert!(ChallengeMessage::parse(&format!("{}\nExtra: 1", text)).is_err());
        assert!(ChallengeMessage::parse(&text.replace("Nonce", "Nonse")).is_err());
        assert!(ChallengeMessage::parse("").is_err());
    }
}
