//! Wire formatting for submitted messages.
//!
//! Subjects and display names may be arbitrary Unicode; SMTP headers are
//! ASCII. Non-ASCII header values are wrapped as RFC-2047 encoded words
//! (`=?UTF-8?B?...?=`), pure-ASCII values pass through untouched. The
//! HTML body always goes out base64-encoded, hard-wrapped at 76 columns
//! per the MIME convention — which also means no line of the body can
//! ever begin with `.`, so no dot-stuffing is needed.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use quizmail_common::envelope::{Envelope, Mailbox};

/// MIME base64 line-length convention.
const BASE64_LINE_LEN: usize = 76;

/// Encode a header value, wrapping it as a UTF-8 encoded word only when
/// it contains non-ASCII bytes.
#[must_use]
pub fn encode_header_word(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Format a mailbox for `From`/`To`/`Reply-To`, encoding the display
/// name when needed.
#[must_use]
pub fn encode_mailbox(mailbox: &Mailbox) -> String {
    match &mailbox.name {
        Some(name) => format!("{} <{}>", encode_header_word(name), mailbox.address),
        None => mailbox.address.clone(),
    }
}

/// Base64-encode `data` and hard-wrap it at 76 columns with CRLF line
/// endings, trailing CRLF included.
#[must_use]
pub fn wrap_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut wrapped = String::with_capacity(encoded.len() + 2 * (encoded.len() / BASE64_LINE_LEN + 1));
    for chunk in encoded.as_bytes().chunks(BASE64_LINE_LEN) {
        // base64 output is pure ASCII
        for &byte in chunk {
            wrapped.push(char::from(byte));
        }
        wrapped.push_str("\r\n");
    }
    wrapped
}

/// Assemble the complete message as transmitted after `DATA`: headers,
/// blank line, base64 body.
#[must_use]
pub fn format_message(
    envelope: &Envelope,
    subject: &str,
    html_body: &str,
    date: DateTime<Utc>,
) -> String {
    let mut message = String::new();
    message.push_str(&format!("From: {}\r\n", encode_mailbox(&envelope.sender)));
    message.push_str(&format!("To: {}\r\n", encode_mailbox(&envelope.recipient)));
    if let Some(reply_to) = &envelope.reply_to {
        message.push_str(&format!("Reply-To: {}\r\n", encode_mailbox(reply_to)));
    }
    message.push_str(&format!("Subject: {}\r\n", encode_header_word(subject)));
    message.push_str(&format!("Date: {}\r\n", date.to_rfc2822()));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str("Content-Type: text/html; charset=UTF-8\r\n");
    message.push_str("Content-Transfer-Encoding: base64\r\n");
    message.push_str("\r\n");
    message.push_str(&wrap_base64(html_body.as_bytes()));
    message
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use base64::Engine as _;

    use super::*;

    #[test]
    fn ascii_subjects_pass_through() {
        assert_eq!(encode_header_word("Your quiz result"), "Your quiz result");
    }

    #[test]
    fn unicode_subject_round_trips_through_a_standard_decoder() {
        let subject = "Müüs — 95% tulemus";
        let encoded = encode_header_word(subject);
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert!(encoded.ends_with("?="));

        let raw = format!("Subject: {encoded}\r\n");
        let (header, _) = mailparse::parse_header(raw.as_bytes()).expect("parse header");
        assert_eq!(header.get_value(), subject);
    }

    #[test]
    fn base64_body_wraps_at_76_columns() {
        let body = "x".repeat(300);
        let wrapped = wrap_base64(body.as_bytes());
        for line in wrapped.lines() {
            assert!(line.len() <= 76, "line too long: {}", line.len());
        }
        assert!(wrapped.lines().next().expect("first line").len() == 76);
        assert!(wrapped.ends_with("\r\n"));

        let rejoined: String = wrapped.lines().collect();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(rejoined)
            .expect("decode");
        assert_eq!(decoded, body.as_bytes());
    }

    #[test]
    fn message_carries_the_required_headers() {
        use quizmail_common::envelope::Mailbox;

        let envelope = Envelope::new(
            Mailbox::new("lead@example.com"),
            Mailbox::named("quiz@example.com", "Küsitlus"),
        )
        .with_reply_to(Mailbox::new("support@example.com"));

        let date = chrono::DateTime::parse_from_rfc3339("2026-08-06T10:00:00Z")
            .expect("date")
            .with_timezone(&Utc);
        let message = format_message(&envelope, "Tulemus", "<p>95%</p>", date);

        assert!(message.contains("To: lead@example.com\r\n"));
        assert!(message.contains("From: =?UTF-8?B?"));
        assert!(message.contains("Reply-To: support@example.com\r\n"));
        assert!(message.contains("Subject: Tulemus\r\n"));
        assert!(message.contains("Date: Thu, 6 Aug 2026 10:00:00 +0000\r\n"));
        assert!(message.contains("MIME-Version: 1.0\r\n"));
        assert!(message.contains("Content-Type: text/html; charset=UTF-8\r\n"));
        assert!(message.contains("Content-Transfer-Encoding: base64\r\n"));

        let (headers, body) = message.split_once("\r\n\r\n").expect("blank line");
        assert!(!headers.is_empty());
        let rejoined: String = body.lines().collect();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(rejoined)
            .expect("decode body");
        assert_eq!(decoded, b"<p>95%</p>");
    }
}
