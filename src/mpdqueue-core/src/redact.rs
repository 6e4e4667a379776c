//! Log redaction for server passwords.
//!
//! Outgoing protocol commands are logged, and the `password` command carries
//! the secret in clear text. Everything that may reach a log goes through
//! [`redact_secrets`] first.

use std::borrow::Cow;

const REDACTED: &str = "[REDACTED]";

/// `key=value` forms that carry a secret, e.g. environment dumps.
const SENSITIVE_ASSIGNMENTS: &[&str] = &["password=", "passwd=", "secret="];

/// Redact passwords from a protocol command or log message.
///
/// Handles:
/// - the protocol `password "<secret>"` command (quoted or bare argument)
/// - `password=`-style assignments
/// - the `MPD_HOST=secret@host` convention
///
/// # Examples
/// ```
/// use mpdqueue_core::redact::redact_secrets;
///
/// let output = redact_secrets("password \"seekrit\"");
/// assert_eq!(output, "password \"[REDACTED]\"");
/// ```
pub fn redact_secrets(input: &str) -> Cow<'_, str> {
    let mut result = Cow::Borrowed(input);

    if let Some(redacted) = redact_password_command(&result) {
        result = Cow::Owned(redacted);
    }

    if let Some(redacted) = redact_host_password(&result) {
        result = Cow::Owned(redacted);
    }

    for pattern in SENSITIVE_ASSIGNMENTS {
        if result.contains(pattern) {
            result = Cow::Owned(redact_pattern_value(&result, pattern));
        }
    }

    result
}

fn redact_password_command(input: &str) -> Option<String> {
    let trimmed = input.trim_start();
    let rest = trimmed.strip_prefix("password ")?;
    let prefix = &input[..input.len() - trimmed.len()];
    let quoted = rest.trim_start().starts_with('"');
    Some(if quoted {
        format!("{prefix}password \"{REDACTED}\"")
    } else {
        format!("{prefix}password {REDACTED}")
    })
}

fn redact_host_password(input: &str) -> Option<String> {
    let start = input.find("MPD_HOST=")? + "MPD_HOST=".len();
    let value_end = input[start..]
        .find(char::is_whitespace)
        .map(|i| start + i)
        .unwrap_or(input.len());
    let at = input[start..value_end].rfind('@')? + start;
    Some(format!("{}{}{}", &input[..start], REDACTED, &input[at..]))
}

/// Redact the value following a pattern, up to the next delimiter.
fn redact_pattern_value(input: &str, pattern: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;

    while let Some(pos) = remaining.find(pattern) {
        result.push_str(&remaining[..pos]);
        result.push_str(pattern);
        result.push_str(REDACTED);

        let after_pattern = &remaining[pos + pattern.len()..];
        let end = after_pattern
            .find(|c: char| c.is_whitespace() || c == '&' || c == '"' || c == '\'')
            .unwrap_or(after_pattern.len());

        remaining = &after_pattern[end..];
    }

    result.push_str(remaining);
    result
}
