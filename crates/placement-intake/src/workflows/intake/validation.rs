use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Ordered validation-failure messages for one gating attempt. Empty means "may advance".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorReport {
    messages: Vec<String>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages.iter().any(|message| message.contains(needle))
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

impl Extend<String> for ErrorReport {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.messages.extend(iter);
    }
}

impl FromIterator<String> for ErrorReport {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

/// Keep the message of every check whose predicate failed, in input order.
pub fn collect_errors<I, S>(checks: I) -> ErrorReport
where
    I: IntoIterator<Item = (bool, S)>,
    S: Into<String>,
{
    checks
        .into_iter()
        .filter(|(passed, _)| !passed)
        .map(|(_, message)| message.into())
        .collect()
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
    })
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // With a separator the prefix/body split is explicit; without one only the full
    // ten-digit mobile form is unambiguous.
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:0[0-9]{1,2}-[0-9]{6,7}|0[0-9]{9})$").expect("phone pattern compiles")
    })
}

fn national_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{8,9}$").expect("national id pattern compiles"))
}

pub fn is_valid_email(value: &str) -> bool {
    email_pattern().is_match(value.trim())
}

pub fn is_valid_phone(value: &str) -> bool {
    phone_pattern().is_match(value.trim())
}

pub fn is_valid_national_id(value: &str) -> bool {
    national_id_pattern().is_match(value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_accepts_separated_and_compact_mobile_numbers() {
        assert!(is_valid_phone("050-1234567"));
        assert!(is_valid_phone("0501234567"));
        assert!(is_valid_phone(" 04-6941234 "));
    }

    #[test]
    fn phone_landlines_need_the_separator() {
        assert!(is_valid_phone("04-8123456"));
        assert!(!is_valid_phone("048123456"));
    }

    #[test]
    fn phone_rejects_wrong_lengths_letters_and_missing_zero() {
        assert!(!is_valid_phone("050123456"));
        assert!(!is_valid_phone("050-12345678"));
        assert!(!is_valid_phone("05O-1234567"));
        assert!(!is_valid_phone("550-1234567"));
        assert!(!is_valid_phone(""));
    }

    #[test]
    fn email_is_a_light_syntactic_check() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("  student@college.ac.il "));
        assert!(!is_valid_email("a@@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@b@c.co"));
        assert!(!is_valid_email("no-at-sign.co"));
    }

    #[test]
    fn national_id_requires_eight_or_nine_digits() {
        assert!(is_valid_national_id("12345678"));
        assert!(is_valid_national_id("123456789"));
        assert!(!is_valid_national_id("1234567"));
        assert!(!is_valid_national_id("1234567890"));
        assert!(!is_valid_national_id("12345-678"));
        assert!(!is_valid_national_id("١٢٣٤٥٦٧٨"));
    }

    #[test]
    fn collect_errors_keeps_failed_messages_in_order() {
        let report = collect_errors([
            (false, "first"),
            (true, "skipped"),
            (false, "second"),
            (false, "first"),
        ]);

        assert_eq!(report.messages(), ["first", "second", "first"]);
        assert!(collect_errors([(true, "ok")]).is_empty());
    }
}
