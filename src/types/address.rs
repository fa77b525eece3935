use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical destination address as the transport expects it, e.g. `628123456@c.us`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The user part before the domain suffix.
    pub fn user(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Phone number normalization policy.
#[derive(Debug, Clone)]
pub struct NumberFormat {
    country_code: u16,
    suffix: String,
}

impl NumberFormat {
    pub fn new(country_code: u16, suffix: impl Into<String>) -> Self {
        Self {
            country_code,
            suffix: suffix.into(),
        }
    }

    /// Normalize a user-supplied number. Never fails; garbage in yields an
    /// address the transport will reject downstream.
    pub fn format(&self, raw: &str) -> Address {
        if raw.ends_with(&self.suffix) {
            return Address::new(raw);
        }

        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        let digits = match digits.strip_prefix('0') {
            Some(rest) => format!("{}{}", self.country_code, rest),
            None => digits,
        };

        Address(format!("{digits}{}", self.suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt() -> NumberFormat {
        NumberFormat::new(62, "@c.us")
    }

    #[test]
    fn suffixed_input_is_returned_unchanged() {
        for raw in ["628123456@c.us", "0812-34@c.us", "not a number@c.us"] {
            assert_eq!(fmt().format(raw).as_str(), raw);
        }
    }

    #[test]
    fn leading_zero_becomes_country_code() {
        assert_eq!(fmt().format("08123456789").as_str(), "628123456789@c.us");
    }

    #[test]
    fn non_digits_are_stripped() {
        assert_eq!(fmt().format("+62-812-3456").as_str(), "628123456@c.us");
        assert_eq!(fmt().format("(0812) 345 678").as_str(), "62812345678@c.us");
    }

    #[test]
    fn only_one_leading_zero_is_replaced() {
        assert_eq!(fmt().format("00812").as_str(), "620812@c.us");
    }

    #[test]
    fn empty_input_still_yields_an_address() {
        assert_eq!(fmt().format("").as_str(), "@c.us");
    }

    #[test]
    fn user_part_strips_the_domain() {
        assert_eq!(fmt().format("0812").user(), "62812");
        assert_eq!(Address::new("12345").user(), "12345");
    }
}
