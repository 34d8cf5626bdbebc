//! Human-readable duration parsing for configuration values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid duration format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseFloatError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),
}

/// Duration wrapper with human-readable parsing.
///
/// Accepts a bare integer (milliseconds) or a string with a unit suffix:
/// `"500ms"`, `"2.5s"`, `"1m"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct HumanDuration(pub u64);

impl HumanDuration {
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl From<HumanDuration> for Duration {
    fn from(value: HumanDuration) -> Self {
        value.as_duration()
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DurationVisitor;

        impl serde::de::Visitor<'_> for DurationVisitor {
            type Value = HumanDuration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter
                    .write_str("a duration as string (e.g., \"500ms\", \"2.5s\") or integer milliseconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(HumanDuration(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(HumanDuration)
                    .map_err(|_| serde::de::Error::custom("duration must be non-negative"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<HumanDuration>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

impl FromStr for HumanDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        // Plain number means milliseconds
        if let Ok(num) = s.parse::<u64>() {
            return Ok(HumanDuration(num));
        }

        let Some(pos) = s.find(|c: char| !c.is_ascii_digit() && c != '.') else {
            return Err(ParseError::InvalidFormat(s.to_string()));
        };

        let (num_str, unit) = (&s[..pos], &s[pos..]);
        let num: f64 = num_str.parse()?;

        let millis = match unit.trim() {
            "ms" => num,
            "s" => num * 1000.0,
            "m" | "min" => num * 60_000.0,
            "h" => num * 3_600_000.0,
            _ => return Err(ParseError::InvalidUnit(unit.to_string())),
        };

        if !millis.is_finite() || millis < 0.0 {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }

        Ok(HumanDuration(millis as u64))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1000 && self.0 % 1000 == 0 {
            write!(f, "{}s", self.0 / 1000)
        } else {
            write!(f, "{}ms", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_millis() {
        assert_eq!("500".parse::<HumanDuration>().unwrap().as_millis(), 500);
        assert_eq!("500ms".parse::<HumanDuration>().unwrap().as_millis(), 500);
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!("5s".parse::<HumanDuration>().unwrap().as_millis(), 5000);
        assert_eq!("2.5s".parse::<HumanDuration>().unwrap().as_millis(), 2500);
    }

    #[test]
    fn test_parse_minutes_and_hours() {
        assert_eq!("1m".parse::<HumanDuration>().unwrap().as_millis(), 60_000);
        assert_eq!("1h".parse::<HumanDuration>().unwrap().as_millis(), 3_600_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("abc".parse::<HumanDuration>().is_err());
        assert!("5 parsecs".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_deserialize_string() {
        #[derive(Deserialize)]
        struct TestStruct {
            timeout: HumanDuration,
        }
        let parsed: TestStruct = serde_json::from_str(r#"{"timeout": "2.5s"}"#).unwrap();
        assert_eq!(parsed.timeout.as_millis(), 2500);
    }

    #[test]
    fn test_deserialize_number() {
        #[derive(Deserialize)]
        struct TestStruct {
            timeout: HumanDuration,
        }
        let parsed: TestStruct = serde_json::from_str(r#"{"timeout": 1500}"#).unwrap();
        assert_eq!(parsed.timeout.as_millis(), 1500);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", HumanDuration(2500)), "2500ms");
        assert_eq!(format!("{}", HumanDuration(5000)), "5s");
    }
}
