//! Duration values as they appear in scenario files and on the command line.
//!
//! Accepted forms: humantime strings (`15s`, `500ms`, `1m30s`), or a number of
//! seconds. A leading `-` is parsed rather than rejected so that validation can
//! report a negative duration against the field it came from.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A parsed duration that may still carry a negative sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignedDuration {
    negative: bool,
    magnitude: Duration,
}

impl SignedDuration {
    pub const fn positive(magnitude: Duration) -> Self {
        Self {
            negative: false,
            magnitude,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.negative && !self.magnitude.is_zero()
    }

    /// The duration, or `None` when negative.
    pub fn to_duration(self) -> Option<Duration> {
        if self.is_negative() {
            None
        } else {
            Some(self.magnitude)
        }
    }

    fn from_secs_f64(secs: f64) -> Result<Self, String> {
        if !secs.is_finite() {
            return Err(format!("duration must be finite, got {secs}"));
        }
        let magnitude = Duration::try_from_secs_f64(secs.abs())
            .map_err(|_| format!("duration out of range: {secs}"))?;
        Ok(Self {
            negative: secs < 0.0,
            magnitude,
        })
    }
}

impl From<Duration> for SignedDuration {
    fn from(value: Duration) -> Self {
        Self::positive(value)
    }
}

impl FromStr for SignedDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("duration cannot be empty".to_string());
        }

        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, s),
        };
        if body.starts_with(['-', '+']) {
            return Err(format!("invalid duration '{s}': more than one sign"));
        }

        // Bare numbers are seconds.
        if let Ok(secs) = body.parse::<f64>() {
            let parsed = Self::from_secs_f64(secs)?;
            return Ok(Self {
                negative,
                magnitude: parsed.magnitude,
            });
        }

        let magnitude = humantime::parse_duration(body)
            .map_err(|e| format!("invalid duration '{s}': {e}"))?;
        Ok(Self {
            negative,
            magnitude,
        })
    }
}

impl fmt::Display for SignedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            f.write_str("-")?;
        }
        write!(f, "{}", humantime::format_duration(self.magnitude))
    }
}

impl Serialize for SignedDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SignedDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;

        impl serde::de::Visitor<'_> for Visitor {
            type Value = SignedDuration;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a duration string (e.g. 15s) or a number of seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(SignedDuration::positive(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(SignedDuration {
                    negative: v < 0,
                    magnitude: Duration::from_secs(v.unsigned_abs()),
                })
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                SignedDuration::from_secs_f64(v).map_err(E::custom)
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}
