use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// HumanDuration
// ---------------------------------------------------------------------------

/// A duration parsed from a human-readable string like `"250ms"`, `"30s"`,
/// `"5m"`, `"1h"`, `"2d"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(Duration);

impl HumanDuration {
    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> u64 {
        self.0.as_millis().min(u64::MAX as u128) as u64
    }
}

impl From<HumanDuration> for Duration {
    fn from(hd: HumanDuration) -> Self {
        hd.0
    }
}

impl From<Duration> for HumanDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl FromStr for HumanDuration {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("empty duration string");
        }

        let (num_part, suffix) = split_number_suffix(s)?;
        let value: u64 = num_part
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid number in duration: {s:?}"))?;

        let millis = match suffix {
            "ms" => Some(value),
            "s" => value.checked_mul(1_000),
            "m" => value.checked_mul(60_000),
            "h" => value.checked_mul(3_600_000),
            "d" => value.checked_mul(86_400_000),
            _ => anyhow::bail!(
                "unsupported duration suffix {suffix:?} in {s:?} (expected ms/s/m/h/d)"
            ),
        }
        .ok_or_else(|| anyhow::anyhow!("duration out of range: {s:?}"))?;

        Ok(Self(Duration::from_millis(millis)))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.as_millis();
        if ms == 0 {
            return write!(f, "0s");
        }
        if !ms.is_multiple_of(1_000) {
            return write!(f, "{ms}ms");
        }
        let secs = ms / 1_000;
        if secs.is_multiple_of(86400) {
            write!(f, "{}d", secs / 86400)
        } else if secs.is_multiple_of(3600) {
            write!(f, "{}h", secs / 3600)
        } else if secs.is_multiple_of(60) {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{secs}s")
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Split a string like `"30s"` into `("30", "s")`.
/// Returns an error if the string is all-digits or all-letters.
fn split_number_suffix(s: &str) -> anyhow::Result<(&str, &str)> {
    let idx = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| anyhow::anyhow!("missing suffix in {s:?}"))?;
    if idx == 0 {
        anyhow::bail!("missing numeric part in {s:?}");
    }
    Ok((&s[..idx], &s[idx..]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_millis() {
        let d: HumanDuration = "250ms".parse().unwrap();
        assert_eq!(d.as_duration(), Duration::from_millis(250));
        assert_eq!(d.as_millis(), 250);
        assert_eq!(d.to_string(), "250ms");
    }

    #[test]
    fn duration_millis_collapse_to_seconds() {
        let d: HumanDuration = "3000ms".parse().unwrap();
        assert_eq!(d.to_string(), "3s");
    }

    #[test]
    fn duration_seconds() {
        let d: HumanDuration = "30s".parse().unwrap();
        assert_eq!(d.as_duration(), Duration::from_secs(30));
        assert_eq!(d.to_string(), "30s");
    }

    #[test]
    fn duration_minutes() {
        let d: HumanDuration = "5m".parse().unwrap();
        assert_eq!(d.as_duration(), Duration::from_secs(300));
        assert_eq!(d.to_string(), "5m");
    }

    #[test]
    fn duration_hours() {
        let d: HumanDuration = "48h".parse().unwrap();
        assert_eq!(d.as_duration(), Duration::from_secs(48 * 3600));
        assert_eq!(d.to_string(), "2d");
    }

    #[test]
    fn duration_zero() {
        let d: HumanDuration = "0s".parse().unwrap();
        assert_eq!(d.as_duration(), Duration::ZERO);
        assert_eq!(d.to_string(), "0s");
    }

    #[test]
    fn duration_errors() {
        assert!("".parse::<HumanDuration>().is_err());
        assert!("30".parse::<HumanDuration>().is_err());
        assert!("30x".parse::<HumanDuration>().is_err());
        assert!("s".parse::<HumanDuration>().is_err());
        assert!("99999999999999999d".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn serde_roundtrip_duration() {
        let d: HumanDuration = "1500ms".parse().unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "\"1500ms\"");
        let d2: HumanDuration = serde_json::from_str(&json).unwrap();
        assert_eq!(d, d2);
    }
}
