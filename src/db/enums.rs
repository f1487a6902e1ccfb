use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Persisted tag of a check outcome, stored in `check_results.outcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckOutcomeKind {
    Healthy,
    Unhealthy,
    Timeout,
    Tls,
    Dns,
    Connection,
    Unexpected,
}

impl CheckOutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcomeKind::Healthy => "HEALTHY",
            CheckOutcomeKind::Unhealthy => "UNHEALTHY",
            CheckOutcomeKind::Timeout => "TIMEOUT",
            CheckOutcomeKind::Tls => "TLS",
            CheckOutcomeKind::Dns => "DNS",
            CheckOutcomeKind::Connection => "CONNECTION",
            CheckOutcomeKind::Unexpected => "UNEXPECTED",
        }
    }
}

impl FromStr for CheckOutcomeKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HEALTHY" => Ok(CheckOutcomeKind::Healthy),
            "UNHEALTHY" => Ok(CheckOutcomeKind::Unhealthy),
            "TIMEOUT" => Ok(CheckOutcomeKind::Timeout),
            "TLS" => Ok(CheckOutcomeKind::Tls),
            "DNS" => Ok(CheckOutcomeKind::Dns),
            "CONNECTION" => Ok(CheckOutcomeKind::Connection),
            "UNEXPECTED" => Ok(CheckOutcomeKind::Unexpected),
            _ => Err(()),
        }
    }
}

impl fmt::Display for CheckOutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_parse_back() {
        for kind in [
            CheckOutcomeKind::Healthy,
            CheckOutcomeKind::Unhealthy,
            CheckOutcomeKind::Timeout,
            CheckOutcomeKind::Tls,
            CheckOutcomeKind::Dns,
            CheckOutcomeKind::Connection,
            CheckOutcomeKind::Unexpected,
        ] {
            assert_eq!(kind.to_string().parse::<CheckOutcomeKind>(), Ok(kind));
        }
        assert!("healthy".parse::<CheckOutcomeKind>().is_err());
    }

    #[test]
    fn test_serde_matches_column_tag() {
        let json = serde_json::to_string(&CheckOutcomeKind::Connection).unwrap();
        assert_eq!(json, "\"CONNECTION\"");
    }
}
