use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// A fixed-duration candle bucket size, e.g. `5m` or `1h`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Timeframe {
    label: String,
    seconds: i64,
}

impl Timeframe {
    pub fn new(label: impl Into<String>, seconds: i64) -> Self {
        Self {
            label: label.into(),
            seconds,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Start of the bucket containing `ts`.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = ts.timestamp();
        let start = secs - secs.rem_euclid(self.seconds);
        DateTime::from_timestamp(start, 0).unwrap_or(ts)
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((split, _)) = s.char_indices().last().filter(|(i, _)| *i > 0) else {
            return Err(format!("invalid timeframe '{s}'"));
        };
        let (count, unit) = s.split_at(split);
        let count: i64 = count
            .parse()
            .map_err(|_| format!("invalid timeframe '{s}'"))?;
        let unit_secs = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 3_600,
            "d" => 86_400,
            "w" => 604_800,
            _ => return Err(format!("invalid timeframe unit in '{s}'")),
        };
        if count <= 0 {
            return Err(format!("timeframe must be positive: '{s}'"));
        }
        Ok(Timeframe::new(s, count * unit_secs))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Parse a comma-separated timeframe list, dropping duplicates.
pub fn parse_timeframes(raw: &str) -> Result<Vec<Timeframe>, String> {
    let mut out: Vec<Timeframe> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let tf: Timeframe = part.parse()?;
        if !out.iter().any(|t| t.seconds == tf.seconds) {
            out.push(tf);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeframe() {
        let tf: Timeframe = "15m".parse().unwrap();
        assert_eq!(tf.seconds(), 900);
        assert_eq!(tf.label(), "15m");
        assert!("0m".parse::<Timeframe>().is_err());
        assert!("5x".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_parse_timeframes_dedups() {
        let tfs = parse_timeframes("1m, 5m,60m,1h,1d").unwrap();
        let labels: Vec<_> = tfs.iter().map(|t| t.label().to_string()).collect();
        assert_eq!(labels, vec!["1m", "5m", "60m", "1d"]);
    }

    #[test]
    fn test_bucket_start() {
        let tf = Timeframe::new("5m", 300);
        let ts = DateTime::from_timestamp(1_700_000_123, 0).unwrap();
        assert_eq!(tf.bucket_start(ts).timestamp(), 1_700_000_100);
    }
}
