use clap::builder::ValueParser;
use regex::Regex;
use std::time::Duration;

/// Parse `<n><unit>` groups, units `d`, `h`, `m` and `s`, e.g. `1h30m`.
///
/// # Errors
/// Returns an error for malformed input, a zero total or an overflow.
pub fn parse(value: &str) -> Result<Duration, String> {
    let valid = Regex::new(r"^(?:\d+[dhms])+$").map_err(|e| e.to_string())?;
    if !valid.is_match(value) {
        return Err(format!(
            "invalid duration '{value}', expected e.g. 30s, 15m, 24h, 7d or 1h30m"
        ));
    }

    let group = Regex::new(r"(\d+)([dhms])").map_err(|e| e.to_string())?;
    let mut seconds: u64 = 0;
    for captures in group.captures_iter(value) {
        let count = captures[1]
            .parse::<u64>()
            .map_err(|_| format!("duration '{value}' is too large"))?;
        let unit = match &captures[2] {
            "d" => 86_400,
            "h" => 3_600,
            "m" => 60,
            _ => 1,
        };
        seconds = count
            .checked_mul(unit)
            .and_then(|group| seconds.checked_add(group))
            .ok_or_else(|| format!("duration '{value}' is too large"))?;
    }

    if seconds == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(Duration::from_secs(seconds))
}

pub fn validator_duration() -> ValueParser {
    ValueParser::from(parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_units() {
        assert_eq!(parse("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse("15m"), Ok(Duration::from_secs(900)));
        assert_eq!(parse("24h"), Ok(Duration::from_secs(86_400)));
        assert_eq!(parse("7d"), Ok(Duration::from_secs(604_800)));
    }

    #[test]
    fn test_combined_units() {
        assert_eq!(parse("1h30m"), Ok(Duration::from_secs(5_400)));
        assert_eq!(parse("1d1s"), Ok(Duration::from_secs(86_401)));
    }

    #[test]
    fn test_rejects_malformed() {
        for value in ["", "30", "h", "1.5h", "-1h", "1w", "1h 30m", "forever"] {
            assert!(parse(value).is_err(), "{value} should be rejected");
        }
    }

    #[test]
    fn test_rejects_zero() {
        assert!(parse("0s").is_err());
        assert!(parse("0h0m").is_err());
    }

    #[test]
    fn test_rejects_overflow() {
        assert!(parse("99999999999999999999s").is_err());
        assert!(parse("999999999999999d").is_err());
    }
}
