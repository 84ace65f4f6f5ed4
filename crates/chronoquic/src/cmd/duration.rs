use std::time::Duration;

use crate::exit::{CliError, CliResult, USAGE};

/// Parse `150ms`, `2s` or a bare number of seconds. Zero is rejected.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let duration = parse(input)?;
    if duration.is_zero() {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(duration)
}

/// Like [`parse_duration`] but accepts zero, for delays that may be disabled.
pub fn parse_delay(input: &str) -> CliResult<Duration> {
    parse(input)
}

fn parse(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(
            parse_duration("2s").expect("2s should parse"),
            Duration::from_secs(2)
        );
        assert_eq!(
            parse_duration("150ms").expect("150ms should parse"),
            Duration::from_millis(150)
        );
        assert_eq!(
            parse_duration("3").expect("bare seconds should parse"),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn parse_delay_allows_zero() {
        assert_eq!(parse_delay("0").expect("zero should parse"), Duration::ZERO);
        assert_eq!(
            parse_delay("0ms").expect("zero ms should parse"),
            Duration::ZERO
        );
        assert_eq!(
            parse_delay("100ms").expect("100ms should parse"),
            Duration::from_millis(100)
        );
    }
}
