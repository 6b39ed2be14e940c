use std::fmt;

/// Money is integer cents. A balance of 12.34 is stored as 1234, so
/// arithmetic stays exact and comparisons are plain integer comparisons.
pub type Cents = i64;

/// Render cents as a decimal amount string: 1234 -> "12.34", -5 -> "-0.05".
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal amount string into cents: "12.34" -> 1234, "7" -> 700,
/// ".5" -> 50. At most two fractional digits are accepted.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let trimmed = input.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (units_part, frac_part) = match body.split_once('.') {
        Some((units, frac)) => (units, frac),
        None => (body, ""),
    };

    if units_part.is_empty() && frac_part.is_empty() {
        return Err(ParseCentsError::Empty);
    }
    if !units_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParseCentsError::InvalidDigits);
    }

    let units: i64 = if units_part.is_empty() {
        0
    } else {
        units_part
            .parse()
            .map_err(|_| ParseCentsError::InvalidDigits)?
    };

    let frac: i64 = match frac_part.len() {
        0 => 0,
        // A single digit is tenths: "12.5" is 12.50.
        1 => {
            frac_part
                .parse::<i64>()
                .map_err(|_| ParseCentsError::InvalidDigits)?
                * 10
        }
        2 => frac_part
            .parse()
            .map_err(|_| ParseCentsError::InvalidDigits)?,
        _ => return Err(ParseCentsError::TooManyDecimals),
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(frac))
        .ok_or(ParseCentsError::Overflow)?;

    Ok(if negative { -cents } else { cents })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    Empty,
    InvalidDigits,
    TooManyDecimals,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::Empty => write!(f, "empty amount"),
            ParseCentsError::InvalidDigits => write!(f, "amount must be a decimal number"),
            ParseCentsError::TooManyDecimals => {
                write!(f, "amounts carry at most two decimal places")
            }
            ParseCentsError::Overflow => write!(f, "amount out of range"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
