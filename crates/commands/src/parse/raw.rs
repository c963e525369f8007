//! Text to primitive conversions and the value checks shared by parsers.

use std::fmt::Display;

use crate::error::ArgumentError;

pub fn parse_boolean(raw: &str) -> Result<bool, ArgumentError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ArgumentError::invalid(format!("Not a valid boolean: {raw}")))
    }
}

/// Decimal, `0x`/`0X`/`#` hexadecimal or leading-zero octal, with an optional sign.
pub fn parse_integer(raw: &str) -> Result<i64, ArgumentError> {
    decode_integer(raw.trim())
        .ok_or_else(|| ArgumentError::invalid(format!("Not a valid integer: {raw}")))
}

fn decode_integer(text: &str) -> Option<i64> {
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
        .or_else(|| unsigned.strip_prefix('#'))
    {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    // A second sign after the prefix is not allowed.
    if digits.is_empty() || digits.starts_with(['-', '+']) {
        return None;
    }

    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

pub fn parse_float(raw: &str) -> Result<f64, ArgumentError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ArgumentError::invalid(format!("Not a valid number: {raw}")))
}

pub fn check_range<T>(value: T, min: Option<T>, max: Option<T>) -> Result<T, ArgumentError>
where
    T: PartialOrd + Display + Copy,
{
    if let Some(min) = min {
        if value < min {
            return Err(ArgumentError::invalid(format!(
                "{value} is below the minimum value of {min}"
            )));
        }
    }
    if let Some(max) = max {
        if value > max {
            return Err(ArgumentError::invalid(format!(
                "{value} is above the maximum value of {max}"
            )));
        }
    }
    Ok(value)
}

/// An empty choice list accepts everything.
pub fn check_choices<T: PartialEq>(value: T, choices: &[T]) -> Result<T, ArgumentError> {
    if choices.is_empty() || choices.contains(&value) {
        Ok(value)
    } else {
        Err(ArgumentError::invalid("Not a valid choice"))
    }
}

pub fn check_length(
    value: String,
    min: Option<usize>,
    max: Option<usize>,
) -> Result<String, ArgumentError> {
    let length = value.chars().count();
    if let Some(min) = min {
        if length < min {
            return Err(ArgumentError::invalid(format!(
                "Must have at least {min} characters"
            )));
        }
    }
    if let Some(max) = max {
        if length > max {
            return Err(ArgumentError::invalid(format!(
                "Must have at most {max} characters"
            )));
        }
    }
    Ok(value)
}

#[cfg(test)]
#[path = "tests/raw_tests.rs"]
mod tests;
