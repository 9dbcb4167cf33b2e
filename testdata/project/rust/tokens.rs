use std::num::ParseIntError;

/// Sum the integer tokens of a line, skipping comments.
pub fn sum_tokens(line: &str) -> Result<i64, ParseIntError> {
    let mut total = 0;
    for token in line.split_whitespace() {
        if token.starts_with('#') {
            break;
        }
        total += token.parse::<i64>()?;
    }
    Ok(total)
}

pub fn describe(value: Option<i64>) -> &'static str {
    match value {
        Some(v) if v < 0 => "negative",
        Some(0) => "zero",
        Some(_) => "positive",
        None => "missing",
    }
}

pub fn identity(x: i64) -> i64 {
    x
}
