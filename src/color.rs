//! Color arguments: CSS names, hex notation and `rgb()`/`rgba()`.

use palette::Srgba;

use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorParseError {
    #[error("expected parenthesis after color type")]
    MissingParenthesis,
    #[error("unknown color {0:?} - expected a color name, `#rrggbb`, `rgb` or `rgba`")]
    Unknown(String),
    #[error("invalid hex color {0:?}")]
    BadHex(String),
    #[error(transparent)]
    BadValue(std::num::ParseIntError),
    #[error("expected {expected} color components but found {actual}")]
    ComponentMismatch { expected: usize, actual: usize },
}

pub fn parse_color(s: &str) -> Result<Srgba<u8>, ColorParseError> {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    match *lower.as_bytes() {
        [b'#', ..] => parse_hex(&lower[1..]).ok_or_else(|| ColorParseError::BadHex(s.to_owned())),
        [b'r', b'g', b'b', b'a', b'(', ..] => parse_rgba(&lower[4..]),
        [b'r', b'g', b'b', b'(', ..] => parse_rgb(&lower[3..]),
        _ => palette::named::from_str(&lower)
            .map(|rgb| Srgba::new(rgb.red, rgb.green, rgb.blue, u8::MAX))
            .ok_or_else(|| ColorParseError::Unknown(s.to_owned())),
    }
}

/// `rgb`, `rrggbb` or `rrggbbaa`, without the leading `#`.
fn parse_hex(digits: &str) -> Option<Srgba<u8>> {
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    match digits.len() {
        3 => {
            let short = |i: usize| u8::from_str_radix(&digits[i..i + 1], 16).ok().map(|v| v * 17);
            Some(Srgba::new(short(0)?, short(1)?, short(2)?, u8::MAX))
        }
        6 => Some(Srgba::new(channel(0)?, channel(2)?, channel(4)?, u8::MAX)),
        8 => Some(Srgba::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
        _ => None,
    }
}

fn parse_rgb(s: &str) -> Result<Srgba<u8>, ColorParseError> {
    let components = parse_components(parenthesized(s)?)?;
    if let [r, g, b] = *components.as_slice() {
        Ok(Srgba::new(r, g, b, u8::MAX))
    } else {
        Err(ColorParseError::ComponentMismatch {
            expected: 3,
            actual: components.len(),
        })
    }
}

fn parse_rgba(s: &str) -> Result<Srgba<u8>, ColorParseError> {
    let components = parse_components(parenthesized(s)?)?;
    if let [r, g, b, a] = *components.as_slice() {
        Ok(Srgba::new(r, g, b, a))
    } else {
        Err(ColorParseError::ComponentMismatch {
            expected: 4,
            actual: components.len(),
        })
    }
}

fn parenthesized(s: &str) -> Result<&str, ColorParseError> {
    let s = s.trim();
    match (s.chars().next(), s.chars().last()) {
        (Some('('), Some(')')) if s.len() >= 2 => Ok(&s[1..s.len() - 1]),
        _ => Err(ColorParseError::MissingParenthesis),
    }
}

fn parse_components(s: &str) -> Result<Vec<u8>, ColorParseError> {
    let mut result = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        let component = u8::from_str(part).map_err(ColorParseError::BadValue)?;
        result.push(component);
    }
    Ok(result)
}
