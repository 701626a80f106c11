use std::time::Duration;

use thiserror::Error;

use crate::color::parse_color;
use crate::effects::{EffectKind, Properties};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("bad color `{0}`")]
    BadColor(String),
    #[error("bad duration `{0}`")]
    BadDuration(String),
    #[error("bad repeat count `{0}`")]
    BadRepeatCount(String),
    #[error("unknown effect name `{0}`")]
    UnknownEffectName(String),
    #[error("malformed effect spec `{0}`")]
    Malformed(String),
}

/// Parses one control line, e.g. `c{255,0,0}` or `flash{100ms|255,0,0|3}`.
pub fn parse_effect(line: &str) -> Result<EffectKind, ParseError> {
    let line = line.trim();
    let malformed = || ParseError::Malformed(line.to_string());

    let sep_idx = line.find('{').ok_or_else(malformed)?;
    let (name, rest) = line.split_at(sep_idx);
    let body = rest
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(malformed)?;

    match name {
        "" | "c" | "color" => {
            // A bare color must not carry any nested braces or trailing text.
            if body.contains(&['{', '}'][..]) {
                return Err(malformed());
            }
            Ok(EffectKind::Solid(parse_color(body)?))
        }
        "fade" => Ok(EffectKind::Fade(parse_properties(line, body)?)),
        "flash" => Ok(EffectKind::Flash(parse_properties(line, body)?)),
        "fire" => {
            let properties = parse_properties(line, body)?;
            if properties.repeat < 0 {
                return Err(ParseError::BadRepeatCount(properties.repeat.to_string()));
            }
            Ok(EffectKind::Fire(properties))
        }
        "blend" => {
            let [start, end, duration] = split_fields(line, body)?;
            let start = parse_color(start)?;
            let end = parse_color(end)?;
            let duration = parse_duration(duration)?;
            Ok(EffectKind::Blend {
                start,
                end,
                duration,
            })
        }
        _ => Err(ParseError::UnknownEffectName(name.to_string())),
    }
}

fn split_fields<'a>(line: &str, body: &'a str) -> Result<[&'a str; 3], ParseError> {
    let mut fields = body.split('|');
    match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(a), Some(b), Some(c), None) => Ok([a, b, c]),
        _ => Err(ParseError::Malformed(line.to_string())),
    }
}

/// `duration|color|repeatCount`, checked in that order.
fn parse_properties(line: &str, body: &str) -> Result<Properties, ParseError> {
    let [delay, color, repeat] = split_fields(line, body)?;

    let delay = parse_duration(delay)?;
    let color = parse_color(color)?;
    let repeat = repeat
        .parse::<i32>()
        .map_err(|_| ParseError::BadRepeatCount(repeat.to_string()))?;

    Ok(Properties {
        delay,
        color,
        repeat,
    })
}

/// Parses durations such as `100ms`, `1.5s` or `1h2m3s`. Negative values are
/// rejected since an effect cannot wait a negative amount of time.
pub fn parse_duration(text: &str) -> Result<Duration, ParseError> {
    let bad_duration = || ParseError::BadDuration(text.to_string());

    let mut rest = match text.strip_prefix('-') {
        Some(_) => return Err(bad_duration()),
        None => text.strip_prefix('+').unwrap_or(text),
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(bad_duration());
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(bad_duration)?;
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." {
            return Err(bad_duration());
        }
        let value: f64 = number.parse().map_err(|_| bad_duration())?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return Err(bad_duration()),
        };

        total_nanos += value * scale;
        rest = tail;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(bad_duration());
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}
