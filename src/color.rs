use crate::effectspec::ParseError;

pub type Color = palette::Srgb<u8>;

pub const BLACK: Color = Color::new(0, 0, 0);

/// Parses `{R,G,B}` or a bare `R,G,B` with decimal components of 1-3 digits.
pub fn parse_color(text: &str) -> Result<Color, ParseError> {
    let bad_color = || ParseError::BadColor(text.to_string());

    let inner = match text.strip_prefix('{') {
        Some(rest) => rest.strip_suffix('}').ok_or_else(bad_color)?,
        None => text,
    };

    let mut components = [0u8; 3];
    let mut parts = inner.split(',');
    for component in components.iter_mut() {
        let part = parts.next().ok_or_else(bad_color)?;
        *component = parse_component(part).ok_or_else(bad_color)?;
    }

    if parts.next().is_some() {
        return Err(bad_color());
    }

    Ok(Color::new(components[0], components[1], components[2]))
}

fn parse_component(part: &str) -> Option<u8> {
    if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    // At most three digits, so this never overflows u16.
    let value: u16 = part.parse().ok()?;
    u8::try_from(value).ok()
}

pub fn peak(color: Color) -> u8 {
    color.red.max(color.green).max(color.blue)
}

/// The line the driver expects for one frame: `"R G B\n"`.
pub fn sink_line(color: Color) -> String {
    format!("{} {} {}\n", color.red, color.green, color.blue)
}
