//! Text measurement for the builtin Helvetica faces.
//!
//! Widths are estimated per character class rather than read from AFM
//! tables; they only feed the advisory width check, never placement.

/// Estimated advance of `ch` in em units.
fn char_em(ch: char, bold: bool) -> f32 {
    let em = match ch {
        ' ' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 0.278,
        'i' | 'j' | 'l' => 0.222,
        'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '/' | '-' => 0.333,
        'm' | 'M' => 0.833,
        'w' | 'W' => 0.778,
        '0'..='9' => 0.556,
        c if c.is_ascii_uppercase() => 0.667,
        _ => 0.5,
    };
    // Bold faces run ~10 % wider.
    if bold {
        em * 1.1
    } else {
        em
    }
}

/// Estimated width of `text` in points at `font_size`.
pub fn measure_text_width(text: &str, font_size: f32, bold: bool) -> f32 {
    text.chars().map(|c| char_em(c, bold)).sum::<f32>() * font_size
}
