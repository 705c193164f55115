//! ANSI style generation for the drawdown/prompt renderer, gated by the
//! resolved [`Capabilities`] (spec §6 `--ascii`, `--ansi`).

use crate::capabilities::{AnsiMode, Capabilities};
use crossterm::style::Color as CColor;
use dobby_color::Color;

/// Downsamples a normalized color onto the 6x6x6 xterm-256 color cube.
fn to_ansi256(color: Color) -> CColor {
    let (r, g, b) = color.to_palette(5);
    CColor::AnsiValue(16 + 36 * r as u8 + 6 * g as u8 + b as u8)
}

fn to_truecolor(color: Color) -> CColor {
    let (r, g, b) = color.to_palette(255);
    CColor::Rgb {
        r: r as u8,
        g: g as u8,
        b: b as u8,
    }
}

fn background_color(capabilities: Capabilities, color: Color) -> Option<CColor> {
    match capabilities.ansi {
        AnsiMode::No => None,
        AnsiMode::Yes => Some(to_ansi256(color)),
        AnsiMode::TrueColor => Some(to_truecolor(color)),
    }
}

/// Paints `text` with `bg` as the background, picking a readable foreground
/// per [`Color::use_white_text`]. Falls back to the bare text when the
/// terminal has no color capability (spec §6 `--ansi no`).
pub fn paint_cell(capabilities: Capabilities, bg: Color, text: &str) -> String {
    let Some(bg_color) = background_color(capabilities, bg) else {
        return text.to_string();
    };
    let fg_color = if bg.use_white_text() {
        CColor::White
    } else {
        CColor::Black
    };
    use crossterm::style::Stylize;
    text.with(fg_color).on(bg_color).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ansi_mode_returns_plain_text() {
        let caps = Capabilities::new(false, AnsiMode::No);
        assert_eq!(paint_cell(caps, Color::new(1.0, 0.0, 0.0), "##"), "##");
    }

    #[test]
    fn truecolor_mode_wraps_with_escapes() {
        let caps = Capabilities::new(false, AnsiMode::TrueColor);
        let painted = paint_cell(caps, Color::new(1.0, 0.0, 0.0), "##");
        assert_ne!(painted, "##");
        assert!(painted.contains("##"));
    }
}
