//! The direction arrow, pick/tabby label, and shaft-mask visualization that
//! follow the drawdown row, plus the command-hint prompt line underneath it
//! (spec §4.4; labels and the mode-hint layout supplemented from
//! `driver.cpp::displayPick`/`displayPrompt`, since spec.md only describes
//! the drawdown geometry and leaves prompt wording unspecified).

use dobby_view::Mode;

/// What's being displayed instead of a drawdown pick number: a concrete
/// draft pick, or a tabby letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickLabel {
    Number(i32),
    Tabby(char),
}

impl PickLabel {
    pub fn from_pick(pick: i32) -> Self {
        match pick {
            dobby_picks::TABBY_A => PickLabel::Tabby('A'),
            dobby_picks::TABBY_B => PickLabel::Tabby('B'),
            n => PickLabel::Number(n),
        }
    }
}

/// `" --> "` / `" <-- "` (ascii) or the unicode arrow glyphs, keyed off
/// `weave_forward`.
pub fn direction_arrow(weave_forward: bool, ascii: bool) -> &'static str {
    match (weave_forward, ascii) {
        (true, true) => " --> ",
        (true, false) => " \u{2b95}  ",
        (false, true) => " <-- ",
        (false, false) => " \u{2b05}  ",
    }
}

/// The ` <arrow> <label> |` segment right after the drawdown row.
pub fn label_segment(weave_forward: bool, ascii: bool, label: PickLabel) -> String {
    let arrow = direction_arrow(weave_forward, ascii);
    match label {
        PickLabel::Number(n) => format!("{arrow}{n:4} |"),
        PickLabel::Tabby(c) => format!("{arrow}   {c} |"),
    }
}

/// One glyph per shaft: `*`/`■` if raised in `lift`, else a space.
pub fn shaft_mask_row(lift: u64, max_shafts: u32, ascii: bool) -> String {
    let glyph = if ascii { "*" } else { "\u{25a0}" };
    (0..max_shafts)
        .map(|i| if lift & (1u64 << i) != 0 { glyph } else { " " })
        .collect()
}

const MODE_NAME: [(Mode, &str); 5] = [
    (Mode::Weave, "Weaving"),
    (Mode::Tabby, "Tabby"),
    (Mode::PickEntry, "Select pick"),
    (Mode::PickListEntry, "Enter pick list"),
    (Mode::Quit, "Quitting"),
];

fn mode_name(mode: Mode) -> &'static str {
    MODE_NAME
        .iter()
        .find(|(m, _)| *m == mode)
        .map(|(_, name)| *name)
        .unwrap_or("?")
}

/// The command-hint line under the drawdown (spec §4.4's renderer also
/// "emits ... a command prompt", per §1's description of the terminal
/// output; the exact wording is a supplemented detail grounded in
/// `displayPrompt`).
pub fn command_hint(mode: Mode, label: PickLabel) -> String {
    let name = mode_name(mode);
    match (mode, label) {
        (Mode::PickEntry, _) | (Mode::PickListEntry, _) => {
            format!("[{name}]  Esc) cancel  Enter) commit")
        }
        (_, PickLabel::Tabby(c)) => format!(
            "[{name}:{c}]  t)abby mode  l)iftplan mode  r)everse  space)advance  P)ick list  q)uit"
        ),
        (_, PickLabel::Number(n)) => format!(
            "[{name}:{n}]  t)abby mode  l)iftplan mode  r)everse  space)advance  P)ick list  q)uit"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_from_pick_recognises_tabby_sentinels() {
        assert_eq!(PickLabel::from_pick(dobby_picks::TABBY_A), PickLabel::Tabby('A'));
        assert_eq!(PickLabel::from_pick(dobby_picks::TABBY_B), PickLabel::Tabby('B'));
        assert_eq!(PickLabel::from_pick(7), PickLabel::Number(7));
    }

    #[test]
    fn direction_arrow_switches_on_forward_and_ascii() {
        assert_eq!(direction_arrow(true, true), " --> ");
        assert_eq!(direction_arrow(false, true), " <-- ");
        assert_ne!(direction_arrow(true, false), direction_arrow(true, true));
    }

    #[test]
    fn shaft_mask_row_marks_raised_bits() {
        assert_eq!(shaft_mask_row(0b0101, 4, true), "*.*.".replace('.', " "));
    }

    #[test]
    fn command_hint_includes_mode_and_pick() {
        let hint = command_hint(Mode::Weave, PickLabel::Number(3));
        assert!(hint.contains("Weaving:3"));
    }
}
