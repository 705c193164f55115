//! The drawdown + prompt renderer (spec §4.4).
//!
//! Implements [`dobby_proto::Render`] against [`dobby_terminal::Terminal`]:
//! the protocol runtime calls `draw`/`draw_warning`/`ring_bell`, this crate
//! owns the actual glyphs, colors, and bell decision. No engine state lives
//! here — everything it needs is read fresh from the [`dobby_view::ViewState`]
//! handed to it each call.

pub mod alert;
pub mod drawdown;
pub mod prompt;

use std::io::Write;

use anyhow::Result;
use dobby_draft::{Draft, DobbyType};
use dobby_terminal::{style, Capabilities, Terminal};
use dobby_view::{Mode, ViewState};

pub use alert::ColorAlert;
use alert::BellState;
use prompt::PickLabel;

/// Which row the drawdown and prompt lines land on. The drawdown row
/// scrolls (one line is appended per woven pick, matching the original's
/// `\r\n`-terminated output); the prompt is redrawn in place on the line
/// right after it.
const PROMPT_ROW: u16 = 0;

/// Everything the renderer needs that isn't already in the draft or the
/// view: terminal capabilities and the dobby/tabby/color-alert settings
/// resolved once at startup from CLI/env options (spec §3 "Options").
pub struct Renderer {
    capabilities: Capabilities,
    dobby_type: DobbyType,
    tabby_a_mask: u64,
    tabby_b_mask: u64,
    tabby_color: dobby_color::Color,
    color_alert: ColorAlert,
    bell: BellState,
}

impl Renderer {
    pub fn new(
        capabilities: Capabilities,
        dobby_type: DobbyType,
        tabby_a_mask: u64,
        tabby_b_mask: u64,
        tabby_color: dobby_color::Color,
        color_alert: ColorAlert,
    ) -> Self {
        Self {
            capabilities,
            dobby_type,
            tabby_a_mask,
            tabby_b_mask,
            tabby_color,
            color_alert,
            bell: BellState::new(),
        }
    }

    /// Resolves the lift and weft color to draw for whatever `view.next_pick`
    /// currently holds — a pattern pick or a tabby sentinel.
    fn resolve(&self, draft: &Draft, pick: i32) -> (u64, dobby_color::Color) {
        match pick {
            dobby_picks::TABBY_A => (self.tabby_a_mask, self.tabby_color),
            dobby_picks::TABBY_B => (self.tabby_b_mask, self.tabby_color),
            p if p >= 1 => drawdown::resolve_pattern_pick(draft, self.dobby_type, p as u32),
            _ => (0, self.tabby_color),
        }
    }

    fn render_drawdown_line(&self, draft: &Draft, view: &ViewState, term_cols: u16) -> String {
        let (lift, mut weft_color) = self.resolve(draft, view.next_pick);
        let mask = draft.shaft_mask();
        let empty = drawdown::is_empty_lift(lift, mask);
        if empty {
            weft_color = dobby_color::Color::default();
        }

        let width = drawdown::width(term_cols, draft.max_shafts, draft.ends);
        let cells = drawdown::build_row(draft, self.dobby_type, lift, weft_color, width);

        let mut line = String::new();
        for cell in &cells {
            let glyph = if self.capabilities.ascii {
                if cell.raised {
                    "|"
                } else {
                    "-"
                }
            } else if cell.raised {
                "\u{2551}"
            } else {
                "\u{2550}"
            };
            line.push_str(&style::paint_cell(self.capabilities, cell.color, glyph));
        }

        let label = PickLabel::from_pick(view.next_pick);
        line.push_str(&style::paint_cell(
            self.capabilities,
            weft_color,
            &prompt::label_segment(view.weave_forward, self.capabilities.ascii, label),
        ));
        line.push_str(&prompt::shaft_mask_row(lift, draft.max_shafts, self.capabilities.ascii));
        line.push('|');
        if empty {
            line.push_str(" EMPTY");
        }
        if view.pick_sent && view.loom_arms != dobby_view::Arms::Down {
            line.push_str(" PENDING");
        }
        line
    }

    fn render_prompt_line(&self, view: &ViewState) -> String {
        match view.mode {
            Mode::PickEntry => format!("Enter the new pick number: {}", view.entry_buffer),
            Mode::PickListEntry => format!("Enter the new pick list: {}", view.entry_buffer),
            _ => {
                let label = PickLabel::from_pick(view.next_pick);
                let mut hint = prompt::command_hint(view.mode, label);
                if let Some(err) = &view.last_error {
                    hint.push_str("  -- ");
                    hint.push_str(err);
                }
                hint
            }
        }
    }
}

impl dobby_proto::Render for Renderer {
    fn draw(&mut self, terminal: &Terminal, draft: &Draft, view: &ViewState) -> Result<()> {
        let (cols, _rows) = terminal.size().unwrap_or((80, 24));
        let drawdown_line = self.render_drawdown_line(draft, view, cols);
        terminal.write_row(PROMPT_ROW, &drawdown_line)?;
        terminal.write_row(PROMPT_ROW + 1, &self.render_prompt_line(view))?;
        Ok(())
    }

    fn draw_warning(&mut self, terminal: &Terminal, message: &str) -> Result<()> {
        terminal.write_row(PROMPT_ROW + 2, &format!("warning: {message}"))?;
        Ok(())
    }

    fn ring_bell(&mut self, view: &ViewState) -> Result<()> {
        if self.bell.should_ring(self.color_alert, &view.weft_ring) {
            write!(std::io::stdout(), "\x07")?;
            std::io::stdout().flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dobby_color::Color;
    use dobby_terminal::AnsiMode;

    fn draft() -> Draft {
        Draft {
            max_shafts: 4,
            max_treadles: 4,
            rising_shed: true,
            ends: 4,
            picks: 2,
            threading: vec![0, 0b0001, 0b0010, 0b0100, 0b1000],
            liftplan: vec![0, 0b0001, 0b0010],
            warp_color: vec![Color::new(1.0, 1.0, 1.0); 5],
            weft_color: vec![Color::new(0.0, 0.0, 1.0); 3],
        }
    }

    fn renderer() -> Renderer {
        Renderer::new(
            Capabilities::new(true, AnsiMode::No),
            DobbyType::Positive,
            0b0101,
            0b1010,
            Color::new(0.2, 0.2, 0.2),
            ColorAlert::None,
        )
    }

    #[test]
    fn drawdown_line_includes_pick_number_and_shaft_mask() {
        let r = renderer();
        let view = ViewState::new(vec![1, 2], 0, true);
        let line = r.render_drawdown_line(&draft(), &view, 80);
        assert!(line.contains("1 |") || line.contains("   1"));
        assert!(line.contains('*') || line.contains(' '));
    }

    #[test]
    fn empty_lift_appends_empty_marker() {
        let r = renderer();
        let mut d = draft();
        d.liftplan[1] = 0; // nothing raised
        let view = ViewState::new(vec![1, 2], 0, true);
        let line = r.render_drawdown_line(&d, &view, 80);
        assert!(line.contains("EMPTY"));
    }

    #[test]
    fn prompt_line_for_pick_entry_shows_buffer() {
        let r = renderer();
        let mut view = ViewState::new(vec![1, 2], 0, true);
        view.mode = Mode::PickEntry;
        view.entry_buffer.push_str("12");
        let line = r.render_prompt_line(&view);
        assert_eq!(line, "Enter the new pick number: 12");
    }
}
