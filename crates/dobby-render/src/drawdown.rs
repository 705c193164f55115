//! Drawdown-row geometry and cell coloring (spec §4.4 "Renderer": the
//! drawdown row).
//!
//! Mirrors `DrawBoy::View::displayPick`'s drawdown loop: a fixed-width
//! window onto the leftmost ends, drawn right-to-left, one glyph per end
//! colored as "warp raised" or "weft shown" depending on the resolved
//! physical lift.

use dobby_color::Color;
use dobby_draft::{polarity, Draft, DobbyType};

/// One glyph of the drawdown row, already resolved to a color and a
/// raised/lowered glyph choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub color: Color,
    pub raised: bool,
}

/// `min(term_cols - shafts - 24, ends)`, floored at 10 (spec §4.4). The
/// floor can exceed `ends` for very narrow drafts; callers must still clamp
/// to `draft.ends` before indexing `threading` (the original C++ does not,
/// and reads past the end of the array for such drafts — see `DESIGN.md`).
pub fn width(term_cols: u16, max_shafts: u32, ends: u32) -> usize {
    let raw = term_cols as i64 - (max_shafts as i64 + 24);
    let w = raw.min(ends as i64);
    w.max(10).max(0) as usize
}

/// The physical lift bit for `end`, and whether that makes the end's warp
/// thread raised (shown) rather than the weft.
///
/// `lift` is assumed already polarity-adjusted (the same value that goes
/// out on the wire, per [`polarity::inverts`]) — this only re-derives
/// "raised" from "activated" the way the original does, rather than
/// reusing the inversion a second time.
fn raised(activated: bool, dobby_type: DobbyType) -> bool {
    match dobby_type {
        DobbyType::Negative => !activated,
        DobbyType::Positive | DobbyType::Virtual => activated,
    }
}

/// True if every shaft within the loom's capacity is either all raised or
/// all lowered — nothing to weave this pick (spec §12: the "EMPTY" marker
/// supplemented from `driver.cpp::displayPick`'s `emptyLift`).
pub fn is_empty_lift(lift: u64, shaft_mask: u64) -> bool {
    let masked = lift & shaft_mask;
    masked == 0 || masked == shaft_mask
}

/// Builds the drawdown row, right-to-left: `cells[0]` is the leftmost
/// glyph printed (the highest end index shown), `cells[last]` is end `1`.
pub fn build_row(
    draft: &Draft,
    dobby_type: DobbyType,
    lift: u64,
    weft_color: Color,
    row_width: usize,
) -> Vec<Cell> {
    let shown = row_width.min(draft.ends as usize);
    (1..=shown)
        .rev()
        .map(|end| {
            let activated = draft.threading[end] & lift != 0;
            let raised = raised(activated, dobby_type);
            let color = if raised {
                draft.warp_color[end]
            } else {
                weft_color
            };
            Cell { color, raised }
        })
        .collect()
}

/// Resolves the physical (wire-ready) lift and display weft color for a
/// non-tabby pattern pick, applying the dobby-polarity inversion (spec
/// §4.4 "Dobby polarity inversion").
pub fn resolve_pattern_pick(draft: &Draft, dobby_type: DobbyType, pick: u32) -> (u64, Color) {
    let mask = draft.shaft_mask();
    let raw = draft.liftplan.get(pick as usize).copied().unwrap_or(0);
    let lift = if polarity::inverts(dobby_type, draft.rising_shed) {
        (!raw) & mask
    } else {
        raw & mask
    };
    let weft_color = draft.weft_color.get(pick as usize).copied().unwrap_or_default();
    (lift, weft_color)
}
