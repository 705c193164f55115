//! DTX loader — the tie-up/liftplan-centric file format several Compu-Dobby
//! tools (e.g. FiberWorks) export alongside WIF.
//!
//! Unlike WIF's `[SECTION]`/`key=value` shape, DTX lays sections out as
//! `@@SectionName` markers followed by raw lines until the next marker (or
//! blank line), with `%%key value` pairs inside `@@Info`. Sections are
//! sought independently rather than streamed in order, mirroring how the
//! format is actually read in practice: a section can be looked up by name
//! regardless of where it sits in the file.

use crate::{Draft, DraftError, Result};
use dobby_color::Color;
use std::collections::HashSet;
use std::path::Path;

pub fn load(path: &Path) -> Result<Draft> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<Draft> {
    let lines: Vec<&str> = content.lines().collect();

    if find_section(&lines, "StartDTX").is_none() {
        return Err(DraftError::MissingSection("StartDTX".into()));
    }

    let contents = read_contents(&lines)?;
    let has_liftplan = contents.contains("liftplan");
    let has_tieup_treadling = contents.contains("tieup") && contents.contains("treadling");
    if !has_liftplan && !has_tieup_treadling {
        return Err(DraftError::MissingSection("Liftplan or Tieup+Treadling".into()));
    }
    if has_liftplan && has_tieup_treadling {
        tracing::warn!("DTX draft has both Liftplan and Tieup+Treadling; using Liftplan");
    }
    let has_color = contents.contains("color palet")
        && contents.contains("warp colors")
        && contents.contains("weft colors");

    let shafts = read_info_u32(&lines, "shafts")?;
    let treadles = read_info_u32(&lines, "treadles")?;
    let ends = read_info_u32(&lines, "ends")?;
    let picks = read_info_u32(&lines, "picks")?;

    let (warp_color, weft_color) = if has_color {
        let palette = read_color_palette(&lines)?;
        if palette.len() < 2 {
            return Err(DraftError::InvalidValue {
                section: "Color Palet".into(),
                field: "entries".into(),
                reason: "must have at least 2 colors".into(),
            });
        }
        let warp = read_color_section(&lines, "Warp Colors", &palette)?;
        let weft = read_color_section(&lines, "Weft Colors", &palette)?;
        if warp.len() != ends as usize + 1 {
            return Err(DraftError::InvalidValue {
                section: "Warp Colors".into(),
                field: "length".into(),
                reason: format!("expected {ends} ends, got {}", warp.len().saturating_sub(1)),
            });
        }
        if weft.len() != picks as usize + 1 {
            return Err(DraftError::InvalidValue {
                section: "Weft Colors".into(),
                field: "length".into(),
                reason: format!("expected {picks} picks, got {}", weft.len().saturating_sub(1)),
            });
        }
        (warp, weft)
    } else {
        (
            vec![Color::new(1.0, 1.0, 1.0); ends as usize + 1],
            vec![Color::new(0.0, 0.0, 1.0); picks as usize + 1],
        )
    };

    let threading = read_section_to_vector(&lines, "Threading")?;

    let (liftplan, sinking_shed) = if has_liftplan {
        let mut sinking = false;
        let liftplan = read_liftplan(&lines, &mut sinking)?;
        if liftplan.len() != picks as usize + 1 {
            return Err(DraftError::InvalidValue {
                section: "Liftplan".into(),
                field: "length".into(),
                reason: format!("expected {picks} picks, got {}", liftplan.len().saturating_sub(1)),
            });
        }
        (liftplan, sinking)
    } else {
        let mut sinking = false;
        let tieup = read_tieup(&lines, &mut sinking)?;
        if tieup.len() != treadles as usize + 1 {
            return Err(DraftError::InvalidValue {
                section: "Tieup".into(),
                field: "length".into(),
                reason: format!("expected {treadles} treadles, got {}", tieup.len().saturating_sub(1)),
            });
        }
        let treadling = read_section_to_vector(&lines, "Treadling")?;
        if treadling.len() != picks as usize + 1 {
            return Err(DraftError::InvalidValue {
                section: "Treadling".into(),
                field: "length".into(),
                reason: format!("expected {picks} picks, got {}", treadling.len().saturating_sub(1)),
            });
        }
        let liftplan = treadling
            .iter()
            .map(|&treadle_mask| {
                let mut lift = 0u64;
                let mut mask = treadle_mask;
                let mut treadle = 1usize;
                while mask != 0 {
                    if mask & 1 != 0 {
                        lift |= tieup.get(treadle).copied().unwrap_or(0);
                    }
                    mask >>= 1;
                    treadle += 1;
                }
                lift
            })
            .collect();
        (liftplan, sinking)
    };

    let draft = Draft {
        max_shafts: shafts,
        max_treadles: treadles,
        rising_shed: !sinking_shed,
        ends,
        picks,
        threading,
        liftplan,
        warp_color,
        weft_color,
    };
    draft.validate()
}

fn trimmed(line: &str) -> &str {
    line.trim()
}

/// Locates a `@@Name` marker anywhere in the file and returns the index of
/// the first line after it.
fn find_section(lines: &[&str], name: &str) -> Option<usize> {
    let marker = format!("@@{name}");
    lines
        .iter()
        .position(|l| trimmed(l) == marker)
        .map(|idx| idx + 1)
}

/// Lines belonging to a section run until a blank line or the next `@@`
/// marker.
fn section_lines<'a>(lines: &'a [&'a str], name: &str) -> Option<&'a [&'a str]> {
    let start = find_section(lines, name)?;
    let mut end = start;
    while end < lines.len() {
        let line = trimmed(lines[end]);
        if line.is_empty() || line.starts_with("@@") {
            break;
        }
        end += 1;
    }
    Some(&lines[start..end])
}

fn read_contents(lines: &[&str]) -> Result<HashSet<String>> {
    let section = section_lines(lines, "Contents").unwrap_or(&[]);
    if section.is_empty() {
        return Err(DraftError::MissingSection("Contents".into()));
    }
    Ok(section.iter().map(|l| trimmed(l).to_lowercase()).collect())
}

fn read_info_u32(lines: &[&str], key: &str) -> Result<u32> {
    let section = section_lines(lines, "Info").unwrap_or(&[]);
    for line in section {
        let line = trimmed(line);
        let Some(rest) = line.strip_prefix("%%") else {
            return Err(DraftError::Syntax(format!(
                "malformed line in Info section: '{line}'"
            )));
        };
        let Some((name, value)) = rest.split_once(' ') else {
            return Err(DraftError::Syntax(format!(
                "malformed line in Info section: '{line}'"
            )));
        };
        if name.eq_ignore_ascii_case(key) {
            return value
                .trim()
                .parse()
                .map_err(|_| DraftError::InvalidValue {
                    section: "Info".into(),
                    field: key.into(),
                    reason: format!("'{value}' is not an integer"),
                });
        }
    }
    Err(DraftError::MissingRequiredField {
        section: "Info".into(),
        field: key.into(),
    })
}

fn read_color_palette(lines: &[&str]) -> Result<Vec<Color>> {
    let section = section_lines(lines, "Color Palet").unwrap_or(&[]);
    let mut palette = Vec::with_capacity(section.len());
    for line in section {
        let line = trimmed(line);
        let mut parts = line.split(',').map(|p| p.trim().parse::<i64>());
        let (r, g, b) = (
            parts.next().transpose().ok().flatten(),
            parts.next().transpose().ok().flatten(),
            parts.next().transpose().ok().flatten(),
        );
        let (Some(r), Some(g), Some(b)) = (r, g, b) else {
            return Err(DraftError::Syntax(format!(
                "parse error in color palette line '{line}'"
            )));
        };
        palette.push(Color::from_range((r, g, b), (0, 255))?);
    }
    Ok(palette)
}

/// A warp/weft color section: whitespace-separated palette indices, one per
/// end/pick, returned as a 1-based `Vec` (index `0` is the sentinel).
fn read_color_section(lines: &[&str], name: &str, palette: &[Color]) -> Result<Vec<Color>> {
    let section = section_lines(lines, name).unwrap_or(&[]);
    let mut colors = vec![Color::default()];
    for line in section {
        for token in trimmed(line).split_whitespace() {
            let idx: usize = token.parse().map_err(|_| {
                DraftError::Syntax(format!("parse error in {name} section: '{token}'"))
            })?;
            let color = palette.get(idx).copied().ok_or_else(|| DraftError::InvalidValue {
                section: name.into(),
                field: token.into(),
                reason: "color index outside of the palette".into(),
            })?;
            colors.push(color);
        }
    }
    Ok(colors)
}

/// Threading and treadling: each whitespace-separated term is a
/// comma-separated list of 1-based shaft/treadle numbers folded into a
/// bitmask, one term per end/pick. Returned 1-based.
fn read_section_to_vector(lines: &[&str], name: &str) -> Result<Vec<u64>> {
    let section = section_lines(lines, name).unwrap_or(&[]);
    let mut out = vec![0u64];
    for line in section {
        for term in trimmed(line).split_whitespace() {
            let mut mask = 0u64;
            for piece in term.split(',') {
                if piece == "0" || piece.is_empty() {
                    continue;
                }
                let n: u32 = piece.parse().map_err(|_| {
                    DraftError::Syntax(format!("parse error in {name} section: '{term}'"))
                })?;
                mask |= 1u64 << (n - 1);
            }
            out.push(mask);
        }
    }
    Ok(out)
}

/// The tie-up matrix: rows of `0`/`1` characters, one column per treadle.
/// Rows are read bottom-up in the file, but DrawBoy's original tool
/// prepends each line as it's read, so the file's *last* row ends up as
/// shaft 1 — that inversion is reproduced here rather than "fixed".
fn read_tieup(lines: &[&str], sinking: &mut bool) -> Result<Vec<u64>> {
    let section = section_lines(lines, "Tieup").unwrap_or(&[]);
    let mut rows: Vec<&str> = Vec::with_capacity(section.len());
    for line in section {
        let line = trimmed(line);
        if line == "%%%%sinking" {
            *sinking = true;
            continue;
        }
        rows.insert(0, line);
    }
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let treadle_count = first.len();
    let shaft_count = rows.len();
    let mut tieup = vec![0u64; treadle_count + 1];
    for (shaft_idx, row) in rows.iter().enumerate() {
        for (treadle_idx, ch) in row.chars().enumerate().take(treadle_count) {
            if ch == '1' {
                tieup[treadle_idx + 1] |= 1u64 << shaft_idx;
            }
        }
    }
    let _ = shaft_count;
    Ok(tieup)
}

/// The liftplan matrix: rows of `0`/`1` characters, one column per shaft,
/// one row per pick, read in file order (unlike `@@Tieup`, no inversion).
fn read_liftplan(lines: &[&str], sinking: &mut bool) -> Result<Vec<u64>> {
    let section = section_lines(lines, "Liftplan").unwrap_or(&[]);
    let mut liftplan = vec![0u64];
    for line in section {
        let line = trimmed(line);
        if line == "%%%%sinking" {
            *sinking = true;
            continue;
        }
        let mut lift = 0u64;
        for (idx, ch) in line.chars().enumerate() {
            if ch == '1' {
                lift |= 1u64 << idx;
            }
        }
        liftplan.push(lift);
    }
    Ok(liftplan)
}
