//! WIF ("Weaving Information File") loader.
//!
//! WIF is a case-insensitive, `[SECTION]`-delimited, `key=value` text format
//! (an INI dialect). Parsing is delegated to [`configparser`] — the same
//! crate `mdsherry-wif` uses for this exact format — after a small
//! preprocessing pass that strips `;` comments and joins `\`-continued
//! lines, since WIF's comment/continuation rules are not guaranteed to
//! match `configparser`'s own.

use crate::{liftplan_from_tieup_and_treadling, Draft, DraftError, Result};
use configparser::ini::Ini;
use dobby_color::Color;
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub fn load(path: &Path) -> Result<Draft> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<Draft> {
    let preprocessed = preprocess(content);
    let mut ini = Ini::new();
    ini.read(preprocessed).map_err(DraftError::Syntax)?;

    if ini.get_map_ref().get("wif").is_none() {
        return Err(DraftError::MissingSection("WIF".into()));
    }

    let shafts = required_u32(&ini, "weaving", "shafts")?;
    if !(1..=40).contains(&shafts) {
        return Err(range_error("WEAVING", "Shafts", shafts, 1, 40));
    }
    let treadles = required_u32(&ini, "weaving", "treadles")?;
    if !(1..=64).contains(&treadles) {
        return Err(range_error("WEAVING", "Treadles", treadles, 1, 64));
    }
    let rising_shed = optional_bool(&ini, "weaving", "rising shed").unwrap_or(true);

    let ends = required_u32(&ini, "warp", "threads")?;
    if ends == 0 {
        return Err(DraftError::InvalidValue {
            section: "WARP".into(),
            field: "Threads".into(),
            reason: "must be > 0".into(),
        });
    }
    let picks = required_u32(&ini, "weft", "threads")?;
    if picks == 0 {
        return Err(DraftError::InvalidValue {
            section: "WEFT".into(),
            field: "Threads".into(),
            reason: "must be > 0".into(),
        });
    }

    let contents = contents_flags(&ini);

    let color_table = if contents.contains("color palette") {
        let range = optional_range(&ini, "color palette", "range")?.unwrap_or((0, 255));
        read_color_table(&ini, range)?
    } else {
        HashMap::new()
    };

    let default_warp_idx = optional_u32(&ini, "warp", "color")?.unwrap_or(1);
    let default_weft_idx = optional_u32(&ini, "weft", "color")?.unwrap_or(2);

    let warp_color = build_color_sequence(
        &ini,
        "warp colors",
        ends,
        &color_table,
        default_warp_idx,
        Color::new(1.0, 1.0, 1.0),
    )?;
    let weft_color = build_color_sequence(
        &ini,
        "weft colors",
        picks,
        &color_table,
        default_weft_idx,
        Color::new(0.0, 0.0, 1.0),
    )?;

    let threading = read_single_table(&ini, "threading", ends, "THREADING")?;

    let has_liftplan = contents.contains("liftplan");
    let has_treadling = contents.contains("treadling");
    if has_liftplan && has_treadling {
        tracing::warn!("WIF draft has both LIFTPLAN and TREADLING sections; LIFTPLAN wins");
    }

    let liftplan = if has_liftplan {
        read_list_table(&ini, "liftplan", picks, "LIFTPLAN")?
    } else if has_treadling {
        if !contents.contains("tieup") {
            return Err(DraftError::MissingSection("TIEUP".into()));
        }
        let tieup_lists = read_list_table(&ini, "tieup", treadles, "TIEUP")?;
        let tieup: Vec<u64> = tieup_lists;
        let treadling_lists = read_list_table_numbers(&ini, "treadling", picks, "TREADLING")?;
        liftplan_from_tieup_and_treadling(&tieup, &treadling_lists)
    } else {
        return Err(DraftError::MissingSection("LIFTPLAN or TIEUP+TREADLING".into()));
    };

    let draft = Draft {
        max_shafts: shafts,
        max_treadles: treadles,
        rising_shed,
        ends,
        picks,
        threading,
        liftplan,
        warp_color,
        weft_color,
    };
    draft.validate()
}

fn preprocess(content: &str) -> String {
    let mut joined = String::with_capacity(content.len());
    let mut pending: Option<String> = None;
    for raw_line in content.lines() {
        let line = match pending.take() {
            Some(mut prefix) => {
                prefix.push_str(raw_line);
                prefix
            }
            None => raw_line.to_string(),
        };
        if let Some(stripped) = line.strip_suffix('\\') {
            pending = Some(stripped.to_string());
            continue;
        }
        let uncommented = strip_comment(&line);
        joined.push_str(uncommented.trim());
        joined.push('\n');
    }
    if let Some(prefix) = pending {
        joined.push_str(prefix.trim());
        joined.push('\n');
    }
    joined
}

fn strip_comment(line: &str) -> &str {
    // `;` starts a comment unless inside a `[SECTION]` header.
    let trimmed = line.trim_start();
    if trimmed.starts_with('[') {
        return line;
    }
    match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn contents_flags(ini: &Ini) -> HashSet<String> {
    let mut set = HashSet::new();
    if let Some(section) = ini.get_map_ref().get("contents") {
        for (k, v) in section {
            if let Some(v) = v {
                if truthy(v) {
                    set.insert(k.to_lowercase());
                }
            }
        }
    }
    set
}

fn truthy(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "on" | "1")
}

fn required_u32(ini: &Ini, section: &str, field: &str) -> Result<u32> {
    optional_u32(ini, section, field)?.ok_or_else(|| DraftError::MissingRequiredField {
        section: section.to_uppercase(),
        field: field.to_string(),
    })
}

fn optional_u32(ini: &Ini, section: &str, field: &str) -> Result<Option<u32>> {
    match ini.get(section, field) {
        Some(v) => v
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| DraftError::InvalidValue {
                section: section.to_uppercase(),
                field: field.to_string(),
                reason: format!("'{v}' is not an integer"),
            }),
        None => Ok(None),
    }
}

fn optional_bool(ini: &Ini, section: &str, field: &str) -> Option<bool> {
    ini.get(section, field).map(|v| truthy(&v))
}

fn optional_range(ini: &Ini, section: &str, field: &str) -> Result<Option<(i64, i64)>> {
    match ini.get(section, field) {
        None => Ok(None),
        Some(v) => {
            let mut parts = v.split(',').map(|p| p.trim().parse::<i64>());
            let low = parts.next().transpose().map_err(|_| bad_value(section, field, &v))?;
            let high = parts.next().transpose().map_err(|_| bad_value(section, field, &v))?;
            match (low, high) {
                (Some(low), Some(high)) => Ok(Some((low, high))),
                _ => Err(bad_value(section, field, &v)),
            }
        }
    }
}

fn bad_value(section: &str, field: &str, raw: &str) -> DraftError {
    DraftError::InvalidValue {
        section: section.to_uppercase(),
        field: field.to_string(),
        reason: format!("could not parse '{raw}'"),
    }
}

fn range_error(section: &str, field: &str, value: u32, min: u32, max: u32) -> DraftError {
    DraftError::InvalidValue {
        section: section.into(),
        field: field.into(),
        reason: format!("{value} not in {min}..={max}"),
    }
}

fn read_color_table(ini: &Ini, range: (i64, i64)) -> Result<HashMap<u32, Color>> {
    let mut table = HashMap::new();
    let Some(section) = ini.get_map_ref().get("color table") else {
        return Ok(table);
    };
    for (k, v) in section {
        let Ok(idx) = k.parse::<u32>() else { continue };
        let Some(v) = v else { continue };
        let mut parts = v.split(',').map(|p| p.trim().parse::<i64>());
        let (r, g, b) = (
            parts.next().transpose().ok().flatten(),
            parts.next().transpose().ok().flatten(),
            parts.next().transpose().ok().flatten(),
        );
        let (Some(r), Some(g), Some(b)) = (r, g, b) else {
            return Err(bad_value("COLOR TABLE", &idx.to_string(), &v));
        };
        table.insert(idx, Color::from_range((r, g, b), range)?);
    }
    Ok(table)
}

/// Builds the per-end or per-pick color sequence (index `0` is a sentinel):
/// an explicit `WARP COLORS`/`WEFT COLORS` palette index if present,
/// otherwise the section's default color, otherwise the built-in fallback.
fn build_color_sequence(
    ini: &Ini,
    section: &str,
    count: u32,
    color_table: &HashMap<u32, Color>,
    default_idx: u32,
    builtin_fallback: Color,
) -> Result<Vec<Color>> {
    let default_color = color_table
        .get(&default_idx)
        .copied()
        .unwrap_or(builtin_fallback);

    let assigned = ini.get_map_ref().get(section).cloned().unwrap_or_default();
    let mut out = vec![Color::default(); count as usize + 1];
    for (k, v) in assigned {
        let Ok(idx) = k.parse::<u32>() else { continue };
        if idx == 0 || idx > count {
            tracing::warn!(section, idx, count, "color index beyond declared count; dropping");
            continue;
        }
        let Some(v) = v else { continue };
        let palette_idx: u32 = v
            .trim()
            .parse()
            .map_err(|_| bad_value(section, &idx.to_string(), &v))?;
        out[idx as usize] = color_table.get(&palette_idx).copied().unwrap_or(default_color);
    }
    for slot in out.iter_mut().skip(1) {
        if *slot == Color::default() {
            *slot = default_color;
        }
    }
    Ok(out)
}

/// Reads a numbered section whose values are a single integer each (used by
/// THREADING, whose entries must be a single shaft per WIF's rules).
fn read_single_table(ini: &Ini, section: &str, count: u32, label: &str) -> Result<Vec<u64>> {
    let mut out = vec![0u64; count as usize + 1];
    let Some(map) = ini.get_map_ref().get(section) else {
        return Ok(out);
    };
    for (k, v) in map {
        let Ok(idx) = k.parse::<u32>() else { continue };
        if idx == 0 || idx > count {
            tracing::warn!(section = label, idx, count, "entry beyond declared count; dropping");
            continue;
        }
        let Some(v) = v else { continue };
        if v.contains(',') {
            return Err(DraftError::InvalidValue {
                section: label.into(),
                field: idx.to_string(),
                reason: "multi-shaft ends are not supported".into(),
            });
        }
        let shaft: u32 = v
            .trim()
            .parse()
            .map_err(|_| bad_value(label, &idx.to_string(), v))?;
        out[idx as usize] = if shaft == 0 { 0 } else { 1u64 << (shaft - 1) };
    }
    Ok(out)
}

/// Reads a numbered section whose values are comma-separated lists of shaft
/// or treadle numbers, folded into a bitmask per entry (LIFTPLAN, TIEUP).
fn read_list_table(ini: &Ini, section: &str, count: u32, label: &str) -> Result<Vec<u64>> {
    let lists = read_list_table_numbers(ini, section, count, label)?;
    Ok(lists
        .into_iter()
        .map(|nums| nums.into_iter().fold(0u64, |acc, n| acc | (1u64 << (n - 1))))
        .collect())
}

fn read_list_table_numbers(
    ini: &Ini,
    section: &str,
    count: u32,
    label: &str,
) -> Result<Vec<Vec<u32>>> {
    let mut out = vec![Vec::new(); count as usize + 1];
    let Some(map) = ini.get_map_ref().get(section) else {
        return Ok(out);
    };
    for (k, v) in map {
        let Ok(idx) = k.parse::<u32>() else { continue };
        if idx == 0 || idx > count {
            tracing::warn!(section = label, idx, count, "entry beyond declared count; dropping");
            continue;
        }
        let Some(v) = v else { continue };
        let mut nums = Vec::new();
        for piece in v.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let n: u32 = piece
                .parse()
                .map_err(|_| bad_value(label, &idx.to_string(), v))?;
            if n > 0 {
                nums.push(n);
            }
        }
        out[idx as usize] = nums;
    }
    Ok(out)
}
