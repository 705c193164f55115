//! The pick-list grammar compiler.
//!
//! Turns a pick-list string (as given on the command line or typed in
//! pick-list-entry mode) into a flat sequence of picks:
//!
//! ```text
//! picklist := term ("," term)*
//! term     := [multiplier "x"] atom
//! atom     := tabbyRun | group | range
//! tabbyRun := ("A" | "B" | "a" | "b")+
//! group    := "(" picklist ")"
//! range    := ["~"] integer [("-" | "~") integer]
//! multiplier := positive integer
//! ```
//!
//! A `~` means "wrap this pattern pick (or range of picks) with an
//! auto-tabby placeholder"; placeholders are resolved to a concrete tabby
//! letter in a second pass once the whole list is known, since which
//! letter comes next depends on how many pattern picks separated it from
//! the previous tabby.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PickError>;

pub const TABBY_A: i32 = -1;
pub const TABBY_B: i32 = -2;
const AUTO_TABBY: i32 = -3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PickError {
    #[error("Unbalanced parentheses in pick list.")]
    UnbalancedParentheses,
    #[error("Tabby entries make no sense in treadle-the-threading mode.")]
    TabbyInThreadingMode,
    #[error("Spurious ~ in treadling range.")]
    SpuriousTabbyMarker,
    #[error("Bad treadling range.")]
    BadRange,
    #[error("Pick list includes picks that are not in the wif file.")]
    OutOfRange,
    #[error("Unparsed text in treadling range.")]
    TrailingGarbage,
    #[error("Syntax error in treadling multiplier.")]
    BadMultiplier,
    #[error("Syntax error in treadling range.")]
    Syntax,
}

/// Compiles a pick-list string into a flat pick sequence. An empty
/// `pick_list` means "the whole liftplan in order" (`1..=max_pick`).
///
/// `pattern_before_tabby` and `tabby_a_first` are derived from the
/// configured tabby pattern (`xAyB`, `AxBy`, `xByA`, `BxAy`) by the
/// caller; this function only needs the two resulting flags.
pub fn compile(
    pick_list: &str,
    max_pick: u32,
    pattern_before_tabby: bool,
    tabby_a_first: bool,
    treadle_threading: bool,
) -> Result<Vec<i32>> {
    if pick_list.is_empty() {
        return Ok((1..=max_pick as i32).collect());
    }

    let max_pick = max_pick as i32;
    let mut picks = parse_picks(pick_list, max_pick, pattern_before_tabby, treadle_threading)?;
    resolve_auto_tabby(&mut picks, tabby_a_first);
    Ok(picks)
}

/// Replaces each `-3` auto-tabby placeholder with a concrete tabby letter.
/// Resets to `tabby_a_first` whenever more than one pattern pick has gone
/// by since the previous tabby, otherwise alternates.
fn resolve_auto_tabby(picks: &mut [i32], tabby_a_first: bool) {
    let mut tabby_is_a = tabby_a_first;
    let mut picks_since_tabby = 10; // anything > 1
    for pick in picks.iter_mut() {
        if *pick == AUTO_TABBY {
            if picks_since_tabby > 1 {
                tabby_is_a = tabby_a_first;
            }
            *pick = if tabby_is_a { TABBY_A } else { TABBY_B };
            tabby_is_a = !tabby_is_a;
            picks_since_tabby = 0;
        } else {
            picks_since_tabby += 1;
        }
    }
}

fn push_pick(pick: i32, out: &mut Vec<i32>, is_tabby: bool, pattern_before_tabby: bool) {
    if is_tabby {
        if pattern_before_tabby {
            out.push(pick);
            out.push(AUTO_TABBY);
        } else {
            out.push(AUTO_TABBY);
            out.push(pick);
        }
    } else {
        out.push(pick);
    }
}

fn parse_leading_int(s: &str) -> Option<(i32, usize)> {
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    s[..digits].parse::<i32>().ok().map(|v| (v, digits))
}

/// Finds the byte index of the `)` that matches the `(` at `s[0]`, or
/// `None` if the parentheses never balance.
fn find_matching_paren(s: &str) -> Option<usize> {
    let mut level = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => level += 1,
            ')' => level -= 1,
            _ => {}
        }
        if level == 0 {
            return Some(i);
        }
        if level < 0 {
            return None;
        }
    }
    None
}

fn parse_picks(
    mut s: &str,
    max_pick: i32,
    pattern_before_tabby: bool,
    treadle_threading: bool,
) -> Result<Vec<i32>> {
    let mut out = Vec::new();
    while !s.is_empty() {
        let (pick_range, mult, rest) =
            parse_term(s, max_pick, pattern_before_tabby, treadle_threading)?;
        s = rest;
        for _ in 0..mult {
            out.extend_from_slice(&pick_range);
        }
    }
    Ok(out)
}

/// Parses one `[multiplier "x"] atom` term and the trailing `,` if any,
/// returning the atom's expanded picks, its multiplier, and the remaining
/// input.
fn parse_term<'a>(
    mut s: &'a str,
    max_pick: i32,
    pattern_before_tabby: bool,
    treadle_threading: bool,
) -> Result<(Vec<i32>, i32, &'a str)> {
    let mut mult = 1;
    if let Some(x_pos) = s.find('x') {
        if s.as_bytes().first().is_some_and(u8::is_ascii_digit) {
            if let Some((value, consumed)) = parse_leading_int(s) {
                if consumed == x_pos {
                    if value < 1 {
                        return Err(PickError::BadMultiplier);
                    }
                    mult = value;
                    s = &s[x_pos + 1..];
                    if s.is_empty() || s.starts_with(',') {
                        return Err(PickError::BadMultiplier);
                    }
                }
            }
        }
    }

    let mut pick_range = Vec::new();
    let first = s.as_bytes().first().copied();
    match first {
        Some(b) if b.is_ascii_alphabetic() && matches!(b.to_ascii_lowercase(), b'a' | b'b') => {
            if treadle_threading {
                return Err(PickError::TabbyInThreadingMode);
            }
            while let Some(b) = s.as_bytes().first().copied() {
                match b.to_ascii_lowercase() {
                    b'a' => pick_range.push(TABBY_A),
                    b'b' => pick_range.push(TABBY_B),
                    _ => break,
                }
                s = &s[1..];
            }
        }
        Some(b'(') => {
            let Some(close) = find_matching_paren(s) else {
                return Err(PickError::UnbalancedParentheses);
            };
            pick_range = parse_picks(&s[1..close], max_pick, pattern_before_tabby, treadle_threading)?;
            s = &s[close + 1..];
        }
        _ => {
            let mut tabby_range = s.starts_with('~');
            if tabby_range {
                s = &s[1..];
            }
            if tabby_range && treadle_threading {
                return Err(PickError::TabbyInThreadingMode);
            }
            let (start, consumed) = parse_leading_int(s).ok_or(PickError::Syntax)?;
            s = &s[consumed..];
            let mut end = start;
            match s.as_bytes().first().copied() {
                Some(sep @ (b'~' | b'-')) => {
                    let sep_is_tilde = sep == b'~';
                    if sep_is_tilde && treadle_threading {
                        return Err(PickError::TabbyInThreadingMode);
                    }
                    tabby_range = tabby_range || sep_is_tilde;
                    s = &s[1..];
                    let (e, consumed) = parse_leading_int(s).ok_or(PickError::Syntax)?;
                    end = e;
                    s = &s[consumed..];
                }
                _ => {}
            }
            // A range consumes at most one separator tilde; a tilde left
            // dangling right after it (e.g. "~1~2~3") is spurious, not a
            // second valid range marker.
            if s.starts_with('~') {
                return Err(PickError::SpuriousTabbyMarker);
            }
            if start < 1 || end < 1 {
                return Err(PickError::BadRange);
            }
            if start > max_pick || end > max_pick {
                return Err(PickError::OutOfRange);
            }
            if start <= end {
                for p in start..=end {
                    push_pick(p, &mut pick_range, tabby_range, pattern_before_tabby);
                }
            } else {
                for p in (end..=start).rev() {
                    push_pick(p, &mut pick_range, tabby_range, pattern_before_tabby);
                }
            }
        }
    }

    match s.as_bytes().first().copied() {
        None => {}
        Some(b',') => s = &s[1..],
        Some(_) => return Err(PickError::TrailingGarbage),
    }

    Ok((pick_range, mult, s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pick_list_is_whole_liftplan() {
        assert_eq!(compile("", 5, true, true, false).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn single_pick() {
        assert_eq!(compile("3", 10, true, true, false).unwrap(), vec![3]);
    }

    #[test]
    fn ascending_and_descending_ranges() {
        assert_eq!(compile("1-3", 10, true, true, false).unwrap(), vec![1, 2, 3]);
        assert_eq!(compile("3-1", 10, true, true, false).unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn comma_separated_terms() {
        assert_eq!(compile("1,2,3", 10, true, true, false).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn multiplier_repeats_the_atom() {
        assert_eq!(compile("3x2", 10, true, true, false).unwrap(), vec![2, 2, 2]);
    }

    #[test]
    fn multiplier_repeats_a_group() {
        assert_eq!(compile("2x(1,2)", 10, true, true, false).unwrap(), vec![1, 2, 1, 2]);
    }

    #[test]
    fn tabby_run_expands_letters() {
        assert_eq!(compile("AB", 10, true, true, false).unwrap(), vec![TABBY_A, TABBY_B]);
        assert_eq!(compile("ab", 10, true, true, false).unwrap(), vec![TABBY_A, TABBY_B]);
    }

    #[test]
    fn tabby_in_threading_mode_is_an_error() {
        assert_eq!(
            compile("AB", 10, true, true, true).unwrap_err(),
            PickError::TabbyInThreadingMode
        );
        assert_eq!(
            compile("~1", 10, true, true, true).unwrap_err(),
            PickError::TabbyInThreadingMode
        );
    }

    #[test]
    fn single_pick_with_auto_tabby() {
        // xAyB -> pattern_before_tabby=true, tabby_a_first=true
        let picks = compile("~1,~2", 10, true, true, false).unwrap();
        assert_eq!(picks, vec![1, TABBY_A, 2, TABBY_B]);
    }

    #[test]
    fn range_with_auto_tabby_alternates_only_after_a_gap() {
        // Consecutive tabby-wrapped picks (no plain pick between them) keep
        // alternating rather than resetting.
        let picks = compile("~1~3", 10, true, true, false).unwrap();
        assert_eq!(
            picks,
            vec![1, TABBY_A, 2, TABBY_B, 3, TABBY_A]
        );
    }

    #[test]
    fn pattern_after_tabby_flips_pair_order() {
        // xByA -> pattern_before_tabby=false, tabby_a_first=false
        let picks = compile("~1", 10, false, false, false).unwrap();
        assert_eq!(picks, vec![TABBY_B, 1]);
    }

    #[test]
    fn unbalanced_parentheses_is_an_error() {
        assert_eq!(
            compile("(1,2", 10, true, true, false).unwrap_err(),
            PickError::UnbalancedParentheses
        );
    }

    #[test]
    fn spurious_tabby_marker_is_an_error() {
        assert_eq!(
            compile("~1~2~3", 10, true, true, false).unwrap_err(),
            PickError::SpuriousTabbyMarker
        );
    }

    #[test]
    fn out_of_range_pick_is_an_error() {
        assert_eq!(compile("11", 10, true, true, false).unwrap_err(), PickError::OutOfRange);
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        assert_eq!(compile("1 2", 10, true, true, false).unwrap_err(), PickError::TrailingGarbage);
    }

    #[test]
    fn nested_groups_compose() {
        let picks = compile("(1,(2,3))", 10, true, true, false).unwrap();
        assert_eq!(picks, vec![1, 2, 3]);
    }
}
