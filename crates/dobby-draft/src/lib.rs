//! The abstract weaving draft and its two file-format loaders.
//!
//! Both [`wif`] and [`dtx`] parse a file on disk into the same [`Draft`]
//! shape; the loom protocol engine and renderer never need to know which
//! loader produced a given draft.

pub mod dtx;
mod error;
pub mod polarity;
pub mod wif;

pub use error::DraftError;
pub use polarity::DobbyType;

pub type Result<T> = std::result::Result<T, DraftError>;

use dobby_color::Color;

/// A compiled weaving draft: threading, liftplan, and the colors used to
/// render a drawdown preview.
///
/// All sequences are 1-based: index `0` is an unused sentinel, kept so a
/// 1-based pick or end number can index directly without an off-by-one
/// subtraction at every call site.
#[derive(Debug, Clone)]
pub struct Draft {
    pub max_shafts: u32,
    pub max_treadles: u32,
    pub rising_shed: bool,
    pub ends: u32,
    pub picks: u32,
    /// `threading[end]`: the bitmask of shafts that end is threaded
    /// through, or `0` if the end is not threaded on any shaft. WIF limits
    /// this to a single bit (multi-shaft ends are not supported by that
    /// format); DTX allows more than one.
    pub threading: Vec<u64>,
    /// `liftplan[pick]`: the bitmask of shafts raised on that pick.
    pub liftplan: Vec<u64>,
    pub warp_color: Vec<Color>,
    pub weft_color: Vec<Color>,
}

impl Draft {
    /// Bitmask with the low `max_shafts` bits set; used to mask a lift
    /// against the loom's actual shaft count.
    pub fn shaft_mask(&self) -> u64 {
        if self.max_shafts >= 64 {
            u64::MAX
        } else {
            (1u64 << self.max_shafts) - 1
        }
    }

    /// Validates the invariants spec.md §8 requires of any loaded draft:
    /// vector lengths and in-range shaft bits. Out-of-range shafts/treadles
    /// are dropped with a warning rather than rejected (a tolerated
    /// anomaly), so this only errs on lengths that can't be repaired.
    fn validate(mut self) -> Result<Self> {
        if self.threading.len() != self.ends as usize + 1 {
            return Err(DraftError::InvalidValue {
                section: "THREADING".into(),
                field: "length".into(),
                reason: format!(
                    "expected {} ends, got {}",
                    self.ends,
                    self.threading.len().saturating_sub(1)
                ),
            });
        }
        if self.liftplan.len() != self.picks as usize + 1 {
            return Err(DraftError::InvalidValue {
                section: "LIFTPLAN".into(),
                field: "length".into(),
                reason: format!(
                    "expected {} picks, got {}",
                    self.picks,
                    self.liftplan.len().saturating_sub(1)
                ),
            });
        }
        let mask = self.shaft_mask();
        for (end, shaft) in self.threading.iter_mut().enumerate().skip(1) {
            if *shaft & !mask != 0 {
                tracing::warn!(end, shaft, max_shafts = self.max_shafts, "threading references a shaft beyond the loom's capacity; dropping");
                *shaft &= mask;
            }
        }
        for (pick, lift) in self.liftplan.iter_mut().enumerate().skip(1) {
            if *lift & !mask != 0 {
                tracing::warn!(pick, max_shafts = self.max_shafts, "liftplan references a shaft beyond the loom's capacity; dropping");
                *lift &= mask;
            }
        }
        Ok(self)
    }
}

/// `liftplan[i] = OR over t in treadling[i] of tieup[t]`, the materialisation
/// rule shared by WIF and DTX when the source supplies a tie-up + treadling
/// instead of a liftplan directly.
pub(crate) fn liftplan_from_tieup_and_treadling(
    tieup: &[u64],
    treadling: &[Vec<u32>],
) -> Vec<u64> {
    treadling
        .iter()
        .map(|treadles| {
            treadles.iter().fold(0u64, |acc, &t| match tieup.get(t as usize) {
                Some(&mask) => acc | mask,
                None => {
                    tracing::warn!(treadle = t, tieup_len = tieup.len(), "treadling references a treadle beyond the tie-up table; dropping");
                    acc
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_draft() -> Draft {
        Draft {
            max_shafts: 8,
            max_treadles: 4,
            rising_shed: true,
            ends: 2,
            picks: 2,
            threading: vec![0, 0b1, 0b10],
            liftplan: vec![0, 0b1, 0b10],
            warp_color: vec![Color::default(); 3],
            weft_color: vec![Color::default(); 3],
        }
    }

    #[test]
    fn validate_accepts_well_formed_draft() {
        assert!(sample_draft().validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_threading() {
        let mut d = sample_draft();
        d.threading.pop();
        assert!(d.validate().is_err());
    }

    #[test]
    fn validate_drops_out_of_range_shafts() {
        let mut d = sample_draft();
        d.threading[1] = 0xFF00; // beyond 8 shafts
        let d = d.validate().unwrap();
        assert_eq!(d.threading[1], 0);
    }

    #[test]
    fn liftplan_materialises_from_tieup_and_treadling() {
        let tieup = vec![0, 0b001, 0b010, 0b100];
        let treadling = vec![vec![], vec![1, 2], vec![3]];
        let lift = liftplan_from_tieup_and_treadling(&tieup, &treadling);
        assert_eq!(lift, vec![0, 0b011, 0b100]);
    }
}
