//! Color-alert bell (spec §4.4 "Color-alert bell"): decides whether the
//! terminal bell should ring after a pick is committed, based on the last
//! few weft colors actually woven.

use dobby_view::WeftRing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorAlert {
    None,
    Simple,
    Pulse,
    Alternating,
}

/// Tracks whether the previous pick rang the bell, since `Pulse` suppresses
/// two bells in a row.
#[derive(Debug, Clone, Copy, Default)]
pub struct BellState {
    rang_last: bool,
}

impl BellState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call once per committed pick, after the new color has already been
    /// pushed onto `ring`. Returns whether to ring the bell now.
    pub fn should_ring(&mut self, mode: ColorAlert, ring: &WeftRing) -> bool {
        let rings = self.evaluate(mode, ring);
        self.rang_last = rings;
        rings
    }

    fn evaluate(&self, mode: ColorAlert, ring: &WeftRing) -> bool {
        match mode {
            ColorAlert::None => false,
            ColorAlert::Simple => warm(ring, 1) && changed(ring, 1),
            ColorAlert::Pulse => {
                if self.rang_last {
                    false
                } else {
                    warm(ring, 1) && changed(ring, 1)
                }
            }
            ColorAlert::Alternating => warm(ring, 2) && changed(ring, 2),
        }
    }
}

fn warm(ring: &WeftRing, n: usize) -> bool {
    ring.len() > n
}

fn changed(ring: &WeftRing, n: usize) -> bool {
    match (ring.ago(0), ring.ago(n)) {
        (Some(current), Some(past)) => current != past,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dobby_color::Color;

    fn ring_of(colors: &[Color]) -> WeftRing {
        let mut ring = WeftRing::default();
        for &c in colors {
            ring.push(c);
        }
        ring
    }

    const RED: Color = Color::new(1.0, 0.0, 0.0);
    const BLUE: Color = Color::new(0.0, 0.0, 1.0);

    #[test]
    fn none_never_rings() {
        let mut state = BellState::new();
        let ring = ring_of(&[RED, BLUE]);
        assert!(!state.should_ring(ColorAlert::None, &ring));
    }

    #[test]
    fn simple_rings_on_any_change_one_pick_back() {
        let mut state = BellState::new();
        let ring = ring_of(&[RED, BLUE]);
        assert!(state.should_ring(ColorAlert::Simple, &ring));
    }

    #[test]
    fn simple_suppressed_until_ring_is_warm() {
        let mut state = BellState::new();
        let ring = ring_of(&[RED]);
        assert!(!state.should_ring(ColorAlert::Simple, &ring));
    }

    #[test]
    fn alternating_looks_two_picks_back_and_needs_more_warmup() {
        let mut state = BellState::new();
        let ring = ring_of(&[RED, BLUE]);
        assert!(!state.should_ring(ColorAlert::Alternating, &ring)); // not warm yet (needs >2)
        let ring = ring_of(&[RED, BLUE, RED]);
        assert!(!state.should_ring(ColorAlert::Alternating, &ring)); // two-ago == current
        let ring = ring_of(&[RED, BLUE, BLUE]);
        assert!(state.should_ring(ColorAlert::Alternating, &ring));
    }

    #[test]
    fn pulse_suppresses_two_consecutive_bells() {
        let mut state = BellState::new();
        // red, red, blue, red -- spec §8 scenario 5.
        let after_third = ring_of(&[RED, RED, BLUE]);
        assert!(state.should_ring(ColorAlert::Pulse, &after_third));
        let after_fourth = ring_of(&[RED, RED, BLUE, RED]);
        assert!(!state.should_ring(ColorAlert::Pulse, &after_fourth));
    }
}
