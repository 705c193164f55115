//! Dobby polarity: whether a set lift bit means "raise" or "lower" on the
//! wire, and the inversion rule the renderer and the loom protocol engine
//! both need (spec §4.4 "Dobby polarity inversion").

/// The configured dobby head's lift polarity (spec §3 "dobby type").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DobbyType {
    /// A set bit raises the shaft.
    Positive,
    /// A set bit lowers the shaft.
    Negative,
    /// No physical dobby (test harness); never inverts.
    Virtual,
}

/// True if the raw liftplan bit must be flipped before it reaches the wire:
/// `dobby_type = Negative ∧ rising_shed` or `dobby_type = Positive ∧
/// ¬rising_shed`.
pub fn inverts(dobby_type: DobbyType, rising_shed: bool) -> bool {
    match dobby_type {
        DobbyType::Negative => rising_shed,
        DobbyType::Positive => !rising_shed,
        DobbyType::Virtual => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_dobby_inverts_on_rising_shed() {
        assert!(inverts(DobbyType::Negative, true));
        assert!(!inverts(DobbyType::Negative, false));
    }

    #[test]
    fn positive_dobby_inverts_on_sinking_shed() {
        assert!(!inverts(DobbyType::Positive, true));
        assert!(inverts(DobbyType::Positive, false));
    }

    #[test]
    fn virtual_dobby_never_inverts() {
        assert!(!inverts(DobbyType::Virtual, true));
        assert!(!inverts(DobbyType::Virtual, false));
    }
}
