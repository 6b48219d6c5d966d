//! Quadrant sign convention.
//!
//! A wind case name carries a quadrant token (`Q1`..`Q4`, optionally
//! preceded by an underscore) that mirrors a base load across the
//! structure's symmetry axes. All three load families share this one
//! convention:
//!
//! | Quadrant | a | b |
//! |----------|---|---|
//! | Q1       | + | + |
//! | Q2       | + | - |
//! | Q3       | - | - |
//! | Q4       | - | + |
//!
//! Applying a quadrant is not idempotent: applying Q2 twice undoes the sign
//! flip and restores the original signs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static QUADRANT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)_?Q([1-4])\b").expect("quadrant pattern is valid"));

/// Sign-convention bucket encoded in a load case name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Quadrant {
    #[default]
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [Quadrant::Q1, Quadrant::Q2, Quadrant::Q3, Quadrant::Q4];

    /// Quadrant from its number. Anything outside 1..=4 falls back to Q1.
    pub fn from_number(n: i64) -> Self {
        match n {
            2 => Quadrant::Q2,
            3 => Quadrant::Q3,
            4 => Quadrant::Q4,
            _ => Quadrant::Q1,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Quadrant::Q1 => 1,
            Quadrant::Q2 => 2,
            Quadrant::Q3 => 3,
            Quadrant::Q4 => 4,
        }
    }

    /// Sign multipliers (a, b)
    pub fn signs(&self) -> (f64, f64) {
        match self {
            Quadrant::Q1 => (1.0, 1.0),
            Quadrant::Q2 => (1.0, -1.0),
            Quadrant::Q3 => (-1.0, -1.0),
            Quadrant::Q4 => (-1.0, 1.0),
        }
    }
}

impl std::fmt::Display for Quadrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Q{}", self.number())
    }
}

/// Parses quadrant tokens and applies the shared sign table.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadrantSignResolver;

impl QuadrantSignResolver {
    pub fn new() -> Self {
        QuadrantSignResolver
    }

    /// Quadrant encoded in a case name. Total: no token, `None` or `""` give Q1.
    ///
    /// The first match wins. The token must end at a word boundary, so the
    /// digit in `WS_Q2_A15` is followed by a word character and does not count.
    pub fn quadrant_of(&self, case_name: Option<&str>) -> Quadrant {
        let name = match case_name {
            Some(n) if !n.is_empty() => n,
            _ => return Quadrant::Q1,
        };
        QUADRANT_TOKEN
            .captures(name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .map(Quadrant::from_number)
            .unwrap_or(Quadrant::Q1)
    }

    /// Apply the quadrant's sign multipliers to (a, b)
    pub fn apply(&self, quadrant: Quadrant, a: f64, b: f64) -> (f64, f64) {
        let (sa, sb) = quadrant.signs();
        (sa * a, sb * b)
    }

    /// Same as [`apply`](Self::apply) for a raw quadrant number (unknown → Q1)
    pub fn apply_number(&self, quadrant: i64, a: f64, b: f64) -> (f64, f64) {
        self.apply(Quadrant::from_number(quadrant), a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrant_parsing() {
        let r = QuadrantSignResolver::new();
        assert_eq!(r.quadrant_of(Some("X_Q1")), Quadrant::Q1);
        assert_eq!(r.quadrant_of(Some("X_Q3")), Quadrant::Q3);
        assert_eq!(r.quadrant_of(Some("WL Q4")), Quadrant::Q4);
        assert_eq!(r.quadrant_of(Some("wind_q2")), Quadrant::Q2);
    }

    #[test]
    fn test_quadrant_defaults_to_q1() {
        let r = QuadrantSignResolver::new();
        assert_eq!(r.quadrant_of(None), Quadrant::Q1);
        assert_eq!(r.quadrant_of(Some("")), Quadrant::Q1);
        assert_eq!(r.quadrant_of(Some("Strength III")), Quadrant::Q1);
        assert_eq!(r.quadrant_of(Some("X_Q5")), Quadrant::Q1);
        assert_eq!(r.quadrant_of(Some("X_Q22")), Quadrant::Q1);
    }

    #[test]
    fn test_token_needs_trailing_boundary() {
        let r = QuadrantSignResolver::new();
        assert_eq!(r.quadrant_of(Some("WS_Q2_A15")), Quadrant::Q1);
        assert_eq!(r.quadrant_of(Some("WS_A15_Q2")), Quadrant::Q2);
    }

    #[test]
    fn test_first_match_wins() {
        let r = QuadrantSignResolver::new();
        assert_eq!(r.quadrant_of(Some("WIND Q2 Q3")), Quadrant::Q2);
    }

    #[test]
    fn test_sign_table() {
        let r = QuadrantSignResolver::new();
        assert_eq!(r.apply(Quadrant::Q1, 0.2, 1.1), (0.2, 1.1));
        assert_eq!(r.apply(Quadrant::Q2, 0.2, 1.1), (0.2, -1.1));
        assert_eq!(r.apply(Quadrant::Q3, 0.2, 1.1), (-0.2, -1.1));
        assert_eq!(r.apply(Quadrant::Q4, 0.2, 1.1), (-0.2, 1.1));
    }

    #[test]
    fn test_unknown_number_falls_back_to_q1() {
        let r = QuadrantSignResolver::new();
        assert_eq!(r.apply_number(9, 1.0, 2.0), (1.0, 2.0));
        assert_eq!(r.apply_number(-1, 1.0, 2.0), (1.0, 2.0));
    }

    #[test]
    fn test_repeated_application_is_not_idempotent() {
        let r = QuadrantSignResolver::new();
        let once = r.apply(Quadrant::Q2, 1.0, 1.0);
        let twice = r.apply(Quadrant::Q2, once.0, once.1);
        assert_ne!(once, twice);
        assert_eq!(twice, (1.0, 1.0));

        let q3 = r.apply(Quadrant::Q3, 2.0, 3.0);
        assert_eq!(r.apply(Quadrant::Q3, q3.0, q3.1), (2.0, 3.0));
    }

    #[test]
    fn test_every_quadrant_number_in_range() {
        let r = QuadrantSignResolver::new();
        for name in ["", "Q", "Q0", "_Q4", "abcQ1", "q3", "none"] {
            let q = r.quadrant_of(Some(name)).number();
            assert!((1..=4).contains(&q));
        }
    }
}
