//! `PositioningSample`: the per-user, per-time quality report, and the
//! default `Apos` composite score fixed by the design notes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositioningSample {
    pub user_id: String,
    pub t: f64,
    pub visible_satellites: Vec<u32>,
    pub coop_satellites: Vec<u32>,
    pub sinr_mean: f64,
    pub sinr_min: f64,
    pub crlb: f64,
    pub gdop: f64,
    pub crlb_norm: f64,
    pub gdop_norm: f64,
    pub apos: f64,
}

impl PositioningSample {
    pub fn visible_beams(&self) -> usize {
        self.visible_satellites.len()
    }

    pub fn coop_sats(&self) -> usize {
        self.coop_satellites.len()
    }
}

/// `Apos = clamp(0.4·min(visible_beams/b_target,1) + 0.4·min(coop_sats/s_target,1)
///              + 0.2·1[crlb ≤ τ], 0, 1)` — the default fixed by design note §9,
/// overridable in config only by swapping weights, never the shape.
pub fn apos_score(
    visible_beams: usize,
    coop_sats: usize,
    crlb: f64,
    crlb_threshold: f64,
    visible_beams_target: f64,
    coop_sats_target: f64,
    min_visible_beams: u32,
) -> f64 {
    if visible_beams < min_visible_beams as usize {
        return 0.0;
    }
    let beams_term = 0.4 * (visible_beams as f64 / visible_beams_target).min(1.0);
    let coop_term = 0.4 * (coop_sats as f64 / coop_sats_target).min(1.0);
    let crlb_term = if crlb <= crlb_threshold { 0.2 } else { 0.0 };
    (beams_term + coop_term + crlb_term).clamp(0.0, 1.0)
}

/// `crlb_norm = clamp((crlb_max - crlb) / (crlb_max - crlb_min), 0, 1)`, and
/// `gdop_norm` analogous — higher is better after normalization, matching
/// the Observation Builder's convention (§4.5) that all features face the
/// same direction.
pub fn normalize_lower_is_better(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    if max <= min {
        return 0.0;
    }
    ((max - value) / (max - min)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apos_is_zero_below_min_visible_beams() {
        let a = apos_score(1, 5, 1.0, 50.0, 4.0, 3.0, 2);
        assert_eq!(a, 0.0);
    }

    #[test]
    fn apos_caps_at_one() {
        let a = apos_score(10, 10, 1.0, 50.0, 4.0, 3.0, 2);
        assert_eq!(a, 1.0);
    }

    #[test]
    fn apos_is_in_unit_interval() {
        for vb in 0..10 {
            for cs in 0..10 {
                let a = apos_score(vb, cs, 30.0, 50.0, 4.0, 3.0, 2);
                assert!((0.0..=1.0).contains(&a));
            }
        }
    }

    #[test]
    fn infinite_crlb_normalizes_to_zero() {
        assert_eq!(normalize_lower_is_better(f64::INFINITY, 0.0, 100.0), 0.0);
    }

    #[test]
    fn normalize_clamped_to_unit_interval() {
        assert_eq!(normalize_lower_is_better(-10.0, 0.0, 100.0), 1.0);
        assert_eq!(normalize_lower_is_better(150.0, 0.0, 100.0), 0.0);
    }
}
