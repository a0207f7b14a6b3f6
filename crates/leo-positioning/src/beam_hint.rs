//! Beam Hint recommender: for each user, a greedily-selected, score-ordered
//! list of (satellite, beam) candidates, advisory only — DSROQ and
//! Admission consume `beam_hint_score` as a soft factor, never a hard
//! constraint.

use crate::fim::marginal_det_gain;
use crate::geometry::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub fim_gain: f64,
    pub snr: f64,
    pub geometry_diversity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamHintEntry {
    pub sat_id: u32,
    pub beam_id: u32,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

struct Candidate {
    sat_id: u32,
    los: Vec3,
    snr_linear: f64,
    snr_norm: f64,
    elevation_deg: f64,
}

/// Angular-spread diversity of `candidate` against the already-chosen set:
/// the minimum angle to any chosen line-of-sight vector, normalized by 90
/// degrees so near-duplicate geometry scores close to zero.
fn geometry_diversity(chosen: &[Vec3], candidate: &Vec3) -> f64 {
    if chosen.is_empty() {
        return 1.0;
    }
    let min_cos = chosen
        .iter()
        .map(|v| v.dot(candidate).clamp(-1.0, 1.0))
        .fold(f64::MIN, f64::max);
    let angle_deg = min_cos.acos().to_degrees();
    (angle_deg / 90.0).clamp(0.0, 1.0)
}

/// Greedy top-k Beam Hint selection for one user at one time step.
///
/// Ties are broken by lower handover risk, then by stable satellite id.
/// This module has no access to a satellite's future ground track, so it
/// uses elevation angle as the handover-risk proxy: a candidate near the
/// horizon will set (drop below the elevation mask) soonest as the
/// constellation moves, so higher elevation is lower near-term handover
/// risk. Satellite id is the final, fully deterministic tie-break.
#[allow(clippy::too_many_arguments)]
pub fn select_beam_hints(
    sat_ids: &[u32],
    los_vectors: &[Vec3],
    elevations_deg: &[f64],
    snr_linear: &[f64],
    elevation_mask_deg: f64,
    snr_floor_linear: f64,
    budget: usize,
    w_fim: f64,
    w_snr: f64,
    w_geom: f64,
) -> Vec<BeamHintEntry> {
    let snr_max = snr_linear.iter().cloned().fold(f64::MIN, f64::max).max(1e-9);

    let mut candidates: Vec<Candidate> = sat_ids
        .iter()
        .zip(los_vectors.iter())
        .zip(elevations_deg.iter())
        .zip(snr_linear.iter())
        .filter_map(|(((&sat_id, &los), &elevation_deg), &snr_linear)| {
            if elevation_deg < elevation_mask_deg || snr_linear < snr_floor_linear {
                return None;
            }
            Some(Candidate {
                sat_id,
                los,
                snr_linear,
                snr_norm: (snr_linear / snr_max).clamp(0.0, 1.0),
                elevation_deg,
            })
        })
        .collect();

    candidates.sort_by(|a, b| a.sat_id.cmp(&b.sat_id));

    let mut chosen: Vec<BeamHintEntry> = Vec::new();
    let mut chosen_pairs: Vec<(Vec3, f64)> = Vec::new();
    let mut chosen_los: Vec<Vec3> = Vec::new();
    let mut remaining: Vec<&Candidate> = candidates.iter().collect();

    while chosen.len() < budget && !remaining.is_empty() {
        let mut best_idx = 0usize;
        let mut best_score = f64::MIN;
        let mut best_breakdown = ScoreBreakdown { fim_gain: 0.0, snr: 0.0, geometry_diversity: 0.0 };
        let mut best_elevation = f64::MIN;

        for (idx, cand) in remaining.iter().enumerate() {
            let fim_gain = marginal_det_gain(&chosen_pairs, (cand.los, cand.snr_linear));
            let geom = geometry_diversity(&chosen_los, &cand.los);
            let score = w_fim * fim_gain + w_snr * cand.snr_norm + w_geom * geom;

            let better = score > best_score
                || (score == best_score && cand.elevation_deg > best_elevation)
                || (score == best_score && cand.elevation_deg == best_elevation && cand.sat_id < remaining[best_idx].sat_id);

            if better {
                best_idx = idx;
                best_score = score;
                best_breakdown = ScoreBreakdown { fim_gain, snr: cand.snr_norm, geometry_diversity: geom };
                best_elevation = cand.elevation_deg;
            }
        }

        let winner = remaining.remove(best_idx);
        chosen_pairs.push((winner.los, winner.snr_linear));
        chosen_los.push(winner.los);
        chosen.push(BeamHintEntry {
            sat_id: winner.sat_id,
            beam_id: 0,
            score: best_score,
            breakdown: best_breakdown,
        });
    }

    chosen
}
