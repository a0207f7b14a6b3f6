//! Path cost function and its components: link latency/load term, seam
//! penalty, path-change penalty (Jaccard similarity to the previous path),
//! and the positioning-quality penalty `Φ`.

use leo_topology::{NetworkSnapshot, NodeId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy)]
pub struct PathCostWeights {
    pub alpha: f64,
    pub kappa_seam: f64,
    pub kappa_chg: f64,
    pub lambda_pos: f64,
}

fn edge_set(path: &[NodeId]) -> HashSet<(NodeId, NodeId)> {
    path.windows(2)
        .map(|w| if w[0] <= w[1] { (w[0], w[1]) } else { (w[1], w[0]) })
        .collect()
}

/// Jaccard similarity of edge sets; 0 when there is no previous path.
pub fn path_similarity(path: &[NodeId], previous_path: Option<&[NodeId]>) -> f64 {
    let previous = match previous_path {
        Some(p) if p.len() >= 2 => p,
        _ => return 0.0,
    };
    let a = edge_set(path);
    let b = edge_set(previous);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// `Φ` grows monotonically as positioning quality worsens; 0 at the ideal.
pub fn positioning_penalty(crlb_norm: f64, gdop_norm: f64, visible_beams: usize, min_visible_beams: u32) -> f64 {
    let crlb_term = 1.0 - crlb_norm;
    let gdop_term = 1.0 - gdop_norm;
    let visibility_term = if (visible_beams as u32) < min_visible_beams { 1.0 } else { 0.0 };
    crlb_term + gdop_term + visibility_term
}

/// Sum of propagation latency along a path — a lower bound on end-to-end
/// latency (it ignores queueing/transmission delay), used as a hard
/// feasibility gate against a request's `max_latency_s`.
pub fn path_latency_lower_bound(path: &[NodeId], snapshot: &NetworkSnapshot) -> Option<f64> {
    if path.len() < 2 {
        return None;
    }
    let mut sum = 0.0;
    for w in path.windows(2) {
        let link = snapshot.link_between(w[0], w[1])?;
        sum += link.propagation_latency_s;
    }
    Some(sum)
}

/// `C(path) = Σ_e [latency_e + α·(load_e/cap_e)] + κ_seam·#seam_edges
///           + κ_chg·(1 − similarity) + λ_pos·Φ`
pub fn path_cost(
    path: &[NodeId],
    snapshot: &NetworkSnapshot,
    link_loads: &HashMap<(NodeId, NodeId), f64>,
    previous_path: Option<&[NodeId]>,
    phi: f64,
    weights: &PathCostWeights,
) -> Option<f64> {
    if path.len() < 2 {
        return None;
    }
    let mut sum = 0.0;
    let mut seam_edges = 0u32;

    for w in path.windows(2) {
        let link = snapshot.link_between(w[0], w[1])?;
        let key = link.key();
        let load = *link_loads.get(&key).unwrap_or(&link.current_load_bps);
        let util = if link.capacity_bps > 0.0 { load / link.capacity_bps } else { 1.0 };
        sum += link.propagation_latency_s + weights.alpha * util;
        if link.seam {
            seam_edges += 1;
        }
    }

    let similarity = path_similarity(path, previous_path);
    sum += weights.kappa_seam * seam_edges as f64;
    sum += weights.kappa_chg * (1.0 - similarity);
    sum += weights.lambda_pos * phi;

    Some(sum)
}
