//! Bandwidth allocator: bounds a flow's allocation between its declared
//! minimum and maximum by the path's bottleneck residual capacity and a
//! fair share of that residual among contending flows of the same class.

use leo_topology::NodeId;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct AllocationOutcome {
    pub allocated_bw_bps: f64,
    pub bottleneck_residual_bps: f64,
    pub fair_share_bps: f64,
}

/// Smallest residual capacity among the edges on `path`, after subtracting
/// `link_loads` from each edge's capacity.
pub fn bottleneck_residual_bps(
    path: &[NodeId],
    link_capacity_bps: &HashMap<(NodeId, NodeId), f64>,
    link_loads_bps: &HashMap<(NodeId, NodeId), f64>,
) -> f64 {
    path.windows(2)
        .map(|w| {
            let key = if w[0] <= w[1] { (w[0], w[1]) } else { (w[1], w[0]) };
            let capacity = *link_capacity_bps.get(&key).unwrap_or(&0.0);
            let load = *link_loads_bps.get(&key).unwrap_or(&0.0);
            (capacity - load).max(0.0)
        })
        .fold(f64::INFINITY, f64::min)
}

/// `allocate = min(b_max, bottleneck_residual, max(b_min, fair_share))`.
/// Returns `None` if the result would fall below `b_min` — the flow cannot
/// be admitted at its declared floor.
pub fn allocate_bandwidth(
    bw_min_bps: f64,
    bw_max_bps: f64,
    path: &[NodeId],
    link_capacity_bps: &HashMap<(NodeId, NodeId), f64>,
    link_loads_bps: &HashMap<(NodeId, NodeId), f64>,
    contending_flows: u32,
) -> Option<AllocationOutcome> {
    let bottleneck = bottleneck_residual_bps(path, link_capacity_bps, link_loads_bps);
    if !bottleneck.is_finite() {
        return None;
    }
    let fair_share = bottleneck / contending_flows.max(1) as f64;
    let floor = bw_min_bps.max(fair_share);
    let allocated = bw_max_bps.min(bottleneck).min(floor);

    if allocated + 1e-9 < bw_min_bps {
        return None;
    }

    Some(AllocationOutcome {
        allocated_bw_bps: allocated,
        bottleneck_residual_bps: bottleneck,
        fair_share_bps: fair_share,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_and_caps() -> (Vec<NodeId>, HashMap<(NodeId, NodeId), f64>) {
        let path = vec![NodeId::Ground(0), NodeId::Sat(1), NodeId::Sat(2)];
        let mut caps = HashMap::new();
        caps.insert((NodeId::Ground(0), NodeId::Sat(1)), 100.0);
        caps.insert((NodeId::Sat(1), NodeId::Sat(2)), 50.0);
        (path, caps)
    }

    #[test]
    fn bottleneck_is_the_smallest_residual_edge() {
        let (path, caps) = path_and_caps();
        let loads = HashMap::new();
        let residual = bottleneck_residual_bps(&path, &caps, &loads);
        assert_eq!(residual, 50.0);
    }

    #[test]
    fn allocation_is_capped_by_bw_max() {
        let (path, caps) = path_and_caps();
        let loads = HashMap::new();
        let outcome = allocate_bandwidth(1.0, 10.0, &path, &caps, &loads, 1).unwrap();
        assert_eq!(outcome.allocated_bw_bps, 10.0);
    }

    #[test]
    fn allocation_is_capped_by_bottleneck_residual() {
        let (path, caps) = path_and_caps();
        let loads = HashMap::new();
        let outcome = allocate_bandwidth(1.0, 1000.0, &path, &caps, &loads, 1).unwrap();
        assert_eq!(outcome.allocated_bw_bps, 50.0);
    }

    #[test]
    fn allocation_fails_when_below_minimum() {
        let (path, mut caps) = path_and_caps();
        caps.insert((NodeId::Sat(1), NodeId::Sat(2)), 1.0);
        let loads = HashMap::new();
        let outcome = allocate_bandwidth(10.0, 100.0, &path, &caps, &loads, 1);
        assert!(outcome.is_none());
    }

    #[test]
    fn fair_share_divides_residual_among_contending_flows() {
        let (path, caps) = path_and_caps();
        let loads = HashMap::new();
        let outcome = allocate_bandwidth(1.0, 1000.0, &path, &caps, &loads, 5).unwrap();
        assert_eq!(outcome.fair_share_bps, 10.0);
    }

    #[test]
    fn missing_link_gives_zero_residual_and_no_allocation() {
        let path = vec![NodeId::Ground(0), NodeId::Sat(9)];
        let caps = HashMap::new();
        let loads = HashMap::new();
        let outcome = allocate_bandwidth(1.0, 10.0, &path, &caps, &loads, 1);
        assert!(outcome.is_none());
    }
}
