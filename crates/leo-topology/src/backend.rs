//! The interchangeable back-end interface: a `faithful` mode (real TLE/ISL/GSL
//! data, out of scope for this workspace — consumed only through this trait)
//! and the `simplified` mode shipped here. Both expose identical operations.

use crate::types::{NetworkSnapshot, NodeId, RoutingStabilityMetrics};
use leo_common::error::SimResult;
use std::collections::HashMap;

pub trait TopologyBackend: Send + Sync {
    fn snapshot_at(&self, t: f64) -> SimResult<NetworkSnapshot>;

    fn link_capacity(&self, t: f64) -> SimResult<HashMap<(NodeId, NodeId), f64>>;

    fn orbit_phase(&self, t: f64) -> f64;

    /// Fraction of links added-or-removed vs. `t - delta_s`, default delta 1s.
    fn topology_change_rate(&self, t: f64, delta_s: f64) -> SimResult<f64>;

    /// Smoothed forecast of total available capacity at horizon `h` seconds.
    fn predict_future_capacity(&self, t: f64, horizon_s: f64) -> SimResult<f64>;

    fn routing_stability_metrics(&self, t: f64) -> SimResult<RoutingStabilityMetrics>;
}
