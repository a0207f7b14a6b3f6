//! `DsroqEngine`: a pipeline-of-overlays orchestrator over the MCTS router,
//! path cost, bandwidth allocator and Lyapunov scheduler — core decision
//! path (route search) wrapped by advisory overlays (positioning penalty,
//! reroute cooldown, feasibility filter) consulted in a fixed order before
//! a final allocation decision.

use crate::allocator::{allocate_bandwidth, AllocationOutcome};
use crate::cost::{path_cost, path_latency_lower_bound, positioning_penalty, PathCostWeights};
use crate::lyapunov::{LyapunovConfig, LyapunovScheduler};
use crate::mcts::{MctsConfig, MctsRouter, SearchBudget};
use leo_common::error::{SimError, SimResult};
use leo_flow::{Flow, FlowRequest};
use leo_topology::NetworkSnapshot;
use rand::rngs::StdRng;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub route: Vec<leo_topology::NodeId>,
    pub allocation: AllocationOutcome,
    pub path_cost: f64,
}

pub struct DsroqConfig {
    pub cost_weights: PathCostWeights,
    pub mcts: MctsConfig,
    pub search_budget: SearchBudget,
    pub reroute_cooldown_s: f64,
    pub lyapunov: LyapunovConfig,
}

pub struct DsroqEngine {
    cfg: DsroqConfig,
    lyapunov: LyapunovScheduler,
}

/// Per-request positioning-quality inputs, already normalized by the
/// Positioning Engine for the requesting user.
#[derive(Debug, Clone, Copy)]
pub struct PositioningContext {
    pub crlb_norm: f64,
    pub gdop_norm: f64,
    pub visible_beams: usize,
    pub min_visible_beams: u32,
    /// Raw CRLB (not normalized), compared against `crlb_threshold` as a
    /// hard feasibility gate rather than folded into the soft penalty.
    pub crlb: f64,
    pub crlb_threshold: f64,
    pub coop_sats: usize,
    pub min_coop_sats: u32,
}

impl DsroqEngine {
    pub fn new(cfg: DsroqConfig) -> Self {
        let lyapunov = LyapunovScheduler::new(cfg.lyapunov);
        DsroqEngine { cfg, lyapunov }
    }

    pub fn lyapunov(&self) -> &LyapunovScheduler {
        &self.lyapunov
    }

    pub fn lyapunov_mut(&mut self) -> &mut LyapunovScheduler {
        &mut self.lyapunov
    }

    /// A previously-routed flow may only be rerouted once the cooldown
    /// since its last reroute has elapsed; returns the unchanged route
    /// while on cooldown, even if a cheaper alternative exists.
    pub fn reroute_allowed(&self, flow: &Flow, now_s: f64) -> bool {
        now_s - flow.last_reroute_t >= self.cfg.reroute_cooldown_s
    }

    /// Runs MCTS route search, scores candidates against the path cost
    /// formula (link terms + seam penalty + path-change penalty +
    /// positioning penalty), then allocates bandwidth along the winner.
    /// `contending_flows` is the count of other active flows of the same
    /// QoS class, used by the allocator's fair-share term.
    #[allow(clippy::too_many_arguments)]
    pub fn route_flow(
        &self,
        request: &FlowRequest,
        snapshot: &NetworkSnapshot,
        link_capacity_bps: &HashMap<(leo_topology::NodeId, leo_topology::NodeId), f64>,
        link_loads_bps: &HashMap<(leo_topology::NodeId, leo_topology::NodeId), f64>,
        previous_path: Option<&[leo_topology::NodeId]>,
        positioning: PositioningContext,
        contending_flows: u32,
        rng: &mut StdRng,
    ) -> SimResult<RouteDecision> {
        if positioning.visible_beams < positioning.min_visible_beams as usize {
            return Err(SimError::feasibility("below min_visible_beams"));
        }
        if positioning.coop_sats < positioning.min_coop_sats as usize {
            return Err(SimError::feasibility("below min_coop_sats"));
        }
        if positioning.crlb > positioning.crlb_threshold {
            return Err(SimError::feasibility("crlb above crlb_threshold"));
        }

        let phi = positioning_penalty(
            positioning.crlb_norm,
            positioning.gdop_norm,
            positioning.visible_beams,
            positioning.min_visible_beams,
        );
        let weights = self.cfg.cost_weights;

        let router = MctsRouter::new(snapshot, link_loads_bps, self.cfg.mcts);
        let cost_fn = |path: &[leo_topology::NodeId]| -> Option<f64> {
            path_cost(path, snapshot, link_loads_bps, previous_path, phi, &weights)
        };

        let route = router
            .search(request.src, request.dst, self.cfg.search_budget, rng, &cost_fn)
            .ok_or_else(|| SimError::feasibility("no route within budget"))?;

        let cost = cost_fn(&route).ok_or_else(|| SimError::feasibility("winning route missing an edge"))?;

        let latency_lower_bound = path_latency_lower_bound(&route, snapshot)
            .ok_or_else(|| SimError::feasibility("winning route missing an edge"))?;
        if latency_lower_bound > request.max_latency_s {
            return Err(SimError::feasibility("latency lower bound exceeds max_latency_s"));
        }

        let allocation = allocate_bandwidth(
            request.bw_min_bps,
            request.bw_max_bps,
            &route,
            link_capacity_bps,
            link_loads_bps,
            contending_flows,
        )
        .ok_or_else(|| SimError::feasibility("allocation below bw_min"))?;

        Ok(RouteDecision { route, allocation, path_cost: cost })
    }
}
