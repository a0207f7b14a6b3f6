//! `Engine`: the nine-step discrete-event main loop over the topology,
//! positioning, flow, DSROQ and admission layers. Single-threaded and
//! cooperative — each step is atomic with respect to state mutations;
//! CPU-heavy per-step fan-out (CRLB over many users, MCTS rollouts) is
//! delegated to `rayon` inside the lower layers and joined before the step
//! returns.

use leo_admission::{
    degrade_request, partial_request, AdmissionAction, AdmissionDecision, AdmissionPolicy,
    AdmissionStats, PolicyContext, PosAwarePolicy, ThresholdParams, ThresholdPolicy,
};
use leo_common::config::{AdmissionPolicyKind, ScenarioConfig};
use leo_common::error::{SimError, SimResult};
use leo_common::ids::flow_id;
use leo_common::rng::RngStreams;
use leo_dsroq::lyapunov::{qoe_penalty, FlowQoeSample};
use leo_dsroq::{DsroqConfig as EngineDsroqConfig, DsroqEngine, LyapunovConfig, PathCostWeights, PositioningContext};
use leo_dsroq::{MctsConfig, SearchBudget};
use leo_flow::{ArrivalProcess, EndpointSpec, Flow, FlowQueueState, FlowRequest, FlowStatus};
use leo_positioning::{PositioningEngine, PositioningSample, UserPosition};
use leo_topology::{GroundStationSpec, NetworkSnapshot, NodeId, SimplifiedBackend, TopologyOracle};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A cheap, cloneable handle that lets a caller ask a running [`Engine`] to
/// stop at the next step boundary, in the style of the teacher's hand-rolled
/// `ctrlc` shutdown flag (`AtomicBool` rather than an async cancellation
/// future — the loop here is synchronous).
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One step's slice of the run summary's metric time series (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepMetrics {
    pub t: f64,
    pub throughput_bps: f64,
    pub latency_mean_s: f64,
    pub latency_p95_s: f64,
    pub latency_p99_s: f64,
    pub plr: f64,
    pub jitter_s: f64,
    pub jain: f64,
    pub qoe_mean: f64,
    pub accepted: u64,
    pub rejected: u64,
    pub degraded: u64,
    pub delayed: u64,
    pub partial: u64,
    pub apos_mean: f64,
    pub crlb_mean: f64,
    pub crlb_p95: f64,
    pub gdop_mean: f64,
    pub gdop_p95: f64,
    pub handover_rate: f64,
    pub routing_change_rate: f64,
    pub avg_route_lifetime_s: f64,
    pub seam_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// Immutable document returned once a run ends, per §6's "Run summary".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub final_t: f64,
    pub admission_totals: AdmissionStats,
    pub steps: Vec<StepMetrics>,
}

pub type StepHook = Box<dyn FnMut(&StepMetrics) + Send>;
pub type AdmissionHook = Box<dyn FnMut(&FlowRequest, &AdmissionDecision) + Send>;
pub type FlowCompleteHook = Box<dyn FnMut(&Flow) + Send>;
pub type RerouteHook = Box<dyn FnMut(&Flow, f64) + Send>;

struct DelayedRequest {
    request: FlowRequest,
    retry_at_s: f64,
}

fn build_policy(cfg: &ScenarioConfig) -> SimResult<Box<dyn AdmissionPolicy>> {
    let threshold = ThresholdParams {
        util_high_watermark: cfg.admission.util_high_watermark,
        delayed_retry_s: cfg.admission.delayed_retry_s,
    };
    match cfg.admission.policy {
        AdmissionPolicyKind::Threshold => Ok(Box::new(ThresholdPolicy::new(threshold))),
        AdmissionPolicyKind::PosAware => Ok(Box::new(PosAwarePolicy::new(leo_admission::policy::PosAwareParams {
            threshold,
            apos_low_watermark: 0.5,
            crlb_threshold: cfg.positioning.crlb_threshold,
        }))),
        AdmissionPolicyKind::Rl => Err(SimError::config(
            "admission.policy = \"rl\" requires an external decision source; drive this scenario \
             through leo_rl::Env instead of the standalone leo-sim engine",
        )),
    }
}

fn ground_station_specs(cfg: &ScenarioConfig) -> Vec<GroundStationSpec> {
    cfg.ground_stations
        .iter()
        .enumerate()
        .map(|(i, gs)| GroundStationSpec { name_idx: i as u32, lat_deg: gs.lat, lon_deg: gs.lon })
        .collect()
}

fn user_position(node: NodeId, snapshot: &NetworkSnapshot) -> Option<UserPosition> {
    match node {
        NodeId::Ground(id) => snapshot
            .ground_stations
            .iter()
            .find(|gs| gs.id == id)
            .map(|gs| UserPosition { lat_deg: gs.lat_deg, lon_deg: gs.lon_deg }),
        NodeId::Sat(_) => None,
    }
}

fn request_user(request: &FlowRequest, snapshot: &NetworkSnapshot) -> (String, UserPosition) {
    if let Some(pos) = user_position(request.src, snapshot) {
        return (request.src.to_string(), pos);
    }
    if let Some(pos) = user_position(request.dst, snapshot) {
        return (request.dst.to_string(), pos);
    }
    (request.src.to_string(), UserPosition { lat_deg: 0.0, lon_deg: 0.0 })
}

fn path_delay_s(route: &[NodeId], snapshot: &NetworkSnapshot) -> f64 {
    route
        .windows(2)
        .filter_map(|w| snapshot.link_between(w[0], w[1]))
        .map(|l| l.propagation_latency_s)
        .sum()
}

fn route_is_valid(route: &[NodeId], snapshot: &NetworkSnapshot) -> bool {
    route.windows(2).all(|w| snapshot.link_between(w[0], w[1]).map(|l| l.active).unwrap_or(false))
}

fn route_has_seam(route: &[NodeId], snapshot: &NetworkSnapshot) -> bool {
    route.windows(2).any(|w| snapshot.link_between(w[0], w[1]).map(|l| l.seam).unwrap_or(false))
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// The simulation engine: owns the network backend, positioning, DSROQ,
/// flow state and admission policy for one run, and drives the per-step
/// loop documented in §4.7.
pub struct Engine {
    cfg: ScenarioConfig,
    oracle: TopologyOracle,
    positioning: PositioningEngine,
    dsroq: DsroqEngine,
    flow_state: FlowQueueState,
    arrivals: ArrivalProcess,
    policy: Box<dyn AdmissionPolicy>,
    rng: RngStreams,
    stats: AdmissionStats,
    t: f64,
    dt_s: f64,
    horizon_s: f64,
    delayed: VecDeque<DelayedRequest>,
    last_good_snapshot: Option<NetworkSnapshot>,
    on_step: Vec<StepHook>,
    on_admission: Vec<AdmissionHook>,
    on_flow_complete: Vec<FlowCompleteHook>,
    on_reroute: Vec<RerouteHook>,
    submitted: Vec<FlowRequest>,
}

impl Engine {
    pub fn new(cfg: ScenarioConfig) -> SimResult<Self> {
        cfg.validate()?;

        let backend = SimplifiedBackend::new(cfg.constellation.clone(), ground_station_specs(&cfg));
        let oracle = TopologyOracle::new(Box::new(backend));
        let positioning = PositioningEngine::new(cfg.positioning.clone());

        let dsroq_cfg = EngineDsroqConfig {
            cost_weights: PathCostWeights {
                alpha: cfg.dsroq.alpha,
                kappa_seam: cfg.dsroq.kappa_seam,
                kappa_chg: cfg.dsroq.kappa_chg,
                lambda_pos: cfg.dsroq.lambda_pos,
            },
            mcts: MctsConfig {
                exploration_constant: cfg.dsroq.exploration_constant,
                max_hops: 20,
                congestion_threshold: 0.95,
                terminal_reward: 1.0,
                dead_end_penalty: 1.0,
            },
            search_budget: SearchBudget {
                max_iterations: cfg.dsroq.mcts_iters,
                max_wall_time_ms: if cfg.dsroq.mcts_wall_ms == 0 { None } else { Some(cfg.dsroq.mcts_wall_ms) },
                no_improvement_cap: cfg.dsroq.no_improvement_cap,
            },
            reroute_cooldown_s: cfg.dsroq.reroute_cooldown_ms as f64 / 1000.0,
            lyapunov: LyapunovConfig { v: cfg.dsroq.lyapunov_v, queue_backlog_limit: cfg.dsroq.queue_backlog_limit },
        };
        let dsroq = DsroqEngine::new(dsroq_cfg);

        let endpoints: Vec<EndpointSpec> = (0..cfg.ground_stations.len() as u32)
            .map(|i| EndpointSpec { node: NodeId::Ground(i) })
            .collect();
        let arrivals = ArrivalProcess::new(cfg.traffic.clone(), endpoints);

        let policy = build_policy(&cfg)?;
        let horizon_s = cfg.simulation.end_time_s;
        let dt_s = cfg.simulation.step_ms as f64 / 1000.0;

        Ok(Engine {
            cfg,
            oracle,
            positioning,
            dsroq,
            flow_state: FlowQueueState::new(),
            arrivals,
            policy,
            rng: RngStreams::from_master_seed(0),
            stats: AdmissionStats::default(),
            t: 0.0,
            dt_s,
            horizon_s,
            delayed: VecDeque::new(),
            last_good_snapshot: None,
            on_step: Vec::new(),
            on_admission: Vec::new(),
            on_flow_complete: Vec::new(),
            on_reroute: Vec::new(),
            submitted: Vec::new(),
        })
    }

    pub fn seed(&mut self, seed: u64) {
        self.rng = RngStreams::from_master_seed(seed);
    }

    /// Queues an explicit request for admission at its `arrival_t`, merged
    /// into the next step whose clock reaches that time. For scripted
    /// scenarios and tests that need a specific flow rather than one drawn
    /// from the configured arrival process.
    pub fn submit(&mut self, request: FlowRequest) {
        self.submitted.push(request);
    }

    pub fn stats(&self) -> AdmissionStats {
        self.stats
    }

    pub fn on_step(&mut self, hook: impl FnMut(&StepMetrics) + Send + 'static) {
        self.on_step.push(Box::new(hook));
    }

    pub fn on_admission(&mut self, hook: impl FnMut(&FlowRequest, &AdmissionDecision) + Send + 'static) {
        self.on_admission.push(Box::new(hook));
    }

    pub fn on_flow_complete(&mut self, hook: impl FnMut(&Flow) + Send + 'static) {
        self.on_flow_complete.push(Box::new(hook));
    }

    /// Fires whenever a flow is successfully rerouted in step 7, with the
    /// post-reroute `Flow` and the time of the reroute.
    pub fn on_reroute(&mut self, hook: impl FnMut(&Flow, f64) + Send + 'static) {
        self.on_reroute.push(Box::new(hook));
    }

    /// Runs to the configured horizon or until `cancel` is observed at a
    /// step boundary, whichever comes first. A step-level failure (backend
    /// unavailable, state inconsistency) aborts the run; per-request
    /// failures are contained inside `step`.
    pub fn run(&mut self, cancel: &CancellationToken) -> SimResult<RunSummary> {
        let mut steps = Vec::new();
        while self.t < self.horizon_s {
            if cancel.is_cancelled() {
                info!(t = self.t, "cancellation observed at step boundary");
                return Ok(RunSummary {
                    outcome: RunOutcome::Cancelled,
                    final_t: self.t,
                    admission_totals: self.stats,
                    steps,
                });
            }
            let metrics = self.step()?;
            steps.push(metrics);
        }
        Ok(RunSummary {
            outcome: RunOutcome::Completed,
            final_t: self.t,
            admission_totals: self.stats,
            steps,
        })
    }

    /// Runs exactly one step of the nine-step loop documented in §4.7 and
    /// returns its metrics. A step-level [`SimError`] (`Backend`,
    /// `StateInconsistency`) propagates to the caller and must abort the
    /// run; anything else is contained.
    pub fn step(&mut self) -> SimResult<StepMetrics> {
        // 1. Advance clock.
        self.t += self.dt_s;
        let t = self.t;

        // 2. Pull network state.
        let mut snapshot = self.oracle.snapshot_at(t)?;
        snapshot.stamp_loads(self.flow_state.link_loads());
        self.oracle.stamp_loads(t, self.flow_state.link_loads());

        let users: Vec<(String, UserPosition)> = snapshot
            .ground_stations
            .iter()
            .map(|gs| (NodeId::Ground(gs.id).to_string(), UserPosition { lat_deg: gs.lat_deg, lon_deg: gs.lon_deg }))
            .collect();
        let samples = self.positioning.sample_many(&users, &snapshot);
        let sample_by_user: HashMap<String, &PositioningSample> =
            samples.iter().map(|s| (s.user_id.clone(), s)).collect();

        // 3. Drain arrivals for [t - dt, t], plus any explicitly submitted requests.
        let mut pending: Vec<FlowRequest> = self.arrivals.draw(t, self.dt_s, &mut self.rng.arrivals);
        let (due, not_due): (Vec<_>, Vec<_>) = self.submitted.drain(..).partition(|r| r.arrival_t <= t);
        self.submitted = not_due;
        pending.extend(due);

        // 5 (interleaved here for a single ordered admission pass). Retry
        // delayed requests whose retry time has arrived.
        let mut still_delayed = VecDeque::new();
        while let Some(d) = self.delayed.pop_front() {
            if d.retry_at_s <= t {
                pending.push(d.request);
            } else {
                still_delayed.push_back(d);
            }
        }
        self.delayed = still_delayed;

        // Ordering guarantee: arrival timestamp order, ties by request id.
        pending.sort_by(|a, b| {
            a.arrival_t.partial_cmp(&b.arrival_t).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.id.0.cmp(&b.id.0))
        });

        let link_capacity: HashMap<_, _> = snapshot.links.iter().map(|l| (l.key(), l.capacity_bps)).collect();
        let util_mean = {
            let active: Vec<f64> = snapshot.links.iter().filter(|l| l.active).map(|l| l.utilization()).collect();
            if active.is_empty() { 0.0 } else { active.iter().sum::<f64>() / active.len() as f64 }
        };

        let mut new_flows: Vec<Flow> = Vec::new();
        let mut admitted_delays: u32 = 0;

        // 4. Admission then, on non-reject, DSROQ.
        for request in pending {
            let (user_id, _pos) = request_user(&request, &snapshot);
            let sample = sample_by_user.get(&user_id).copied();
            let (apos, crlb) = sample.map(|s| (s.apos, s.crlb)).unwrap_or((0.0, f64::INFINITY));

            let ctx = PolicyContext {
                class: request.qos_class,
                link_utilization_mean: util_mean,
                apos,
                crlb,
                now_s: t,
                delayed_retry_s: self.cfg.admission.delayed_retry_s,
                observation: None,
            };
            let decision = self.policy.choose_action(&ctx);
            self.stats.record(decision.action);
            for hook in &mut self.on_admission {
                hook(&request, &decision);
            }

            match decision.action {
                AdmissionAction::Reject => {
                    debug!(request_id = %request.id, reason = %decision.reason, "rejected");
                }
                AdmissionAction::DelayedAccept => {
                    admitted_delays += 1;
                    let retry_at_s = decision.retry_at_s.unwrap_or(t + self.cfg.admission.delayed_retry_s);
                    self.delayed.push_back(DelayedRequest { request, retry_at_s });
                }
                AdmissionAction::Accept | AdmissionAction::DegradedAccept | AdmissionAction::PartialAccept => {
                    let routed_request = match decision.action {
                        AdmissionAction::DegradedAccept => degrade_request(&request),
                        AdmissionAction::PartialAccept => partial_request(&request),
                        _ => request.clone(),
                    };
                    let positioning_ctx = sample
                        .map(|s| PositioningContext {
                            crlb_norm: s.crlb_norm,
                            gdop_norm: s.gdop_norm,
                            visible_beams: s.visible_beams(),
                            min_visible_beams: self.cfg.positioning.min_visible_beams,
                            crlb: s.crlb,
                            crlb_threshold: self.cfg.positioning.crlb_threshold,
                            coop_sats: s.coop_sats(),
                            min_coop_sats: self.cfg.positioning.min_coop_sats,
                        })
                        .unwrap_or(PositioningContext {
                            crlb_norm: 0.0,
                            gdop_norm: 0.0,
                            visible_beams: 0,
                            min_visible_beams: 0,
                            crlb: f64::INFINITY,
                            crlb_threshold: self.cfg.positioning.crlb_threshold,
                            coop_sats: 0,
                            min_coop_sats: 0,
                        });
                    let contending = self.flow_state.active_count(routed_request.qos_class) as u32;

                    match self.dsroq.route_flow(
                        &routed_request,
                        &snapshot,
                        &link_capacity,
                        self.flow_state.link_loads(),
                        None,
                        positioning_ctx,
                        contending,
                        &mut self.rng.mcts,
                    ) {
                        Ok(route_decision) => {
                            let flow = Flow {
                                id: flow_id(),
                                request: request.clone(),
                                route: route_decision.route,
                                allocated_bw_bps: route_decision.allocation.allocated_bw_bps,
                                qos_class: routed_request.qos_class,
                                status: FlowStatus::Active,
                                start_t: t,
                                end_t: t + request.expected_duration_s,
                                last_reroute_t: t,
                            };
                            new_flows.push(flow);
                        }
                        Err(SimError::Feasibility(reason)) => {
                            warn!(request_id = %request.id, %reason, "admitted request could not be routed");
                        }
                        Err(other) => return Err(other),
                    }
                }
            }
        }

        for flow in new_flows {
            if let Err(e) = self.flow_state.add_flow(flow, &link_capacity) {
                match e {
                    SimError::Feasibility(reason) => warn!(%reason, "allocation rejected at commit time"),
                    other => return Err(other),
                }
            }
        }

        // 6. Expire flows whose end time has passed.
        let expired: Vec<leo_common::ids::FlowId> =
            self.flow_state.flows().filter(|f| f.end_t <= t).map(|f| f.id.clone()).collect();
        let mut lifetimes = Vec::new();
        for id in expired {
            if let Some(mut flow) = self.flow_state.remove_flow(&id) {
                flow.status = FlowStatus::Completed;
                lifetimes.push(flow.end_t - flow.start_t);
                for hook in &mut self.on_flow_complete {
                    hook(&flow);
                }
            }
        }

        // 7. Reroute flows invalidated by topology change, respecting cooldown.
        let invalid: Vec<leo_common::ids::FlowId> = self
            .flow_state
            .flows()
            .filter(|f| !route_is_valid(&f.route, &snapshot))
            .map(|f| f.id.clone())
            .collect();
        let mut reroutes_this_step = 0u32;
        for id in invalid {
            let Some(flow) = self.flow_state.get_flow(&id).cloned() else { continue };
            if !self.dsroq.reroute_allowed(&flow, t) {
                continue;
            }
            let contending = self.flow_state.active_count(flow.qos_class) as u32;
            // No fresh per-user positioning sample is taken for an in-flight
            // reroute; stand in with permissive values so the hard
            // feasibility filters never block a reroute on stale positioning
            // data the flow was already admitted under.
            let positioning_ctx = PositioningContext {
                crlb_norm: 1.0,
                gdop_norm: 1.0,
                visible_beams: 10,
                min_visible_beams: 0,
                crlb: 0.0,
                crlb_threshold: f64::INFINITY,
                coop_sats: 10,
                min_coop_sats: 0,
            };
            match self.dsroq.route_flow(
                &flow.request,
                &snapshot,
                &link_capacity,
                self.flow_state.link_loads(),
                Some(flow.route.as_slice()),
                positioning_ctx,
                contending,
                &mut self.rng.mcts,
            ) {
                Ok(decision) => {
                    self.flow_state.remove_flow(&id);
                    let mut rerouted = flow;
                    rerouted.route = decision.route;
                    rerouted.allocated_bw_bps = decision.allocation.allocated_bw_bps;
                    rerouted.last_reroute_t = t;
                    if self.flow_state.add_flow(rerouted.clone(), &link_capacity).is_ok() {
                        reroutes_this_step += 1;
                        for hook in &mut self.on_reroute {
                            hook(&rerouted, t);
                        }
                    }
                }
                Err(SimError::Feasibility(_)) => {
                    self.flow_state.remove_flow(&id);
                    warn!(flow_id = %id, "flow dropped: no valid reroute within cooldown");
                }
                Err(other) => return Err(other),
            }
        }

        // 8. TickQueues and collect metrics.
        let arrivals_by_node: HashMap<NodeId, f64> = {
            let mut m: HashMap<NodeId, f64> = HashMap::new();
            for flow in self.flow_state.flows() {
                *m.entry(flow.request.src).or_insert(0.0) += flow.allocated_bw_bps;
            }
            m
        };
        let services_by_node: HashMap<NodeId, f64> = snapshot
            .links
            .iter()
            .flat_map(|l| [(l.a, l.capacity_bps), (l.b, l.capacity_bps)])
            .fold(HashMap::new(), |mut acc, (n, c)| {
                *acc.entry(n).or_insert(0.0) += c;
                acc
            });
        self.flow_state.tick_queues(self.dt_s, &arrivals_by_node, &services_by_node);

        let active: Vec<&Flow> = self.flow_state.flows().collect();
        let mut delays: Vec<f64> = active.iter().map(|f| path_delay_s(&f.route, &snapshot)).collect();
        delays.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let latency_mean_s = if delays.is_empty() { 0.0 } else { delays.iter().sum::<f64>() / delays.len() as f64 };
        let jitter_s = if delays.len() < 2 {
            0.0
        } else {
            let mean = latency_mean_s;
            (delays.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / delays.len() as f64).sqrt()
        };

        let throughput_bps: f64 = active.iter().map(|f| f.allocated_bw_bps).sum();
        let allocations: Vec<f64> = active.iter().map(|f| f.allocated_bw_bps).collect();
        let jain = FlowQueueState::jain_fairness(&allocations);

        let qoe_values: Vec<f64> = active
            .iter()
            .map(|f| {
                let delay = path_delay_s(&f.route, &snapshot);
                let penalty = qoe_penalty(&FlowQoeSample {
                    class: f.qos_class,
                    path_delay_s: delay,
                    max_latency_s: f.request.max_latency_s,
                    loss_rate: 0.0,
                    throughput_bps: f.allocated_bw_bps,
                    bw_min_bps: f.request.bw_min_bps,
                });
                1.0 / (1.0 + penalty)
            })
            .collect();
        let qoe_mean = if qoe_values.is_empty() { 1.0 } else { qoe_values.iter().sum::<f64>() / qoe_values.len() as f64 };

        let congested_links = snapshot.links.iter().filter(|l| l.active).filter(|l| l.utilization() >= 1.0).count();
        let active_links = snapshot.links.iter().filter(|l| l.active).count().max(1);
        let plr = congested_links as f64 / active_links as f64;

        let seam_flows = active.iter().filter(|f| route_has_seam(&f.route, &snapshot)).count();
        let seam_ratio = if active.is_empty() { 0.0 } else { seam_flows as f64 / active.len() as f64 };

        let avg_route_lifetime_s = if lifetimes.is_empty() { 0.0 } else { lifetimes.iter().sum::<f64>() / lifetimes.len() as f64 };
        let routing_change_rate = self.oracle.topology_change_rate(t).unwrap_or(0.0);
        let handover_rate = self
            .oracle
            .routing_stability_metrics(t)
            .map(|m| m.predicted_handover_count as f64 / self.dt_s.max(1e-9))
            .unwrap_or(0.0);

        let apos_values: Vec<f64> = samples.iter().map(|s| s.apos).collect();
        let mut crlb_values: Vec<f64> = samples.iter().map(|s| s.crlb).filter(|c| c.is_finite()).collect();
        let mut gdop_values: Vec<f64> = samples.iter().map(|s| s.gdop).filter(|c| c.is_finite()).collect();
        crlb_values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        gdop_values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let apos_mean = if apos_values.is_empty() { 0.0 } else { apos_values.iter().sum::<f64>() / apos_values.len() as f64 };
        let crlb_mean = if crlb_values.is_empty() { 0.0 } else { crlb_values.iter().sum::<f64>() / crlb_values.len() as f64 };
        let gdop_mean = if gdop_values.is_empty() { 0.0 } else { gdop_values.iter().sum::<f64>() / gdop_values.len() as f64 };

        let metrics = StepMetrics {
            t,
            throughput_bps,
            latency_mean_s,
            latency_p95_s: percentile(&delays, 0.95),
            latency_p99_s: percentile(&delays, 0.99),
            plr,
            jitter_s,
            jain,
            qoe_mean,
            accepted: self.stats.accepted,
            rejected: self.stats.rejected,
            degraded: self.stats.degraded,
            delayed: self.stats.delayed,
            partial: self.stats.partial,
            apos_mean,
            crlb_mean,
            crlb_p95: percentile(&crlb_values, 0.95),
            gdop_mean,
            gdop_p95: percentile(&gdop_values, 0.95),
            handover_rate,
            routing_change_rate,
            avg_route_lifetime_s,
            seam_ratio,
        };

        self.last_good_snapshot = Some(snapshot);
        let _ = admitted_delays;
        let _ = reroutes_this_step;

        // 9. Fire hooks, `on_step` last.
        for hook in &mut self.on_step {
            hook(&metrics);
        }

        Ok(metrics)
    }
}
