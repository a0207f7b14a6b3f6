//! RL Environment Adapter: wraps the Topology Oracle, Positioning Engine,
//! Flow & Queue State, DSROQ engine, and admission reward formula as a
//! stateful `reset`/`step` interface, one arriving request per step.
//!
//! A single `step` is deterministic given (prior state, action, seed): MCTS
//! always runs with a fixed iteration cap and no wall-time cap here, so the
//! only randomness is the seeded RNG streams, never the wall clock.

use leo_admission::{compute_reward, degrade_request, partial_request, AdmissionAction, AdmissionDecision, RewardInputs, RewardWeights};
use leo_common::config::ScenarioConfig;
use leo_common::error::SimResult;
use leo_common::ids::{flow_id, request_id, RequestId};
use leo_common::rng::RngStreams;
use leo_dsroq::lyapunov::qoe_penalty;
use leo_dsroq::{DsroqConfig, DsroqEngine, FlowQoeSample, LyapunovConfig, MctsConfig, PathCostWeights, PositioningContext, RouteDecision, SearchBudget};
use leo_flow::{ArrivalProcess, EndpointSpec, Flow, FlowQueueState, FlowRequest, FlowStatus, QosClass};
use leo_positioning::{PositioningEngine, UserPosition};
use leo_topology::{GroundStationSpec, NetworkSnapshot, NodeId, SimplifiedBackend, TopologyOracle};
use std::collections::VecDeque;
use tracing::debug;

/// A discrete admission decision plus its positional index, for policies
/// that pick an action by index rather than by name.
pub const ACTION_SPACE: [AdmissionAction; 5] = [
    AdmissionAction::Accept,
    AdmissionAction::Reject,
    AdmissionAction::DegradedAccept,
    AdmissionAction::DelayedAccept,
    AdmissionAction::PartialAccept,
];

#[derive(Debug, Clone, Copy)]
pub struct ActionSpec {
    pub n: usize,
}

impl ActionSpec {
    pub fn new() -> Self {
        ActionSpec { n: ACTION_SPACE.len() }
    }
}

impl Default for ActionSpec {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ObservationSpec {
    pub len: usize,
    pub low: f64,
    pub high: f64,
}

impl ObservationSpec {
    pub fn new() -> Self {
        ObservationSpec { len: leo_admission::OBSERVATION_LEN, low: -1.0, high: 1.0 }
    }
}

impl Default for ObservationSpec {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-step diagnostic detail, returned alongside the observation/reward so
/// callers can log or debug a step without re-deriving it.
#[derive(Debug, Clone)]
pub struct StepInfo {
    pub decision: AdmissionDecision,
    pub route: Option<RouteDecision>,
    pub request_id: RequestId,
}

#[derive(Debug, Clone, Copy, Default)]
struct QoeWindow {
    mean: f64,
    violation_rate: f64,
}

fn class_idx(class: QosClass) -> usize {
    match class {
        QosClass::Ef => 0,
        QosClass::Af => 1,
        QosClass::Be => 2,
    }
}

/// `leo_common::config::RewardWeights` is the scenario-file shape; the
/// reward formula itself lives in `leo_admission` under differently-named
/// fields. Converted once per env construction rather than duplicating the
/// six weights in two places.
fn convert_reward_weights(w: &leo_common::config::RewardWeights) -> RewardWeights {
    RewardWeights {
        w1_delta_qoe: w.w_qoe,
        w2_jain: w.w_fairness,
        w3_util: w.w_util,
        w4_apos: w.w_apos,
        w5_viol: w.w_viol,
        w6_delay: w.w_delay,
    }
}

fn ground_station_specs(cfg: &ScenarioConfig) -> Vec<GroundStationSpec> {
    cfg.ground_stations
        .iter()
        .enumerate()
        .map(|(idx, gs)| GroundStationSpec { name_idx: idx as u32, lat_deg: gs.lat, lon_deg: gs.lon })
        .collect()
}

fn user_position(node: NodeId, snapshot: &NetworkSnapshot) -> Option<UserPosition> {
    match node {
        NodeId::Ground(idx) => snapshot
            .ground_stations
            .iter()
            .find(|g| g.id == idx)
            .map(|g| UserPosition { lat_deg: g.lat_deg, lon_deg: g.lon_deg }),
        NodeId::Sat(_) => None,
    }
}

fn request_user_position(request: &FlowRequest, snapshot: &NetworkSnapshot) -> UserPosition {
    user_position(request.src, snapshot)
        .or_else(|| user_position(request.dst, snapshot))
        .unwrap_or(UserPosition { lat_deg: 0.0, lon_deg: 0.0 })
}

fn path_delay_s(route: &[NodeId], snapshot: &NetworkSnapshot) -> f64 {
    route
        .windows(2)
        .filter_map(|w| snapshot.link_between(w[0], w[1]))
        .map(|l| l.propagation_latency_s)
        .sum()
}

fn utilization_stats(snapshot: &NetworkSnapshot) -> leo_admission::observation::NetworkUtilizationStats {
    let utils: Vec<f64> = snapshot.links.iter().filter(|l| l.active).map(|l| l.utilization()).collect();
    if utils.is_empty() {
        return leo_admission::observation::NetworkUtilizationStats { mean: 0.0, max: 0.0, std: 0.0 };
    }
    let mean = utils.iter().sum::<f64>() / utils.len() as f64;
    let max = utils.iter().cloned().fold(f64::MIN, f64::max);
    let variance = utils.iter().map(|u| (u - mean).powi(2)).sum::<f64>() / utils.len() as f64;
    leo_admission::observation::NetworkUtilizationStats { mean, max, std: variance.sqrt() }
}

const STABILITY_WINDOW_S: f64 = 60.0;
const MAX_HOPS: usize = 20;
const CONGESTION_THRESHOLD: f64 = 0.95;
const TERMINAL_REWARD: f64 = 1.0;
const DEAD_END_PENALTY: f64 = 1.0;
const BW_NORM_SCALE_BPS: f64 = 10_000_000.0;
const LATENCY_NORM_SCALE_S: f64 = 2.0;
const DURATION_NORM_SCALE_S: f64 = 120.0;

/// Stateful RL adapter: one arriving `FlowRequest` per `step`, a fixed-budget
/// MCTS route search, a reward scored against the Observation Builder's
/// positioning and network-quality features.
pub struct Env {
    cfg: ScenarioConfig,
    oracle: TopologyOracle,
    positioning: PositioningEngine,
    dsroq: DsroqEngine,
    flow_state: FlowQueueState,
    arrivals: ArrivalProcess,
    rng: RngStreams,
    stats: leo_admission::AdmissionStats,
    reward_weights: RewardWeights,
    t: f64,
    dt_s: f64,
    horizon_s: f64,
    pending: Option<FlowRequest>,
    pending_queue: VecDeque<FlowRequest>,
    last_admission_t: f64,
    qoe_windows: [QoeWindow; 3],
}

impl Env {
    pub fn new(cfg: ScenarioConfig) -> SimResult<Self> {
        cfg.validate()?;
        let backend = SimplifiedBackend::new(cfg.constellation.clone(), ground_station_specs(&cfg));
        let oracle = TopologyOracle::new(Box::new(backend));
        let positioning = PositioningEngine::new(cfg.positioning.clone());

        let dsroq_cfg = DsroqConfig {
            cost_weights: PathCostWeights {
                alpha: cfg.dsroq.alpha,
                kappa_seam: cfg.dsroq.kappa_seam,
                kappa_chg: cfg.dsroq.kappa_chg,
                lambda_pos: cfg.dsroq.lambda_pos,
            },
            mcts: MctsConfig {
                exploration_constant: cfg.dsroq.exploration_constant,
                max_hops: MAX_HOPS,
                congestion_threshold: CONGESTION_THRESHOLD,
                terminal_reward: TERMINAL_REWARD,
                dead_end_penalty: DEAD_END_PENALTY,
            },
            search_budget: SearchBudget {
                max_iterations: cfg.dsroq.mcts_iters,
                max_wall_time_ms: None,
                no_improvement_cap: cfg.dsroq.no_improvement_cap,
            },
            reroute_cooldown_s: cfg.dsroq.reroute_cooldown_ms as f64 / 1000.0,
            lyapunov: LyapunovConfig { v: cfg.dsroq.lyapunov_v, queue_backlog_limit: cfg.dsroq.queue_backlog_limit },
        };
        let dsroq = DsroqEngine::new(dsroq_cfg);

        let endpoints: Vec<EndpointSpec> = (0..cfg.ground_stations.len() as u32)
            .map(|idx| EndpointSpec { node: NodeId::Ground(idx) })
            .collect();
        let arrivals = ArrivalProcess::new(cfg.traffic.clone(), endpoints);
        let reward_weights = convert_reward_weights(&cfg.admission.reward_weights);
        let dt_s = cfg.simulation.step_ms as f64 / 1000.0;
        let horizon_s = cfg.simulation.end_time_s;

        Ok(Env {
            cfg,
            oracle,
            positioning,
            dsroq,
            flow_state: FlowQueueState::new(),
            arrivals,
            rng: RngStreams::from_master_seed(0),
            stats: leo_admission::AdmissionStats::default(),
            reward_weights,
            t: 0.0,
            dt_s,
            horizon_s,
            pending: None,
            pending_queue: VecDeque::new(),
            last_admission_t: 0.0,
            qoe_windows: [QoeWindow::default(); 3],
        })
    }

    pub fn observation_spec(&self) -> ObservationSpec {
        ObservationSpec::new()
    }

    pub fn action_spec(&self) -> ActionSpec {
        ActionSpec::new()
    }

    pub fn stats(&self) -> leo_admission::AdmissionStats {
        self.stats
    }

    /// Re-seeds the RNG streams without touching simulated time or flow
    /// state — for reproducing the remainder of an episode under a new
    /// random draw, as distinct from a full `reset`.
    pub fn seed(&mut self, seed: u64) {
        self.rng = RngStreams::from_master_seed(seed);
    }

    pub fn reset(&mut self, seed: u64) -> Observation {
        self.rng = RngStreams::from_master_seed(seed);
        self.t = 0.0;
        self.flow_state = FlowQueueState::new();
        self.stats = leo_admission::AdmissionStats::default();
        self.last_admission_t = 0.0;
        self.qoe_windows = [QoeWindow::default(); 3];
        self.pending_queue.clear();
        self.pending = self.advance_to_next_arrival();
        self.build_observation()
    }

    fn advance_to_next_arrival(&mut self) -> Option<FlowRequest> {
        while self.pending_queue.is_empty() && self.t < self.horizon_s {
            self.t += self.dt_s;
            let drawn = self.arrivals.draw(self.t, self.dt_s, &mut self.rng.arrivals);
            self.pending_queue.extend(drawn);
        }
        self.pending_queue.pop_front()
    }

    pub fn step(&mut self, action: AdmissionAction) -> (Observation, f64, bool, StepInfo) {
        let request = match self.pending.take() {
            Some(r) => r,
            None => {
                let obs = self.build_observation();
                let info = StepInfo { decision: AdmissionDecision::reject("no pending arrival"), route: None, request_id: request_id() };
                return (obs, 0.0, true, info);
            }
        };

        let (reward, info) = self.process(action, request);
        self.pending = self.advance_to_next_arrival();
        let done = self.t >= self.horizon_s;
        (self.build_observation(), reward, done, info)
    }

    fn process(&mut self, action: AdmissionAction, request: FlowRequest) -> (f64, StepInfo) {
        self.stats.record(action);

        let snapshot = match self.oracle.snapshot_at(self.t) {
            Ok(s) => s,
            Err(_) => {
                let decision = AdmissionDecision::reject("topology backend unavailable at this step");
                return (0.0, StepInfo { decision, route: None, request_id: request.id.clone() });
            }
        };
        self.oracle.stamp_loads(self.t, self.flow_state.link_loads());

        let user_pos = request_user_position(&request, &snapshot);
        let sample = self.positioning.sample_for_user(request.id.as_ref(), &user_pos, &snapshot);
        let hints = self.positioning.beam_hints_for_user(&user_pos, &snapshot, self.cfg.positioning.beams_per_user as usize);

        let (decision, route, effective_request): (AdmissionDecision, Option<RouteDecision>, Option<FlowRequest>) = match action {
            AdmissionAction::Reject => (AdmissionDecision::reject("rejected by policy"), None, None),
            AdmissionAction::DelayedAccept => {
                let retry_at = self.t + self.cfg.admission.delayed_retry_s;
                (AdmissionDecision::delayed(retry_at, "delayed by policy"), None, None)
            }
            AdmissionAction::Accept | AdmissionAction::DegradedAccept | AdmissionAction::PartialAccept => {
                let effective = match action {
                    AdmissionAction::DegradedAccept => degrade_request(&request),
                    AdmissionAction::PartialAccept => partial_request(&request),
                    _ => request.clone(),
                };
                let caps = self.oracle.link_capacity(self.t).unwrap_or_default();
                let loads = self.flow_state.link_loads().clone();
                let positioning_ctx = PositioningContext {
                    crlb_norm: sample.crlb_norm,
                    gdop_norm: sample.gdop_norm,
                    visible_beams: sample.visible_beams(),
                    min_visible_beams: self.cfg.positioning.min_visible_beams,
                };
                let contending = self.flow_state.active_count(effective.qos_class) as u32;
                let routed = self.dsroq.route_flow(
                    &effective,
                    &snapshot,
                    &caps,
                    &loads,
                    None,
                    positioning_ctx,
                    contending,
                    &mut self.rng.mcts,
                );
                match routed {
                    Ok(decision_route) => {
                        let flow = Flow {
                            id: flow_id(),
                            request: effective.clone(),
                            route: decision_route.route.clone(),
                            allocated_bw_bps: decision_route.allocation.allocated_bw_bps,
                            qos_class: effective.qos_class,
                            status: FlowStatus::Active,
                            start_t: self.t,
                            end_t: self.t + effective.expected_duration_s,
                            last_reroute_t: self.t,
                        };
                        if self.flow_state.add_flow(flow, &caps).is_err() {
                            (AdmissionDecision::reject("capacity inconsistency at admission"), None, None)
                        } else {
                            let decision = match action {
                                AdmissionAction::Accept => AdmissionDecision::accept("accepted"),
                                AdmissionAction::DegradedAccept => AdmissionDecision::degraded(0.8, "degraded accept routed"),
                                AdmissionAction::PartialAccept => AdmissionDecision::partial(0.8, "partial accept routed"),
                                _ => unreachable!(),
                            };
                            (decision, Some(decision_route), Some(effective))
                        }
                    }
                    Err(_) => (AdmissionDecision::reject("no feasible route within budget"), None, None),
                }
            }
        };

        let mut inputs = RewardInputs { apos: sample.apos, ..Default::default() };
        inputs.util = utilization_stats(&snapshot).mean;
        inputs.jain = leo_flow::FlowQueueState::jain_fairness(
            &self.flow_state.flows().map(|f| f.allocated_bw_bps).collect::<Vec<_>>(),
        );

        if let (Some(route_decision), Some(effective)) = (&route, &effective_request) {
            let delay = path_delay_s(&route_decision.route, &snapshot);
            let qoe_sample = FlowQoeSample {
                class: effective.qos_class,
                path_delay_s: delay,
                max_latency_s: effective.max_latency_s,
                loss_rate: 0.0,
                throughput_bps: route_decision.allocation.allocated_bw_bps,
                bw_min_bps: effective.bw_min_bps,
            };
            let penalty = qoe_penalty(&qoe_sample);
            self.dsroq.lyapunov_mut().update_queue(effective.qos_class, 1.0, 1.0 / (1.0 + penalty));
            self.update_qoe_window(effective.qos_class, penalty);
            self.last_admission_t = self.t;

            inputs.delta_qoe = 1.0 / (1.0 + penalty);
            inputs.viol = (penalty / (effective.bw_min_bps.max(effective.max_latency_s).max(1.0))).clamp(0.0, 1.0);
        }
        if matches!(decision.action, AdmissionAction::DelayedAccept) {
            inputs.delay_penalty = 1.0;
        }
        let _ = hints;

        let reward = compute_reward(&inputs, &self.reward_weights);
        debug!(t = self.t, action = ?action, reward, request_id = %request.id, "admission step");
        let info = StepInfo { decision: decision.clone(), route, request_id: request.id };
        (reward, info)
    }

    fn update_qoe_window(&mut self, class: QosClass, penalty: f64) {
        let idx = class_idx(class);
        let score = 1.0 / (1.0 + penalty);
        let violated = if penalty > 0.0 { 1.0 } else { 0.0 };
        let w = &mut self.qoe_windows[idx];
        w.mean = 0.8 * w.mean + 0.2 * score;
        w.violation_rate = 0.8 * w.violation_rate + 0.2 * violated;
    }

    fn build_observation(&self) -> Observation {
        let request = match &self.pending {
            Some(r) => r.clone(),
            None => return Observation(vec![0.0; leo_admission::OBSERVATION_LEN]),
        };
        let snapshot = match self.oracle.snapshot_at(self.t) {
            Ok(s) => s,
            Err(_) => return Observation(vec![0.0; leo_admission::OBSERVATION_LEN]),
        };

        let utilization = utilization_stats(&snapshot);
        let active_counts = leo_admission::observation::ActiveCounts {
            ef: self.flow_state.active_count(QosClass::Ef) as u32,
            af: self.flow_state.active_count(QosClass::Af) as u32,
            be: self.flow_state.active_count(QosClass::Be) as u32,
        };
        let qoe_by_class = [
            leo_admission::observation::QoeWindow { mean: self.qoe_windows[0].mean, violation_rate: self.qoe_windows[0].violation_rate },
            leo_admission::observation::QoeWindow { mean: self.qoe_windows[1].mean, violation_rate: self.qoe_windows[1].violation_rate },
            leo_admission::observation::QoeWindow { mean: self.qoe_windows[2].mean, violation_rate: self.qoe_windows[2].violation_rate },
        ];

        let total_capacity: f64 = snapshot.links.iter().filter(|l| l.active).map(|l| l.capacity_bps).sum::<f64>().max(1.0);
        let predicted_future_capacity_norm = (self.oracle.predict_future_capacity(self.t, 60.0).unwrap_or(0.0) / total_capacity).clamp(0.0, 1.0);
        let load_prediction_1min_norm = predicted_future_capacity_norm;
        let topology_change_rate = self.oracle.topology_change_rate(self.t).unwrap_or(0.0);

        let user_pos = request_user_position(&request, &snapshot);
        let sample = self.positioning.sample_for_user(request.id.as_ref(), &user_pos, &snapshot);
        let hints = self.positioning.beam_hints_for_user(&user_pos, &snapshot, self.cfg.positioning.beams_per_user as usize);

        let positioning = leo_admission::observation::PositioningFeatures {
            crlb_norm: sample.crlb_norm,
            gdop_norm: sample.gdop_norm,
            visible_beams_norm: (sample.visible_beams() as f64 / 10.0).clamp(0.0, 1.0),
            coop_sats_norm: (sample.coop_sats() as f64 / 5.0).clamp(0.0, 1.0),
            sinr_mean: ((sample.sinr_mean + 10.0) / 40.0).clamp(0.0, 1.0),
            sinr_min: ((sample.sinr_min + 10.0) / 40.0).clamp(0.0, 1.0),
            beam_hint_k_norm: (hints.len() as f64 / self.cfg.positioning.beams_per_user.max(1) as f64).clamp(0.0, 1.0),
        };

        let request_features = leo_admission::observation::RequestFeatures {
            class: request.qos_class,
            bw_min_norm: (request.bw_min_bps / BW_NORM_SCALE_BPS).clamp(0.0, 1.0),
            bw_max_norm: (request.bw_max_bps / BW_NORM_SCALE_BPS).clamp(0.0, 1.0),
            max_latency_norm: (request.max_latency_s / LATENCY_NORM_SCALE_S).clamp(0.0, 1.0),
            src_lat_norm: user_position(request.src, &snapshot).map(|p| p.lat_deg / 90.0).unwrap_or(0.0),
            src_lon_norm: user_position(request.src, &snapshot).map(|p| p.lon_deg / 180.0).unwrap_or(0.0),
            dst_lat_norm: user_position(request.dst, &snapshot).map(|p| p.lat_deg / 90.0).unwrap_or(0.0),
            dst_lon_norm: user_position(request.dst, &snapshot).map(|p| p.lon_deg / 180.0).unwrap_or(0.0),
            expected_duration_norm: (request.expected_duration_s / DURATION_NORM_SCALE_S).clamp(0.0, 1.0),
        };

        let stability = self.oracle.routing_stability_metrics(self.t).unwrap_or(leo_topology::RoutingStabilityMetrics {
            predicted_handover_count: 0,
            earliest_handover_s: STABILITY_WINDOW_S,
            seam_risk: false,
            contact_margin_s: STABILITY_WINDOW_S,
        });

        let inputs = leo_admission::ObservationInputs {
            utilization,
            active_counts,
            qoe_by_class,
            orbit_phase: self.oracle.orbit_phase(self.t),
            topology_change_rate,
            predicted_future_capacity_norm,
            seconds_since_last_admission_norm: ((self.t - self.last_admission_t) / 60.0).clamp(0.0, 1.0),
            request: request_features,
            positioning,
            stability,
            stability_window_s: STABILITY_WINDOW_S,
            qoe_trend_5min: self.qoe_windows[class_idx(request.qos_class)].mean - 0.5,
            admission_rate_history: self.stats.accepted as f64 / self.stats.total().max(1) as f64,
            load_prediction_1min_norm,
        };

        leo_admission::build_observation(&inputs)
    }
}

pub use leo_admission::Observation;

#[cfg(test)]
mod tests {
    use super::*;
    use leo_common::config::{
        AdmissionConfig, AdmissionPolicyKind, ArrivalModel, BackendConfig, BackendMode, ClassMix, ConstellationConfig,
        DsroqConfig as ScenarioDsroqConfig, GroundStationConfig, OutputFormat, PositioningConfig, RewardWeights as ScenarioRewardWeights,
        RoutingMode, SimulationConfig, TrafficConfig,
    };

    fn test_cfg() -> ScenarioConfig {
        ScenarioConfig {
            constellation: ConstellationConfig {
                altitude_km: 550.0,
                inclination_deg: 53.0,
                num_orbits: 3,
                sats_per_orbit: 4,
                isl_rate_mbps: 1000.0,
                gs_antennas: 2,
            },
            simulation: SimulationConfig { end_time_s: 20.0, step_ms: 1000, routing: RoutingMode::Mcts, detailed_logging: false, output_format: OutputFormat::Json },
            ground_stations: vec![
                GroundStationConfig { name: "beijing".into(), lat: 39.9, lon: 116.4 },
                GroundStationConfig { name: "nyc".into(), lat: 40.7, lon: -74.0 },
            ],
            traffic: TrafficConfig { arrival: ArrivalModel::PoissonRate { rate: 2.0 }, class_mix: ClassMix { ef: 0.3, af: 0.3, be: 0.4 } },
            admission: AdmissionConfig {
                policy: AdmissionPolicyKind::Rl,
                reward_weights: ScenarioRewardWeights::default(),
                util_high_watermark: 0.9,
                delayed_retry_s: 5.0,
            },
            dsroq: ScenarioDsroqConfig {
                alpha: 1.0,
                kappa_seam: 0.5,
                kappa_chg: 0.2,
                lambda_pos: 0.3,
                reroute_cooldown_ms: 5000,
                mcts_iters: 50,
                mcts_wall_ms: 0,
                queue_backlog_limit: 1000.0,
                exploration_constant: std::f64::consts::SQRT_2,
                no_improvement_cap: 30,
                lyapunov_v: 1.0,
            },
            positioning: PositioningConfig {
                elevation_mask_deg: 10.0,
                crlb_threshold: 50.0,
                min_visible_beams: 1,
                min_coop_sats: 1,
                beams_per_user: 3,
                w_fim: 0.5,
                w_snr: 0.3,
                w_geom: 0.2,
                visible_beams_target: 4.0,
                coop_sats_target: 3.0,
            },
            backend: BackendConfig { hypatia_mode: BackendMode::Simplified, ns3_mode: BackendMode::Simplified, data_dir: None },
        }
    }

    #[test]
    fn reset_clears_stats_and_returns_fixed_length_observation() {
        let mut env = Env::new(test_cfg()).unwrap();
        let obs = env.reset(1);
        assert_eq!(obs.as_slice().len(), leo_admission::OBSERVATION_LEN);
        assert_eq!(env.stats().total(), 0);
    }

    #[test]
    fn step_is_deterministic_given_seed_and_action_sequence() {
        let mut env_a = Env::new(test_cfg()).unwrap();
        let mut env_b = Env::new(test_cfg()).unwrap();
        env_a.reset(42);
        env_b.reset(42);

        for _ in 0..5 {
            let (obs_a, reward_a, done_a, _) = env_a.step(AdmissionAction::Accept);
            let (obs_b, reward_b, done_b, _) = env_b.step(AdmissionAction::Accept);
            assert_eq!(obs_a.as_slice(), obs_b.as_slice());
            assert_eq!(reward_a, reward_b);
            assert_eq!(done_a, done_b);
            if done_a {
                break;
            }
        }
    }

    #[test]
    fn reject_action_never_adds_an_active_flow() {
        let mut env = Env::new(test_cfg()).unwrap();
        env.reset(7);
        for _ in 0..5 {
            let (_, _, done, info) = env.step(AdmissionAction::Reject);
            assert_eq!(info.decision.action, AdmissionAction::Reject);
            if done {
                break;
            }
        }
        assert_eq!(env.stats().accepted, 0);
    }

    #[test]
    fn episode_terminates_by_horizon() {
        let mut env = Env::new(test_cfg()).unwrap();
        env.reset(3);
        let mut done = false;
        for _ in 0..10_000 {
            let (_, _, d, _) = env.step(AdmissionAction::Accept);
            if d {
                done = true;
                break;
            }
        }
        assert!(done);
    }
}
