//! Observation Builder: assembles the fixed-order feature vector consumed
//! by the RL admission policy. Every field is clamped to its documented
//! range ([0,1] unless noted) so the vector is bounded regardless of raw
//! input magnitude.

use leo_flow::QosClass;
use leo_topology::RoutingStabilityMetrics;
use serde::{Deserialize, Serialize};

fn clamp01(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn clamp_signed(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Rolling per-class QoE trend fed in from the simulation engine's metrics
/// window; `mean`/`violation_rate` are already in [0,1].
#[derive(Debug, Clone, Copy, Default)]
pub struct QoeWindow {
    pub mean: f64,
    pub violation_rate: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkUtilizationStats {
    pub mean: f64,
    pub max: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ActiveCounts {
    pub ef: u32,
    pub af: u32,
    pub be: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct PositioningFeatures {
    pub crlb_norm: f64,
    pub gdop_norm: f64,
    pub visible_beams_norm: f64,
    pub coop_sats_norm: f64,
    pub sinr_mean: f64,
    pub sinr_min: f64,
    pub beam_hint_k_norm: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct RequestFeatures {
    pub class: QosClass,
    pub bw_min_norm: f64,
    pub bw_max_norm: f64,
    pub max_latency_norm: f64,
    pub src_lat_norm: f64,
    pub src_lon_norm: f64,
    pub dst_lat_norm: f64,
    pub dst_lon_norm: f64,
    pub expected_duration_norm: f64,
}

/// All raw inputs the builder needs, already computed by upstream layers
/// for the current step and the requesting flow.
pub struct ObservationInputs {
    pub utilization: NetworkUtilizationStats,
    pub active_counts: ActiveCounts,
    pub qoe_by_class: [QoeWindow; 3],
    pub orbit_phase: f64,
    pub topology_change_rate: f64,
    pub predicted_future_capacity_norm: f64,
    pub seconds_since_last_admission_norm: f64,
    pub request: RequestFeatures,
    pub positioning: PositioningFeatures,
    pub stability: RoutingStabilityMetrics,
    pub stability_window_s: f64,
    pub qoe_trend_5min: f64,
    pub admission_rate_history: f64,
    pub load_prediction_1min_norm: f64,
}

/// Fixed-order feature vector. The field order here IS the wire order:
/// appending, removing, or reordering a field changes the observation
/// contract for any trained policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation(pub Vec<f64>);

pub const OBSERVATION_LEN: usize = 41;

impl Observation {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

pub fn build_observation(inputs: &ObservationInputs) -> Observation {
    let mut v = Vec::with_capacity(OBSERVATION_LEN);

    v.push(clamp01(inputs.utilization.mean));
    v.push(clamp01(inputs.utilization.max));
    v.push(clamp01(inputs.utilization.std));
    v.push(clamp01(inputs.active_counts.ef as f64 / 100.0));
    v.push(clamp01(inputs.active_counts.af as f64 / 100.0));
    v.push(clamp01(inputs.active_counts.be as f64 / 100.0));

    for window in &inputs.qoe_by_class {
        v.push(clamp01(window.mean));
        v.push(clamp01(window.violation_rate));
    }

    v.push(clamp01(inputs.orbit_phase));
    v.push(clamp01(inputs.topology_change_rate));
    v.push(clamp01(inputs.predicted_future_capacity_norm));
    v.push(clamp01(inputs.seconds_since_last_admission_norm));

    let r = &inputs.request;
    v.push(if r.class == QosClass::Ef { 1.0 } else { 0.0 });
    v.push(if r.class == QosClass::Af { 1.0 } else { 0.0 });
    v.push(if r.class == QosClass::Be { 1.0 } else { 0.0 });
    v.push(clamp01(r.bw_min_norm));
    v.push(clamp01(r.bw_max_norm));
    v.push(clamp01(r.max_latency_norm));
    v.push(clamp_signed(r.src_lat_norm));
    v.push(clamp_signed(r.src_lon_norm));
    v.push(clamp_signed(r.dst_lat_norm));
    v.push(clamp_signed(r.dst_lon_norm));
    v.push(clamp01(r.expected_duration_norm));

    let p = &inputs.positioning;
    v.push(clamp01(p.crlb_norm));
    v.push(clamp01(p.gdop_norm));
    v.push(clamp01(p.visible_beams_norm));
    v.push(clamp01(p.coop_sats_norm));
    v.push(clamp01(p.sinr_mean));
    v.push(clamp01(p.sinr_min));
    v.push(clamp01(p.beam_hint_k_norm));

    let s = &inputs.stability;
    v.push(clamp01(s.predicted_handover_count as f64 / 10.0));
    v.push(clamp01(s.earliest_handover_s / inputs.stability_window_s.max(1e-9)));
    v.push(if s.seam_risk { 1.0 } else { 0.0 });
    v.push(clamp01(s.contact_margin_s / inputs.stability_window_s.max(1e-9)));

    v.push(clamp_signed(inputs.qoe_trend_5min));
    v.push(clamp01(inputs.admission_rate_history));
    v.push(clamp01(inputs.load_prediction_1min_norm));

    Observation(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_inputs() -> ObservationInputs {
        ObservationInputs {
            utilization: NetworkUtilizationStats { mean: 0.5, max: 0.9, std: 0.1 },
            active_counts: ActiveCounts { ef: 3, af: 5, be: 10 },
            qoe_by_class: [QoeWindow { mean: 0.8, violation_rate: 0.1 }; 3],
            orbit_phase: 0.25,
            topology_change_rate: 0.02,
            predicted_future_capacity_norm: 0.7,
            seconds_since_last_admission_norm: 0.1,
            request: RequestFeatures {
                class: QosClass::Ef,
                bw_min_norm: 0.3,
                bw_max_norm: 0.5,
                max_latency_norm: 0.2,
                src_lat_norm: 0.4,
                src_lon_norm: -0.4,
                dst_lat_norm: 0.1,
                dst_lon_norm: -0.1,
                expected_duration_norm: 0.6,
            },
            positioning: PositioningFeatures {
                crlb_norm: 0.9,
                gdop_norm: 0.9,
                visible_beams_norm: 0.8,
                coop_sats_norm: 0.6,
                sinr_mean: 0.7,
                sinr_min: 0.5,
                beam_hint_k_norm: 0.5,
            },
            stability: RoutingStabilityMetrics {
                predicted_handover_count: 2,
                earliest_handover_s: 30.0,
                seam_risk: true,
                contact_margin_s: 45.0,
            },
            stability_window_s: 60.0,
            qoe_trend_5min: 0.2,
            admission_rate_history: 0.6,
            load_prediction_1min_norm: 0.4,
        }
    }

    #[test]
    fn vector_has_documented_fixed_length() {
        let obs = build_observation(&sample_inputs());
        assert_eq!(obs.as_slice().len(), OBSERVATION_LEN);
    }

    #[test]
    fn all_values_are_within_bounded_ranges() {
        let obs = build_observation(&sample_inputs());
        for (i, x) in obs.as_slice().iter().enumerate() {
            assert!((-1.0..=1.0).contains(x), "feature {i} = {x} out of bounds");
        }
    }

    #[test]
    fn non_finite_inputs_clamp_to_zero_not_nan() {
        let mut inputs = sample_inputs();
        inputs.utilization.mean = f64::NAN;
        inputs.qoe_trend_5min = f64::INFINITY;
        let obs = build_observation(&inputs);
        assert_eq!(obs.as_slice()[0], 0.0);
        assert!(obs.as_slice().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn one_hot_class_encoding_selects_exactly_one() {
        let obs = build_observation(&sample_inputs());
        let class_one_hot = &obs.as_slice()[16..19];
        assert_eq!(class_one_hot.iter().sum::<f64>(), 1.0);
    }
}
