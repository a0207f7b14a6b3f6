//! Arrival process: draws new `FlowRequest`s for the window `[t - dt, t]`
//! from a configured rate model and class mix. Deterministic for a given
//! RNG stream, in the style of the teacher's seeded scenario generators.

use crate::types::{FlowRequest, QosClass};
use leo_common::config::{ArrivalModel, ClassMix, TrafficConfig};
use leo_common::ids::request_id;
use leo_topology::NodeId;
use rand::rngs::StdRng;
use rand::RngExt as _;

/// A ground station candidate endpoint for generated requests.
#[derive(Debug, Clone, Copy)]
pub struct EndpointSpec {
    pub node: NodeId,
}

pub struct ArrivalProcess {
    cfg: TrafficConfig,
    endpoints: Vec<EndpointSpec>,
}

fn class_mix_sample(mix: &ClassMix, u: f64) -> QosClass {
    if u < mix.ef {
        QosClass::Ef
    } else if u < mix.ef + mix.af {
        QosClass::Af
    } else {
        QosClass::Be
    }
}

fn instantaneous_rate(model: &ArrivalModel, t: f64) -> f64 {
    match model {
        ArrivalModel::PoissonRate { rate } => *rate,
        ArrivalModel::Sinusoidal { base, amplitude, period } => {
            let phase = if *period > 0.0 { 2.0 * std::f64::consts::PI * t / period } else { 0.0 };
            (base + amplitude * phase.sin()).max(0.0)
        }
    }
}

impl ArrivalProcess {
    pub fn new(cfg: TrafficConfig, endpoints: Vec<EndpointSpec>) -> Self {
        ArrivalProcess { cfg, endpoints }
    }

    /// Draws arrivals for the half-open window `(t - dt_s, t]` using a
    /// rate-scaled Bernoulli-per-substep approximation of a Poisson
    /// process, discretized into whole-millisecond substeps.
    pub fn draw(&self, t: f64, dt_s: f64, rng: &mut StdRng) -> Vec<FlowRequest> {
        if self.endpoints.len() < 2 || dt_s <= 0.0 {
            return Vec::new();
        }
        let rate = instantaneous_rate(&self.cfg.arrival, t);
        let expected = rate * dt_s;
        let substeps = 1000usize.min(((expected * 20.0).ceil() as usize).max(1));
        let p_per_substep = (expected / substeps as f64).min(1.0);

        let mut requests = Vec::new();
        for i in 0..substeps {
            if rng.random::<f64>() >= p_per_substep {
                continue;
            }
            let arrival_t = t - dt_s + dt_s * (i as f64 + 1.0) / substeps as f64;
            let class = class_mix_sample(&self.cfg.class_mix, rng.random::<f64>());

            let src_idx = (rng.random::<f64>() * self.endpoints.len() as f64) as usize % self.endpoints.len();
            let mut dst_idx = (rng.random::<f64>() * self.endpoints.len() as f64) as usize % self.endpoints.len();
            if dst_idx == src_idx {
                dst_idx = (dst_idx + 1) % self.endpoints.len();
            }

            let (bw_min_bps, bw_max_bps, max_latency_s) = match class {
                QosClass::Ef => (64_000.0, 256_000.0, 0.15),
                QosClass::Af => (256_000.0, 2_000_000.0, 0.4),
                QosClass::Be => (128_000.0, 10_000_000.0, 2.0),
            };

            requests.push(FlowRequest {
                id: request_id(),
                src: self.endpoints[src_idx].node,
                dst: self.endpoints[dst_idx].node,
                qos_class: class,
                bw_min_bps,
                bw_max_bps,
                max_latency_s,
                min_reliability: 0.95,
                expected_duration_s: 30.0 + rng.random::<f64>() * 90.0,
                arrival_t,
            });
        }
        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leo_common::config::ClassMix;
    use rand::SeedableRng;

    fn endpoints() -> Vec<EndpointSpec> {
        vec![
            EndpointSpec { node: NodeId::Ground(0) },
            EndpointSpec { node: NodeId::Ground(1) },
        ]
    }

    fn traffic_cfg(rate: f64) -> TrafficConfig {
        TrafficConfig {
            arrival: ArrivalModel::PoissonRate { rate },
            class_mix: ClassMix { ef: 0.3, af: 0.3, be: 0.4 },
        }
    }

    #[test]
    fn zero_rate_produces_no_arrivals() {
        let process = ArrivalProcess::new(traffic_cfg(0.0), endpoints());
        let mut rng = StdRng::seed_from_u64(1);
        let reqs = process.draw(10.0, 1.0, &mut rng);
        assert!(reqs.is_empty());
    }

    #[test]
    fn draw_is_deterministic_for_seed() {
        let process = ArrivalProcess::new(traffic_cfg(5.0), endpoints());
        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(7);
        let a = process.draw(10.0, 1.0, &mut rng1);
        let b = process.draw(10.0, 1.0, &mut rng2);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.arrival_t, y.arrival_t);
            assert_eq!(x.src, y.src);
            assert_eq!(x.dst, y.dst);
        }
    }

    #[test]
    fn src_and_dst_are_never_equal() {
        let process = ArrivalProcess::new(traffic_cfg(50.0), endpoints());
        let mut rng = StdRng::seed_from_u64(3);
        let reqs = process.draw(10.0, 1.0, &mut rng);
        for r in reqs {
            assert_ne!(r.src, r.dst);
        }
    }

    #[test]
    fn fewer_than_two_endpoints_yields_no_arrivals() {
        let process = ArrivalProcess::new(traffic_cfg(50.0), vec![EndpointSpec { node: NodeId::Ground(0) }]);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(process.draw(10.0, 1.0, &mut rng).is_empty());
    }
}
