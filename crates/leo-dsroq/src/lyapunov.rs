//! Lyapunov drift-plus-penalty scheduler: one virtual queue per QoS class,
//! driven by a per-class backlog update and a per-class QoE penalty term.
//! `V` trades fairness/throughput (large V) against queue stability (small
//! V). Link capacity is assumed to dominate `queue_backlog_limit`, so the
//! virtual queues never grow without bound under a feasible admission mix.

use leo_flow::QosClass;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct LyapunovConfig {
    pub v: f64,
    pub queue_backlog_limit: f64,
}

/// Per-flow quality observation feeding the QoE penalty for its class.
#[derive(Debug, Clone, Copy)]
pub struct FlowQoeSample {
    pub class: QosClass,
    pub path_delay_s: f64,
    pub max_latency_s: f64,
    pub loss_rate: f64,
    pub throughput_bps: f64,
    pub bw_min_bps: f64,
}

const LOSS_WEIGHT: f64 = 10.0;

/// Per-class QoE penalty: EF penalizes delay above the latency bound, AF
/// penalizes loss, BE penalizes throughput shortfall below its floor.
pub fn qoe_penalty(sample: &FlowQoeSample) -> f64 {
    match sample.class {
        QosClass::Ef => (sample.path_delay_s - sample.max_latency_s).max(0.0),
        QosClass::Af => sample.loss_rate * LOSS_WEIGHT,
        QosClass::Be => (sample.bw_min_bps - sample.throughput_bps).max(0.0),
    }
}

pub struct LyapunovScheduler {
    cfg: LyapunovConfig,
    queues: HashMap<QosClass, f64>,
}

impl LyapunovScheduler {
    pub fn new(cfg: LyapunovConfig) -> Self {
        LyapunovScheduler { cfg, queues: HashMap::new() }
    }

    pub fn queue_backlog(&self, class: QosClass) -> f64 {
        *self.queues.get(&class).unwrap_or(&0.0)
    }

    /// Advances the virtual queue for `class` by `arrivals - service`,
    /// clamped to the configured backlog limit.
    pub fn update_queue(&mut self, class: QosClass, arrivals: f64, service: f64) {
        let entry = self.queues.entry(class).or_insert(0.0);
        *entry = (*entry + arrivals - service).clamp(0.0, self.cfg.queue_backlog_limit);
    }

    /// Drift-plus-penalty score for a candidate allocation: the weighted sum
    /// of each class's virtual-queue backlog times its marginal service
    /// rate, minus `V` times the aggregate QoE penalty. Callers minimize
    /// this across candidate allocations/routes — lower is better.
    pub fn drift_plus_penalty(&self, service_by_class: &HashMap<QosClass, f64>, qoe_samples: &[FlowQoeSample]) -> f64 {
        let drift: f64 = service_by_class
            .iter()
            .map(|(class, service)| -self.queue_backlog(*class) * service)
            .sum();
        let penalty: f64 = qoe_samples.iter().map(qoe_penalty).sum();
        drift + self.cfg.v * penalty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> LyapunovConfig {
        LyapunovConfig { v: 1.0, queue_backlog_limit: 1000.0 }
    }

    #[test]
    fn ef_penalty_is_zero_within_latency_bound() {
        let sample = FlowQoeSample {
            class: QosClass::Ef,
            path_delay_s: 0.05,
            max_latency_s: 0.1,
            loss_rate: 0.0,
            throughput_bps: 0.0,
            bw_min_bps: 0.0,
        };
        assert_eq!(qoe_penalty(&sample), 0.0);
    }

    #[test]
    fn ef_penalty_grows_with_excess_delay() {
        let sample = FlowQoeSample {
            class: QosClass::Ef,
            path_delay_s: 0.2,
            max_latency_s: 0.1,
            loss_rate: 0.0,
            throughput_bps: 0.0,
            bw_min_bps: 0.0,
        };
        assert!((qoe_penalty(&sample) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn be_penalty_reflects_throughput_shortfall() {
        let sample = FlowQoeSample {
            class: QosClass::Be,
            path_delay_s: 0.0,
            max_latency_s: 0.0,
            loss_rate: 0.0,
            throughput_bps: 2.0,
            bw_min_bps: 5.0,
        };
        assert_eq!(qoe_penalty(&sample), 3.0);
    }

    #[test]
    fn queue_backlog_is_clamped_nonnegative_and_bounded() {
        let mut sched = LyapunovScheduler::new(cfg());
        sched.update_queue(QosClass::Ef, 0.0, 1000.0);
        assert_eq!(sched.queue_backlog(QosClass::Ef), 0.0);
        sched.update_queue(QosClass::Ef, 10_000.0, 0.0);
        assert_eq!(sched.queue_backlog(QosClass::Ef), cfg().queue_backlog_limit);
    }

    #[test]
    fn higher_v_weighs_qoe_penalty_more_heavily() {
        let low_v = LyapunovScheduler::new(LyapunovConfig { v: 0.1, queue_backlog_limit: 1000.0 });
        let high_v = LyapunovScheduler::new(LyapunovConfig { v: 10.0, queue_backlog_limit: 1000.0 });
        let samples = [FlowQoeSample {
            class: QosClass::Ef,
            path_delay_s: 1.0,
            max_latency_s: 0.0,
            loss_rate: 0.0,
            throughput_bps: 0.0,
            bw_min_bps: 0.0,
        }];
        let service = HashMap::new();
        assert!(high_v.drift_plus_penalty(&service, &samples) > low_v.drift_plus_penalty(&service, &samples));
    }
}
