//! Admission decision and request-scaling types shared by every policy.

use leo_flow::FlowRequest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionAction {
    Accept,
    Reject,
    DegradedAccept,
    DelayedAccept,
    PartialAccept,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub action: AdmissionAction,
    pub confidence: f64,
    pub reason: String,
    pub retry_at_s: Option<f64>,
}

impl AdmissionDecision {
    pub fn accept(reason: impl Into<String>) -> Self {
        AdmissionDecision { action: AdmissionAction::Accept, confidence: 1.0, reason: reason.into(), retry_at_s: None }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        AdmissionDecision { action: AdmissionAction::Reject, confidence: 1.0, reason: reason.into(), retry_at_s: None }
    }

    pub fn degraded(confidence: f64, reason: impl Into<String>) -> Self {
        AdmissionDecision {
            action: AdmissionAction::DegradedAccept,
            confidence,
            reason: reason.into(),
            retry_at_s: None,
        }
    }

    pub fn delayed(retry_at_s: f64, reason: impl Into<String>) -> Self {
        AdmissionDecision {
            action: AdmissionAction::DelayedAccept,
            confidence: 1.0,
            reason: reason.into(),
            retry_at_s: Some(retry_at_s),
        }
    }

    pub fn partial(confidence: f64, reason: impl Into<String>) -> Self {
        AdmissionDecision {
            action: AdmissionAction::PartialAccept,
            confidence,
            reason: reason.into(),
            retry_at_s: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct AdmissionStats {
    pub accepted: u64,
    pub rejected: u64,
    pub degraded: u64,
    pub delayed: u64,
    pub partial: u64,
}

impl AdmissionStats {
    pub fn total(&self) -> u64 {
        self.accepted + self.rejected + self.degraded + self.delayed + self.partial
    }

    pub fn record(&mut self, action: AdmissionAction) {
        match action {
            AdmissionAction::Accept => self.accepted += 1,
            AdmissionAction::Reject => self.rejected += 1,
            AdmissionAction::DegradedAccept => self.degraded += 1,
            AdmissionAction::DelayedAccept => self.delayed += 1,
            AdmissionAction::PartialAccept => self.partial += 1,
        }
    }
}

/// Applies the DEGRADED_ACCEPT scaling rule (bandwidth × 0.8, max_latency ×
/// 1.5) to produce the request DSROQ actually sees.
pub fn degrade_request(request: &FlowRequest) -> FlowRequest {
    FlowRequest {
        bw_min_bps: request.bw_min_bps * 0.8,
        bw_max_bps: request.bw_max_bps * 0.8,
        max_latency_s: request.max_latency_s * 1.5,
        ..request.clone()
    }
}

/// Applies the PARTIAL_ACCEPT rule: `b_max := b_min`.
pub fn partial_request(request: &FlowRequest) -> FlowRequest {
    FlowRequest { bw_max_bps: request.bw_min_bps, ..request.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leo_common::ids::request_id;
    use leo_flow::QosClass;
    use leo_topology::NodeId;

    fn sample_request() -> FlowRequest {
        FlowRequest {
            id: request_id(),
            src: NodeId::Ground(0),
            dst: NodeId::Ground(1),
            qos_class: QosClass::Af,
            bw_min_bps: 10.0,
            bw_max_bps: 100.0,
            max_latency_s: 0.1,
            min_reliability: 0.9,
            expected_duration_s: 60.0,
            arrival_t: 0.0,
        }
    }

    #[test]
    fn degrade_scales_bandwidth_down_and_latency_up() {
        let req = sample_request();
        let degraded = degrade_request(&req);
        assert_eq!(degraded.bw_min_bps, 8.0);
        assert_eq!(degraded.bw_max_bps, 80.0);
        assert!((degraded.max_latency_s - 0.15).abs() < 1e-9);
    }

    #[test]
    fn partial_pins_max_to_min() {
        let req = sample_request();
        let partial = partial_request(&req);
        assert_eq!(partial.bw_max_bps, partial.bw_min_bps);
    }

    #[test]
    fn stats_total_sums_all_buckets() {
        let mut stats = AdmissionStats::default();
        stats.record(AdmissionAction::Accept);
        stats.record(AdmissionAction::Reject);
        stats.record(AdmissionAction::DegradedAccept);
        assert_eq!(stats.total(), 3);
    }
}
