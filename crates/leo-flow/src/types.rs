//! Flow Request, Flow, QoS classes, and the allocation/decision result
//! types shared across admission and DSROQ.

use leo_common::ids::{FlowId, RequestId};
use leo_topology::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QosClass {
    Ef,
    Af,
    Be,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRequest {
    pub id: RequestId,
    pub src: NodeId,
    pub dst: NodeId,
    pub qos_class: QosClass,
    pub bw_min_bps: f64,
    pub bw_max_bps: f64,
    pub max_latency_s: f64,
    pub min_reliability: f64,
    pub expected_duration_s: f64,
    pub arrival_t: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStatus {
    Pending,
    Active,
    Queued,
    Rerouting,
    Completed,
    Failed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub request: FlowRequest,
    pub route: Vec<NodeId>,
    pub allocated_bw_bps: f64,
    /// May differ from `request.qos_class` under DEGRADED_ACCEPT.
    pub qos_class: QosClass,
    pub status: FlowStatus,
    pub start_t: f64,
    pub end_t: f64,
    pub last_reroute_t: f64,
}

impl Flow {
    pub fn is_simple_path(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.route.iter().all(|n| seen.insert(*n))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub allocated_bandwidth_bps: f64,
    pub expected_latency_s: f64,
    pub expected_reliability: f64,
    pub resource_cost: f64,
    pub success: bool,
}
