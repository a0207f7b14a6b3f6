//! `FlowQueueState`: the single writer for active flows, per-link load, and
//! per-node backlog. DSROQ and Admission are read-mostly callers.

use crate::types::{Flow, FlowStatus, QosClass};
use leo_common::error::{SimError, SimResult};
use leo_common::ids::FlowId;
use leo_topology::NodeId;
use std::collections::HashMap;

pub struct FlowQueueState {
    flows: HashMap<FlowId, Flow>,
    link_load_bps: HashMap<(NodeId, NodeId), f64>,
    node_backlog_bytes: HashMap<NodeId, f64>,
    virtual_queues: HashMap<QosClass, f64>,
}

fn link_key(route: &[NodeId]) -> Vec<(NodeId, NodeId)> {
    route
        .windows(2)
        .map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            if a <= b {
                (a, b)
            } else {
                (b, a)
            }
        })
        .collect()
}

impl FlowQueueState {
    pub fn new() -> Self {
        FlowQueueState {
            flows: HashMap::new(),
            link_load_bps: HashMap::new(),
            node_backlog_bytes: HashMap::new(),
            virtual_queues: HashMap::new(),
        }
    }

    /// Adds a flow's load to every link on its route. Fails (without
    /// partially applying) if any link on the route would exceed capacity.
    pub fn add_flow(
        &mut self,
        flow: Flow,
        link_capacity_bps: &HashMap<(NodeId, NodeId), f64>,
    ) -> SimResult<()> {
        if !flow.is_simple_path() {
            return Err(SimError::StateInconsistency {
                step: 0,
                description: format!("flow {} route is not a simple path", flow.id),
                last_good_snapshot: String::new(),
            });
        }

        let keys = link_key(&flow.route);
        for key in &keys {
            let capacity = *link_capacity_bps.get(key).unwrap_or(&0.0);
            let current = *self.link_load_bps.get(key).unwrap_or(&0.0);
            if current + flow.allocated_bw_bps > capacity + 1e-6 {
                return Err(SimError::feasibility(format!(
                    "link {:?}-{:?} at capacity",
                    key.0, key.1
                )));
            }
        }

        for key in keys {
            *self.link_load_bps.entry(key).or_insert(0.0) += flow.allocated_bw_bps;
        }

        self.flows.insert(flow.id.clone(), flow);
        Ok(())
    }

    pub fn remove_flow(&mut self, flow_id: &FlowId) -> Option<Flow> {
        let flow = self.flows.remove(flow_id)?;
        for key in link_key(&flow.route) {
            if let Some(load) = self.link_load_bps.get_mut(&key) {
                *load = (*load - flow.allocated_bw_bps).max(0.0);
            }
        }
        Some(flow)
    }

    pub fn get_flow(&self, flow_id: &FlowId) -> Option<&Flow> {
        self.flows.get(flow_id)
    }

    pub fn get_flow_mut(&mut self, flow_id: &FlowId) -> Option<&mut Flow> {
        self.flows.get_mut(flow_id)
    }

    pub fn flows(&self) -> impl Iterator<Item = &Flow> {
        self.flows.values()
    }

    pub fn active_count(&self, class: QosClass) -> usize {
        self.flows
            .values()
            .filter(|f| f.qos_class == class && f.status == FlowStatus::Active)
            .count()
    }

    pub fn link_load(&self, a: NodeId, b: NodeId) -> f64 {
        let key = if a <= b { (a, b) } else { (b, a) };
        *self.link_load_bps.get(&key).unwrap_or(&0.0)
    }

    pub fn link_loads(&self) -> &HashMap<(NodeId, NodeId), f64> {
        &self.link_load_bps
    }

    pub fn backlog_at(&self, node: NodeId) -> f64 {
        *self.node_backlog_bytes.get(&node).unwrap_or(&0.0)
    }

    /// Advances each node's backlog by `arrivals - services` over `dt`
    /// seconds, clamped at zero — backlogs never go negative.
    pub fn tick_queues(
        &mut self,
        dt_s: f64,
        arrivals_bps: &HashMap<NodeId, f64>,
        services_bps: &HashMap<NodeId, f64>,
    ) {
        let mut nodes: std::collections::HashSet<NodeId> = arrivals_bps.keys().cloned().collect();
        nodes.extend(services_bps.keys().cloned());
        nodes.extend(self.node_backlog_bytes.keys().cloned());

        for node in nodes {
            let arrival = *arrivals_bps.get(&node).unwrap_or(&0.0);
            let service = *services_bps.get(&node).unwrap_or(&0.0);
            let delta_bytes = (arrival - service) * dt_s / 8.0;
            let entry = self.node_backlog_bytes.entry(node).or_insert(0.0);
            *entry = (*entry + delta_bytes).max(0.0);
        }
    }

    pub fn virtual_queue(&self, class: QosClass) -> f64 {
        *self.virtual_queues.get(&class).unwrap_or(&0.0)
    }

    pub fn set_virtual_queue(&mut self, class: QosClass, value: f64) {
        self.virtual_queues.insert(class, value.max(0.0));
    }

    /// Jain fairness index over a vector of per-user QoE values, in (0, 1].
    pub fn jain_fairness(qoe_vector: &[f64]) -> f64 {
        if qoe_vector.is_empty() {
            return 1.0;
        }
        let sum: f64 = qoe_vector.iter().sum();
        let sum_sq: f64 = qoe_vector.iter().map(|x| x * x).sum();
        if sum_sq <= 0.0 {
            return 1.0;
        }
        (sum * sum) / (qoe_vector.len() as f64 * sum_sq)
    }
}

impl Default for FlowQueueState {
    fn default() -> Self {
        Self::new()
    }
}
