//! Value types making up a [`NetworkSnapshot`]: satellites, ground stations,
//! links, and the node identity that spans both.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeId {
    Sat(u32),
    Ground(u32),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Sat(i) => write!(f, "sat#{i}"),
            NodeId::Ground(i) => write!(f, "gnd#{i}"),
        }
    }
}

/// An edge in the topology graph, directionless — `(a, b)` and `(b, a)`
/// name the same link. Callers that need a canonical key should use
/// [`Link::key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    pub capacity_bps: f64,
    pub current_load_bps: f64,
    pub propagation_latency_s: f64,
    pub active: bool,
    pub seam: bool,
}

impl Link {
    /// Canonical, order-independent key for hash-map lookups.
    pub fn key(&self) -> (NodeId, NodeId) {
        if self.a <= self.b {
            (self.a, self.b)
        } else {
            (self.b, self.a)
        }
    }

    pub fn residual_capacity_bps(&self) -> f64 {
        (self.capacity_bps - self.current_load_bps).max(0.0)
    }

    pub fn utilization(&self) -> f64 {
        if self.capacity_bps <= 0.0 {
            1.0
        } else {
            (self.current_load_bps / self.capacity_bps).clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Satellite {
    pub id: u32,
    pub orbit_idx: u32,
    pub slot_idx: u32,
    /// Sub-satellite latitude/longitude, degrees.
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_km: f64,
    pub spare_capacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundStation {
    pub id: u32,
    pub name: String,
    pub lat_deg: f64,
    pub lon_deg: f64,
}

/// An immutable view of the network at one instant. Produced by the
/// Topology Oracle and cached by time; no component mutates a snapshot in
/// place once handed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub t: f64,
    pub warming_up: bool,
    pub satellites: Vec<Satellite>,
    pub ground_stations: Vec<GroundStation>,
    pub links: Vec<Link>,
    /// Visible satellites per ground station, as satellite node indices.
    pub visibility: HashMap<u32, Vec<u32>>,
}

impl NetworkSnapshot {
    pub fn empty_warming_up(t: f64) -> Self {
        NetworkSnapshot {
            t,
            warming_up: true,
            satellites: Vec::new(),
            ground_stations: Vec::new(),
            links: Vec::new(),
            visibility: HashMap::new(),
        }
    }

    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<&Link> {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.links.iter().find(|l| l.key() == key)
    }

    /// Adjacency list keyed by node, values are reachable neighbor nodes
    /// over currently-active links only.
    pub fn adjacency(&self) -> HashMap<NodeId, Vec<NodeId>> {
        let mut adj: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for link in self.links.iter().filter(|l| l.active) {
            adj.entry(link.a).or_default().push(link.b);
            adj.entry(link.b).or_default().push(link.a);
        }
        adj
    }

    pub fn nodes(&self) -> HashSet<NodeId> {
        let mut nodes = HashSet::new();
        for sat in &self.satellites {
            nodes.insert(NodeId::Sat(sat.id));
        }
        for gs in &self.ground_stations {
            nodes.insert(NodeId::Ground(gs.id));
        }
        nodes
    }

    /// Overwrites each link's `current_load_bps` from an externally-owned
    /// utilization map (the authoritative source is Flow & Queue State;
    /// the Oracle only caches geometry/capacity and is stamped with load
    /// once per step before DSROQ reads `link_utilization`).
    pub fn stamp_loads(&mut self, loads: &HashMap<(NodeId, NodeId), f64>) {
        for link in &mut self.links {
            if let Some(load) = loads.get(&link.key()) {
                link.current_load_bps = *load;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutingStabilityMetrics {
    pub predicted_handover_count: u32,
    pub earliest_handover_s: f64,
    pub seam_risk: bool,
    pub contact_margin_s: f64,
}
