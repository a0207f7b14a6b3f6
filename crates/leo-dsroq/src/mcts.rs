//! MCTS router: state = partial path from source toward destination,
//! actions = admissible next hops, UCB1 child selection, a
//! greedy-residual-capacity-weighted-latency rollout policy, and the three
//! budget stops (iteration cap, wall-time cap, no-improvement-over-K).

use leo_topology::{NetworkSnapshot, NodeId};
use rand::rngs::StdRng;
use rand::RngExt as _;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct SearchBudget {
    pub max_iterations: u32,
    /// `None` disables the wall-clock stop — required for the RL adapter's
    /// single-step determinism, where only the iteration cap may fire.
    pub max_wall_time_ms: Option<u64>,
    pub no_improvement_cap: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct MctsConfig {
    pub exploration_constant: f64,
    pub max_hops: usize,
    /// A link at or above this utilization is inadmissible as a next hop.
    pub congestion_threshold: f64,
    pub terminal_reward: f64,
    pub dead_end_penalty: f64,
}

struct Node {
    path: Vec<NodeId>,
    visits: u32,
    total_reward: f64,
    children: Vec<usize>,
    untried: Vec<NodeId>,
    parent: Option<usize>,
}

pub struct MctsRouter<'a> {
    snapshot: &'a NetworkSnapshot,
    link_loads: &'a HashMap<(NodeId, NodeId), f64>,
    adjacency: HashMap<NodeId, Vec<NodeId>>,
    cfg: MctsConfig,
}

/// Cost callback: scores a complete candidate path, lower is better.
pub type CostFn<'a> = dyn Fn(&[NodeId]) -> Option<f64> + 'a;

impl<'a> MctsRouter<'a> {
    pub fn new(snapshot: &'a NetworkSnapshot, link_loads: &'a HashMap<(NodeId, NodeId), f64>, cfg: MctsConfig) -> Self {
        MctsRouter {
            snapshot,
            link_loads,
            adjacency: snapshot.adjacency(),
            cfg,
        }
    }

    fn admissible_next_hops(&self, path: &[NodeId]) -> Vec<NodeId> {
        let current = *path.last().unwrap();
        let in_path: std::collections::HashSet<_> = path.iter().cloned().collect();
        self.adjacency
            .get(&current)
            .into_iter()
            .flatten()
            .filter(|next| !in_path.contains(next))
            .filter(|next| {
                self.snapshot
                    .link_between(current, **next)
                    .map(|l| l.active && self.utilization(&l.key()) < self.cfg.congestion_threshold)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    fn utilization(&self, key: &(NodeId, NodeId)) -> f64 {
        let link = self.snapshot.links.iter().find(|l| l.key() == *key);
        match link {
            Some(l) if l.capacity_bps > 0.0 => {
                let load = *self.link_loads.get(key).unwrap_or(&l.current_load_bps);
                load / l.capacity_bps
            }
            _ => 1.0,
        }
    }

    fn residual_weight(&self, a: NodeId, b: NodeId) -> f64 {
        let key = if a <= b { (a, b) } else { (b, a) };
        let link = self.snapshot.links.iter().find(|l| l.key() == key);
        match link {
            Some(l) => {
                let load = *self.link_loads.get(&key).unwrap_or(&l.current_load_bps);
                let residual = (l.capacity_bps - load).max(1.0);
                l.propagation_latency_s + 1.0 / residual.sqrt()
            }
            None => f64::INFINITY,
        }
    }

    /// Greedy-shortest rollout: repeatedly steps to the admissible neighbor
    /// with the lowest residual-capacity-weighted latency until the
    /// destination is reached or no admissible hop remains / hop cap hit.
    fn rollout(&self, path: &[NodeId], dst: NodeId) -> Option<Vec<NodeId>> {
        let mut path = path.to_vec();
        while *path.last().unwrap() != dst {
            if path.len() - 1 >= self.cfg.max_hops {
                return None;
            }
            let candidates = self.admissible_next_hops(&path);
            if candidates.is_empty() {
                return None;
            }
            let current = *path.last().unwrap();
            let best = candidates
                .into_iter()
                .min_by(|a, b| {
                    self.residual_weight(current, *a)
                        .partial_cmp(&self.residual_weight(current, *b))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap();
            path.push(best);
        }
        Some(path)
    }

    /// Runs MCTS from `src` to `dst`, returning the best complete path found
    /// (scored by `cost_fn`, lower is better) or `None` if no path was ever
    /// produced within budget.
    pub fn search(
        &self,
        src: NodeId,
        dst: NodeId,
        budget: SearchBudget,
        rng: &mut StdRng,
        cost_fn: &CostFn,
    ) -> Option<Vec<NodeId>> {
        let start = Instant::now();
        let wall_cap = budget.max_wall_time_ms.map(Duration::from_millis);

        if wall_cap == Some(Duration::ZERO) {
            return self.rollout(&[src], dst);
        }

        let mut arena: Vec<Node> = vec![Node {
            path: vec![src],
            visits: 0,
            total_reward: 0.0,
            children: Vec::new(),
            untried: self.admissible_next_hops(&[src]),
            parent: None,
        }];

        let mut best_path: Option<Vec<NodeId>> = None;
        let mut best_cost = f64::INFINITY;
        let mut iterations_since_improvement = 0u32;

        for _ in 0..budget.max_iterations {
            if let Some(cap) = wall_cap {
                if start.elapsed() >= cap {
                    break;
                }
            }
            if iterations_since_improvement >= budget.no_improvement_cap {
                break;
            }

            let leaf_idx = self.select(&arena, 0);
            let expanded_idx = self.expand(&mut arena, leaf_idx, rng);
            let rollout_path = self.rollout(&arena[expanded_idx].path, dst);

            let reward = match &rollout_path {
                Some(p) if *p.last().unwrap() == dst => self.cfg.terminal_reward,
                _ => -self.cfg.dead_end_penalty,
            };
            self.backpropagate(&mut arena, expanded_idx, reward);

            if let Some(p) = rollout_path {
                if *p.last().unwrap() == dst {
                    if let Some(cost) = cost_fn(&p) {
                        if cost < best_cost {
                            best_cost = cost;
                            best_path = Some(p);
                            iterations_since_improvement = 0;
                            continue;
                        }
                    }
                }
            }
            iterations_since_improvement += 1;
        }

        best_path
    }

    fn select(&self, arena: &[Node], mut idx: usize) -> usize {
        loop {
            let node = &arena[idx];
            if !node.untried.is_empty() || node.children.is_empty() {
                return idx;
            }
            let parent_visits = node.visits.max(1) as f64;
            idx = *node
                .children
                .iter()
                .max_by(|a, b| {
                    ucb1(&arena[**a], parent_visits, self.cfg.exploration_constant)
                        .partial_cmp(&ucb1(&arena[**b], parent_visits, self.cfg.exploration_constant))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap();
        }
    }

    fn expand(&self, arena: &mut Vec<Node>, idx: usize, rng: &mut StdRng) -> usize {
        if arena[idx].untried.is_empty() {
            return idx;
        }
        let pick = (rng.random::<f64>() * arena[idx].untried.len() as f64) as usize;
        let pick = pick.min(arena[idx].untried.len() - 1);
        let next = arena[idx].untried.remove(pick);

        let mut path = arena[idx].path.clone();
        path.push(next);
        let untried = self.admissible_next_hops(&path);

        let child_idx = arena.len();
        arena.push(Node {
            path,
            visits: 0,
            total_reward: 0.0,
            children: Vec::new(),
            untried,
            parent: Some(idx),
        });
        arena[idx].children.push(child_idx);
        child_idx
    }

    fn backpropagate(&self, arena: &mut [Node], mut idx: usize, reward: f64) {
        loop {
            arena[idx].visits += 1;
            arena[idx].total_reward += reward;
            match arena[idx].parent {
                Some(p) => idx = p,
                None => break,
            }
        }
    }
}

fn ucb1(node: &Node, parent_visits: f64, exploration_constant: f64) -> f64 {
    if node.visits == 0 {
        return f64::INFINITY;
    }
    let mean = node.total_reward / node.visits as f64;
    mean + exploration_constant * (parent_visits.ln() / node.visits as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use leo_topology::{GroundStationSpec, SimplifiedBackend, TopologyBackend};
    use rand::SeedableRng;

    fn small_snapshot() -> NetworkSnapshot {
        let cfg = leo_common::config::ConstellationConfig {
            altitude_km: 550.0,
            inclination_deg: 53.0,
            num_orbits: 3,
            sats_per_orbit: 4,
            isl_rate_mbps: 1000.0,
            gs_antennas: 2,
        };
        let gs = vec![
            GroundStationSpec { name_idx: 0, lat_deg: 39.9, lon_deg: 116.4 },
            GroundStationSpec { name_idx: 1, lat_deg: 40.7, lon_deg: -74.0 },
        ];
        SimplifiedBackend::new(cfg, gs).snapshot_at(0.0).unwrap()
    }

    #[test]
    fn zero_wall_time_returns_greedy_baseline() {
        let snap = small_snapshot();
        let loads = HashMap::new();
        let cfg = MctsConfig {
            exploration_constant: std::f64::consts::SQRT_2,
            max_hops: 10,
            congestion_threshold: 0.95,
            terminal_reward: 1.0,
            dead_end_penalty: 1.0,
        };
        let router = MctsRouter::new(&snap, &loads, cfg);
        let budget = SearchBudget { max_iterations: 100, max_wall_time_ms: Some(0), no_improvement_cap: 50 };
        let mut rng = StdRng::seed_from_u64(1);
        let src = NodeId::Ground(0);
        let dst = NodeId::Ground(1);
        let path = router.search(src, dst, budget, &mut rng, &|_| Some(0.0));
        // the greedy rollout itself may or may not reach dst depending on
        // connectivity; the important contract is that no MCTS tree search
        // was attempted (budget honored, not that a path always exists).
        if let Some(p) = path {
            assert_eq!(*p.first().unwrap(), src);
        }
    }

    #[test]
    fn search_is_deterministic_given_seed() {
        let snap = small_snapshot();
        let loads = HashMap::new();
        let cfg = MctsConfig {
            exploration_constant: std::f64::consts::SQRT_2,
            max_hops: 10,
            congestion_threshold: 0.95,
            terminal_reward: 1.0,
            dead_end_penalty: 1.0,
        };
        let router = MctsRouter::new(&snap, &loads, cfg);
        let budget = SearchBudget { max_iterations: 50, max_wall_time_ms: None, no_improvement_cap: 30 };

        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(7);
        let src = NodeId::Ground(0);
        let dst = NodeId::Ground(1);
        let p1 = router.search(src, dst, budget, &mut rng1, &|p| Some(p.len() as f64));
        let p2 = router.search(src, dst, budget, &mut rng2, &|p| Some(p.len() as f64));
        assert_eq!(p1, p2);
    }
}
