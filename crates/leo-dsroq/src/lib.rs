pub mod allocator;
pub mod cost;
pub mod engine;
pub mod lyapunov;
pub mod mcts;

pub use cost::PathCostWeights;
pub use engine::{DsroqConfig, DsroqEngine, PositioningContext, RouteDecision};
pub use lyapunov::{FlowQoeSample, LyapunovConfig, LyapunovScheduler};
pub use mcts::{MctsConfig, SearchBudget};
