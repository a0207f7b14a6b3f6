pub mod backend;
pub mod oracle;
pub mod simplified;
pub mod types;

pub use backend::TopologyBackend;
pub use oracle::TopologyOracle;
pub use simplified::{GroundStationSpec, SimplifiedBackend};
pub use types::{GroundStation, Link, NetworkSnapshot, NodeId, RoutingStabilityMetrics, Satellite};
