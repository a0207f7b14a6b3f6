pub mod arrivals;
pub mod state;
pub mod types;

pub use arrivals::{ArrivalProcess, EndpointSpec};
pub use state::FlowQueueState;
pub use types::{AllocationResult, Flow, FlowRequest, FlowStatus, QosClass};
