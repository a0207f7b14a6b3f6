pub mod observation;
pub mod policy;
pub mod reward;
pub mod types;

pub use observation::{build_observation, Observation, ObservationInputs, OBSERVATION_LEN};
pub use policy::{AdmissionPolicy, PolicyConfig, PolicyContext, PosAwarePolicy, RlPolicy, ThresholdPolicy};
pub use reward::{compute_reward, RewardInputs, RewardWeights};
pub use types::{degrade_request, partial_request, AdmissionAction, AdmissionDecision, AdmissionStats};
