//! RL Environment Adapter: a stateful `reset`/`step` wrapper over the
//! topology/positioning/flow/DSROQ/admission stack, for training or
//! evaluating an external admission-control policy.

pub mod env;

pub use env::{ActionSpec, Env, ObservationSpec, StepInfo, ACTION_SPACE};
pub use leo_admission::{AdmissionAction, AdmissionDecision, Observation};
