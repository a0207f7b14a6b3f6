//! The five-member error taxonomy shared by every layer of the simulator.
//!
//! `Config` and `Cancelled` are handled at the run boundary; `Backend` and
//! `StateInconsistency` propagate out of a step and abort the run;
//! `Feasibility` is caught by the admission/DSROQ layer and converted into a
//! `REJECT` decision rather than surfaced to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid or inconsistent scenario. Fatal, detected before the run starts.
    #[error("config error: {0}")]
    Config(String),

    /// The scenario file could not be read (missing, unreadable, permission
    /// denied). Distinct from `Config`, which is a parse or validation
    /// failure on a file that was read successfully.
    #[error("scenario file error: {0}")]
    ScenarioIo(String),

    /// The Topology Oracle could not materialize a requested time. Fatal for
    /// the step; the run halts and reports the failing step index.
    #[error("backend error at step {step}: {reason}")]
    Backend { step: u64, reason: String },

    /// No route within budget, or allocation fell below `b_min`. Local to a
    /// single request; always converted into a REJECT decision by the
    /// caller rather than propagated.
    #[error("feasibility error: {0}")]
    Feasibility(String),

    /// Capacity overflow, negative backlog, or a flow referencing a node
    /// absent from the current snapshot. Indicates a bug; the run aborts
    /// carrying a snapshot of the last known-good state.
    #[error("state inconsistency at step {step}: {description}")]
    StateInconsistency {
        step: u64,
        description: String,
        /// Opaque debug dump of the last good snapshot, for postmortem.
        last_good_snapshot: String,
    },

    /// The engine's cancellation token was observed at a step boundary.
    #[error("run cancelled at step {step}")]
    Cancelled { step: u64 },
}

impl SimError {
    /// Maps a taxonomy member to the CLI exit code documented for the
    /// engine's command-line driver.
    pub fn exit_code(&self) -> i32 {
        match self {
            SimError::Config(_) => 2,
            SimError::ScenarioIo(_) => 3,
            SimError::Backend { .. } => 4,
            SimError::Feasibility(_) => 1,
            SimError::StateInconsistency { .. } => 1,
            SimError::Cancelled { .. } => 5,
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        SimError::Config(msg.into())
    }

    pub fn scenario_io<S: Into<String>>(msg: S) -> Self {
        SimError::ScenarioIo(msg.into())
    }

    pub fn feasibility<S: Into<String>>(msg: S) -> Self {
        SimError::Feasibility(msg.into())
    }
}

pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_external_interface_contract() {
        assert_eq!(SimError::config("bad").exit_code(), 2);
        assert_eq!(
            SimError::Backend {
                step: 3,
                reason: "missing tle data".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(
            SimError::Cancelled { step: 10 }.exit_code(),
            5
        );
        assert_eq!(SimError::scenario_io("cannot read scenario.json").exit_code(), 3);
    }

    #[test]
    fn feasibility_error_is_local_kind() {
        let e = SimError::feasibility("no route within budget");
        assert!(matches!(e, SimError::Feasibility(_)));
    }
}
