pub mod engine;

pub use engine::{
    AdmissionHook, CancellationToken, Engine, FlowCompleteHook, RerouteHook, RunOutcome, RunSummary,
    StepHook, StepMetrics,
};
