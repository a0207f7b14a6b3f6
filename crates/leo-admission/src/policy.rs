//! Admission policies as a capability set: a small `AdmissionPolicy` trait
//! plus a tagged `PolicyConfig` enum for scenario-file configuration,
//! rather than a trait-object inheritance hierarchy.

use crate::observation::Observation;
use crate::types::AdmissionDecision;
use leo_flow::QosClass;
use serde::{Deserialize, Serialize};

/// Everything a policy needs to make one admission call. Positioning
/// features are pre-normalized by the caller (the Positioning Engine /
/// Observation Builder), so policies never touch raw geometry.
pub struct PolicyContext<'a> {
    pub class: QosClass,
    pub link_utilization_mean: f64,
    pub apos: f64,
    pub crlb: f64,
    pub now_s: f64,
    pub delayed_retry_s: f64,
    pub observation: Option<&'a Observation>,
}

pub trait AdmissionPolicy: Send {
    fn choose_action(&mut self, ctx: &PolicyContext) -> AdmissionDecision;
    fn name(&self) -> &'static str;
    fn config_schema(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdParams {
    pub util_high_watermark: f64,
    pub delayed_retry_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PosAwareParams {
    pub threshold: ThresholdParams,
    pub apos_low_watermark: f64,
    pub crlb_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RlParams {
    pub delayed_retry_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    Threshold(ThresholdParams),
    PosAware(PosAwareParams),
    Rl(RlParams),
}

/// Deterministic rules on link utilization and per-class quotas: above the
/// watermark, EF delays (it cannot tolerate a degraded allocation), AF/BE
/// degrade; otherwise accept.
pub struct ThresholdPolicy {
    params: ThresholdParams,
}

impl ThresholdPolicy {
    pub fn new(params: ThresholdParams) -> Self {
        ThresholdPolicy { params }
    }
}

impl AdmissionPolicy for ThresholdPolicy {
    fn choose_action(&mut self, ctx: &PolicyContext) -> AdmissionDecision {
        if ctx.link_utilization_mean < self.params.util_high_watermark {
            return AdmissionDecision::accept("utilization below watermark");
        }
        match ctx.class {
            QosClass::Ef => AdmissionDecision::delayed(
                ctx.now_s + self.params.delayed_retry_s,
                "EF cannot degrade; delaying under high utilization",
            ),
            QosClass::Af | QosClass::Be => {
                AdmissionDecision::degraded(0.7, "degrading under high utilization")
            }
        }
    }

    fn name(&self) -> &'static str {
        "threshold"
    }

    fn config_schema(&self) -> &'static str {
        "{ util_high_watermark: f64, delayed_retry_s: f64 }"
    }
}

/// Same rules as threshold, additionally conditioned on Apos/CRLB: poor
/// positioning quality prefers DELAYED_ACCEPT (EF) or DEGRADED_ACCEPT
/// (AF/BE) even when utilization alone would have accepted.
pub struct PosAwarePolicy {
    params: PosAwareParams,
}

impl PosAwarePolicy {
    pub fn new(params: PosAwareParams) -> Self {
        PosAwarePolicy { params }
    }
}

impl AdmissionPolicy for PosAwarePolicy {
    fn choose_action(&mut self, ctx: &PolicyContext) -> AdmissionDecision {
        let low_positioning_quality = ctx.apos < self.params.apos_low_watermark || ctx.crlb > self.params.crlb_threshold;

        if low_positioning_quality {
            return match ctx.class {
                QosClass::Ef => AdmissionDecision::delayed(
                    ctx.now_s + self.params.threshold.delayed_retry_s,
                    "low positioning quality: delaying EF",
                ),
                QosClass::Af | QosClass::Be => {
                    AdmissionDecision::degraded(0.6, "low positioning quality: degrading")
                }
            };
        }

        if ctx.link_utilization_mean < self.params.threshold.util_high_watermark {
            return AdmissionDecision::accept("utilization below watermark, positioning quality acceptable");
        }

        match ctx.class {
            QosClass::Ef => AdmissionDecision::delayed(
                ctx.now_s + self.params.threshold.delayed_retry_s,
                "EF cannot degrade; delaying under high utilization",
            ),
            QosClass::Af | QosClass::Be => {
                AdmissionDecision::degraded(0.7, "degrading under high utilization")
            }
        }
    }

    fn name(&self) -> &'static str {
        "pos_aware"
    }

    fn config_schema(&self) -> &'static str {
        "{ threshold: ThresholdParams, apos_low_watermark: f64, crlb_threshold: f64 }"
    }
}

/// Consumes the Observation Builder's vector and returns a discrete action
/// from an external model; the model itself is not part of this crate, so
/// callers inject it as a boxed decision source.
pub trait ExternalActionSource: Send {
    fn decide(&mut self, observation: &Observation) -> crate::types::AdmissionAction;
}

pub struct RlPolicy {
    params: RlParams,
    source: Box<dyn ExternalActionSource>,
}

impl RlPolicy {
    pub fn new(params: RlParams, source: Box<dyn ExternalActionSource>) -> Self {
        RlPolicy { params, source }
    }
}

impl AdmissionPolicy for RlPolicy {
    fn choose_action(&mut self, ctx: &PolicyContext) -> AdmissionDecision {
        let observation = match ctx.observation {
            Some(obs) => obs,
            None => return AdmissionDecision::reject("RL policy requires an observation"),
        };
        let action = self.source.decide(observation);
        match action {
            crate::types::AdmissionAction::Accept => AdmissionDecision::accept("RL policy: accept"),
            crate::types::AdmissionAction::Reject => AdmissionDecision::reject("RL policy: reject"),
            crate::types::AdmissionAction::DegradedAccept => {
                AdmissionDecision::degraded(0.5, "RL policy: degraded accept")
            }
            crate::types::AdmissionAction::DelayedAccept => {
                AdmissionDecision::delayed(ctx.now_s + self.params.delayed_retry_s, "RL policy: delayed accept")
            }
            crate::types::AdmissionAction::PartialAccept => {
                AdmissionDecision::partial(0.5, "RL policy: partial accept")
            }
        }
    }

    fn name(&self) -> &'static str {
        "rl"
    }

    fn config_schema(&self) -> &'static str {
        "{ delayed_retry_s: f64 }"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AdmissionAction;

    fn ctx(class: QosClass, util: f64, apos: f64, crlb: f64) -> PolicyContext<'static> {
        PolicyContext {
            class,
            link_utilization_mean: util,
            apos,
            crlb,
            now_s: 100.0,
            delayed_retry_s: 5.0,
            observation: None,
        }
    }

    #[test]
    fn threshold_accepts_below_watermark() {
        let mut policy = ThresholdPolicy::new(ThresholdParams { util_high_watermark: 0.9, delayed_retry_s: 5.0 });
        let decision = policy.choose_action(&ctx(QosClass::Be, 0.5, 1.0, 0.0));
        assert_eq!(decision.action, AdmissionAction::Accept);
    }

    #[test]
    fn threshold_delays_ef_above_watermark() {
        let mut policy = ThresholdPolicy::new(ThresholdParams { util_high_watermark: 0.9, delayed_retry_s: 5.0 });
        let decision = policy.choose_action(&ctx(QosClass::Ef, 0.95, 1.0, 0.0));
        assert_eq!(decision.action, AdmissionAction::DelayedAccept);
        assert_eq!(decision.retry_at_s, Some(105.0));
    }

    #[test]
    fn threshold_degrades_be_above_watermark() {
        let mut policy = ThresholdPolicy::new(ThresholdParams { util_high_watermark: 0.9, delayed_retry_s: 5.0 });
        let decision = policy.choose_action(&ctx(QosClass::Be, 0.95, 1.0, 0.0));
        assert_eq!(decision.action, AdmissionAction::DegradedAccept);
    }

    #[test]
    fn pos_aware_delays_ef_on_low_apos_even_with_low_utilization() {
        let mut policy = PosAwarePolicy::new(PosAwareParams {
            threshold: ThresholdParams { util_high_watermark: 0.9, delayed_retry_s: 5.0 },
            apos_low_watermark: 0.5,
            crlb_threshold: 50.0,
        });
        let decision = policy.choose_action(&ctx(QosClass::Ef, 0.1, 0.2, 1.0));
        assert_eq!(decision.action, AdmissionAction::DelayedAccept);
    }

    #[test]
    fn pos_aware_accepts_when_utilization_and_positioning_both_good() {
        let mut policy = PosAwarePolicy::new(PosAwareParams {
            threshold: ThresholdParams { util_high_watermark: 0.9, delayed_retry_s: 5.0 },
            apos_low_watermark: 0.5,
            crlb_threshold: 50.0,
        });
        let decision = policy.choose_action(&ctx(QosClass::Be, 0.1, 0.9, 1.0));
        assert_eq!(decision.action, AdmissionAction::Accept);
    }

    struct AlwaysAccept;
    impl ExternalActionSource for AlwaysAccept {
        fn decide(&mut self, _observation: &Observation) -> AdmissionAction {
            AdmissionAction::Accept
        }
    }

    #[test]
    fn rl_policy_without_observation_rejects() {
        let mut policy = RlPolicy::new(RlParams { delayed_retry_s: 5.0 }, Box::new(AlwaysAccept));
        let decision = policy.choose_action(&ctx(QosClass::Ef, 0.1, 1.0, 0.0));
        assert_eq!(decision.action, AdmissionAction::Reject);
    }

    #[test]
    fn rl_policy_delegates_to_external_source() {
        let mut policy = RlPolicy::new(RlParams { delayed_retry_s: 5.0 }, Box::new(AlwaysAccept));
        let obs = Observation(vec![0.0; crate::observation::OBSERVATION_LEN]);
        let mut c = ctx(QosClass::Ef, 0.1, 1.0, 0.0);
        c.observation = Some(&obs);
        let decision = policy.choose_action(&c);
        assert_eq!(decision.action, AdmissionAction::Accept);
    }
}
