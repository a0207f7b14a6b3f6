//! Fixed reward formula for the RL environment:
//! `r = w1·ΔQoE + w2·Jain + w3·Util + w4·Apos − w5·Viol − w6·DelayPen`

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewardWeights {
    pub w1_delta_qoe: f64,
    pub w2_jain: f64,
    pub w3_util: f64,
    pub w4_apos: f64,
    pub w5_viol: f64,
    pub w6_delay: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        RewardWeights {
            w1_delta_qoe: 1.0,
            w2_jain: 0.2,
            w3_util: 0.2,
            w4_apos: 0.3,
            w5_viol: 0.8,
            w6_delay: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RewardInputs {
    pub delta_qoe: f64,
    pub jain: f64,
    pub util: f64,
    pub apos: f64,
    pub viol: f64,
    pub delay_penalty: f64,
}

pub fn compute_reward(inputs: &RewardInputs, weights: &RewardWeights) -> f64 {
    weights.w1_delta_qoe * inputs.delta_qoe + weights.w2_jain * inputs.jain + weights.w3_util * inputs.util
        + weights.w4_apos * inputs.apos
        - weights.w5_viol * inputs.viol
        - weights.w6_delay * inputs.delay_penalty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_match_documented_defaults() {
        let w = RewardWeights::default();
        assert_eq!(w.w1_delta_qoe, 1.0);
        assert_eq!(w.w2_jain, 0.2);
        assert_eq!(w.w3_util, 0.2);
        assert_eq!(w.w4_apos, 0.3);
        assert_eq!(w.w5_viol, 0.8);
        assert_eq!(w.w6_delay, 0.3);
    }

    #[test]
    fn reward_is_zero_when_all_inputs_zero() {
        let reward = compute_reward(&RewardInputs::default(), &RewardWeights::default());
        assert_eq!(reward, 0.0);
    }

    #[test]
    fn violations_and_delay_subtract_from_reward() {
        let weights = RewardWeights::default();
        let clean = compute_reward(&RewardInputs { apos: 1.0, ..Default::default() }, &weights);
        let violating =
            compute_reward(&RewardInputs { apos: 1.0, viol: 1.0, delay_penalty: 1.0, ..Default::default() }, &weights);
        assert!(violating < clean);
    }
}
