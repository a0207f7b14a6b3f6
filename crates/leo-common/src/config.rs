//! Scenario file loading and validation.
//!
//! Accepts JSON or TOML, dispatching on file extension — the two
//! structured-document formats already present in the workspace dependency
//! table. A `.yaml`/`.yml` extension is a documented config error rather
//! than a silent guess.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The six-field reward-weight struct from Design Note §9: exactly these
/// fields, no more, no fewer — `#[serde(deny_unknown_fields)]` enforces
/// that unknown keys fail validation rather than being silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewardWeights {
    pub w_qoe: f64,
    pub w_fairness: f64,
    pub w_util: f64,
    pub w_apos: f64,
    pub w_viol: f64,
    pub w_delay: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        RewardWeights {
            w_qoe: 1.0,
            w_fairness: 0.2,
            w_util: 0.2,
            w_apos: 0.3,
            w_viol: 0.8,
            w_delay: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstellationConfig {
    pub altitude_km: f64,
    pub inclination_deg: f64,
    pub num_orbits: u32,
    pub sats_per_orbit: u32,
    pub isl_rate_mbps: f64,
    pub gs_antennas: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    Mcts,
    Greedy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    Toml,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub end_time_s: f64,
    pub step_ms: u64,
    pub routing: RoutingMode,
    #[serde(default)]
    pub detailed_logging: bool,
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundStationConfig {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMix {
    pub ef: f64,
    pub af: f64,
    pub be: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArrivalModel {
    PoissonRate { rate: f64 },
    Sinusoidal { base: f64, amplitude: f64, period: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficConfig {
    pub arrival: ArrivalModel,
    pub class_mix: ClassMix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicyKind {
    Threshold,
    PosAware,
    Rl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    pub policy: AdmissionPolicyKind,
    #[serde(default)]
    pub reward_weights: RewardWeights,
    #[serde(default = "default_util_high_watermark")]
    pub util_high_watermark: f64,
    #[serde(default = "default_delay_s")]
    pub delayed_retry_s: f64,
}

fn default_util_high_watermark() -> f64 {
    0.9
}

fn default_delay_s() -> f64 {
    5.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DsroqConfig {
    pub alpha: f64,
    pub kappa_seam: f64,
    pub kappa_chg: f64,
    pub lambda_pos: f64,
    pub reroute_cooldown_ms: u64,
    pub mcts_iters: u32,
    pub mcts_wall_ms: u64,
    pub queue_backlog_limit: f64,
    #[serde(default = "default_exploration_constant")]
    pub exploration_constant: f64,
    #[serde(default = "default_no_improvement_cap")]
    pub no_improvement_cap: u32,
    #[serde(default = "default_lyapunov_v")]
    pub lyapunov_v: f64,
}

fn default_exploration_constant() -> f64 {
    std::f64::consts::SQRT_2
}

fn default_no_improvement_cap() -> u32 {
    50
}

fn default_lyapunov_v() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositioningConfig {
    pub elevation_mask_deg: f64,
    pub crlb_threshold: f64,
    pub min_visible_beams: u32,
    pub min_coop_sats: u32,
    pub beams_per_user: u32,
    pub w_fim: f64,
    pub w_snr: f64,
    pub w_geom: f64,
    #[serde(default = "default_visible_beams_target")]
    pub visible_beams_target: f64,
    #[serde(default = "default_coop_sats_target")]
    pub coop_sats_target: f64,
}

fn default_visible_beams_target() -> f64 {
    4.0
}

fn default_coop_sats_target() -> f64 {
    3.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    Real,
    Simplified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub hypatia_mode: BackendMode,
    pub ns3_mode: BackendMode,
    #[serde(default)]
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub constellation: ConstellationConfig,
    pub simulation: SimulationConfig,
    pub ground_stations: Vec<GroundStationConfig>,
    pub traffic: TrafficConfig,
    pub admission: AdmissionConfig,
    pub dsroq: DsroqConfig,
    pub positioning: PositioningConfig,
    pub backend: BackendConfig,
}

impl ScenarioConfig {
    /// Loads and validates a scenario document. The format is chosen by
    /// file extension; `.json` and `.toml` are supported.
    pub fn load(path: &Path) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SimError::scenario_io(format!("cannot read {}: {e}", path.display())))?;
        let cfg = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<ScenarioConfig>(&text)
                .map_err(|e| SimError::config(format!("invalid JSON scenario: {e}")))?,
            Some("toml") => toml::from_str::<ScenarioConfig>(&text)
                .map_err(|e| SimError::config(format!("invalid TOML scenario: {e}")))?,
            Some(other) => {
                return Err(SimError::config(format!(
                    "unsupported scenario format '.{other}'; use .json or .toml"
                )))
            }
            None => {
                return Err(SimError::config(
                    "scenario file has no extension; use .json or .toml",
                ))
            }
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> SimResult<()> {
        let mix_sum = self.traffic.class_mix.ef + self.traffic.class_mix.af + self.traffic.class_mix.be;
        if (mix_sum - 1.0).abs() > 1e-6 {
            return Err(SimError::config(format!(
                "traffic.class_mix must sum to 1.0, got {mix_sum}"
            )));
        }
        if self.simulation.step_ms == 0 {
            return Err(SimError::config("simulation.step_ms must be > 0"));
        }
        if self.simulation.end_time_s <= 0.0 {
            return Err(SimError::config("simulation.end_time_s must be > 0"));
        }
        if self.constellation.num_orbits == 0 || self.constellation.sats_per_orbit == 0 {
            return Err(SimError::config(
                "constellation must have at least one orbit and one satellite per orbit",
            ));
        }
        if self.dsroq.mcts_iters == 0 && self.dsroq.mcts_wall_ms == 0 {
            return Err(SimError::config(
                "dsroq must have a nonzero mcts_iters or mcts_wall_ms search budget",
            ));
        }
        let w = &self.admission.reward_weights;
        for (name, v) in [
            ("w_qoe", w.w_qoe),
            ("w_fairness", w.w_fairness),
            ("w_util", w.w_util),
            ("w_apos", w.w_apos),
            ("w_viol", w.w_viol),
            ("w_delay", w.w_delay),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(SimError::config(format!(
                    "reward weight {name} must be a non-negative finite value, got {v}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_json() -> &'static str {
        r#"{
            "constellation": {"altitude_km": 550.0, "inclination_deg": 53.0, "num_orbits": 6, "sats_per_orbit": 11, "isl_rate_mbps": 1000.0, "gs_antennas": 2},
            "simulation": {"end_time_s": 60.0, "step_ms": 1000, "routing": "mcts", "output_format": "json"},
            "ground_stations": [{"name": "beijing", "lat": 39.9, "lon": 116.4}],
            "traffic": {"arrival": {"kind": "poisson_rate", "rate": 2.0}, "class_mix": {"ef": 0.3, "af": 0.3, "be": 0.4}},
            "admission": {"policy": "threshold"},
            "dsroq": {"alpha": 1.0, "kappa_seam": 0.5, "kappa_chg": 0.2, "lambda_pos": 0.3, "reroute_cooldown_ms": 5000, "mcts_iters": 200, "mcts_wall_ms": 50, "queue_backlog_limit": 1000.0},
            "positioning": {"elevation_mask_deg": 10.0, "crlb_threshold": 50.0, "min_visible_beams": 2, "min_coop_sats": 2, "beams_per_user": 3, "w_fim": 0.5, "w_snr": 0.3, "w_geom": 0.2},
            "backend": {"hypatia_mode": "simplified", "ns3_mode": "simplified"}
        }"#
    }

    #[test]
    fn valid_scenario_parses_and_validates() {
        let cfg: ScenarioConfig = serde_json::from_str(valid_json()).unwrap();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn class_mix_not_summing_to_one_is_config_error() {
        let mut cfg: ScenarioConfig = serde_json::from_str(valid_json()).unwrap();
        cfg.traffic.class_mix.be = 0.9;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn unknown_reward_weight_key_fails_deserialization() {
        let bad = r#"{"w_qoe": 1.0, "w_fairness": 0.2, "w_util": 0.2, "w_apos": 0.3, "w_viol": 0.8, "w_delay": 0.3, "w_extra": 1.0}"#;
        let result: Result<RewardWeights, _> = serde_json::from_str(bad);
        assert!(result.is_err());
    }

    #[test]
    fn unsupported_extension_is_config_error() {
        let dir = std::env::temp_dir().join(format!("leo-sim-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scenario.yaml");
        std::fs::write(&path, "constellation: {}").unwrap();
        let err = ScenarioConfig::load(&path).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
