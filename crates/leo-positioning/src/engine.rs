//! Ties geometry, FIM/CRLB/GDOP, and Apos together into the per-user,
//! per-step `PositioningSample`, and exposes the Beam Hint query.

use crate::beam_hint::{select_beam_hints, BeamHintEntry};
use crate::fim::compute_crlb_gdop;
use crate::geometry::line_of_sight_enu;
use crate::sample::{apos_score, normalize_lower_is_better, PositioningSample};
use crate::smoothing::{KalmanConfig, KalmanFilter};
use leo_common::config::PositioningConfig;
use leo_topology::{NetworkSnapshot, Satellite};
use rayon::prelude::*;
use std::collections::HashMap;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy)]
pub struct UserPosition {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

/// A simplified SINR model: elevation-dependent signal quality, worse at
/// grazing angles where atmospheric path length and multipath both grow.
fn sinr_db_for_elevation(elevation_deg: f64) -> f64 {
    -2.0 + 0.35 * elevation_deg.clamp(0.0, 90.0)
}

fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

pub struct PositioningEngine {
    cfg: PositioningConfig,
    crlb_min: f64,
    crlb_max: f64,
    gdop_min: f64,
    gdop_max: f64,
    /// Per-user SINR trend state, one (mean, min) filter pair per user —
    /// not consulted for CRLB/GDOP/Apos, only for the smoothed
    /// `sinr_mean`/`sinr_min` features the Observation Builder reads.
    sinr_filters: HashMap<String, (KalmanFilter, KalmanFilter)>,
}

impl PositioningEngine {
    pub fn new(cfg: PositioningConfig) -> Self {
        PositioningEngine {
            cfg,
            crlb_min: 0.0,
            crlb_max: 1000.0,
            gdop_min: 0.0,
            gdop_max: 50.0,
            sinr_filters: HashMap::new(),
        }
    }

    fn visible_geometry(
        &self,
        user: &UserPosition,
        satellites: &[Satellite],
    ) -> Vec<(u32, crate::geometry::Vec3, f64, f64)> {
        satellites
            .iter()
            .filter_map(|sat| {
                let sat_radius_km = EARTH_RADIUS_KM + sat.alt_km;
                let (los, elevation, _gamma) = line_of_sight_enu(
                    user.lat_deg,
                    user.lon_deg,
                    sat.lat_deg,
                    sat.lon_deg,
                    EARTH_RADIUS_KM,
                    sat_radius_km,
                )?;
                if elevation < self.cfg.elevation_mask_deg {
                    return None;
                }
                let sinr_db = sinr_db_for_elevation(elevation);
                Some((sat.id, los, elevation, sinr_db))
            })
            .collect()
    }

    /// Computes one user's `PositioningSample` at the snapshot's time, then
    /// smooths its `sinr_mean`/`sinr_min` trend features through this
    /// user's Kalman filter pair.
    pub fn sample_for_user(&mut self, user_id: &str, user: &UserPosition, snapshot: &NetworkSnapshot) -> PositioningSample {
        let mut sample = self.raw_sample_for_user(user_id, user, snapshot);
        self.smooth_sinr(&mut sample);
        sample
    }

    fn smooth_sinr(&mut self, sample: &mut PositioningSample) {
        let (mean_filter, min_filter) = self
            .sinr_filters
            .entry(sample.user_id.clone())
            .or_insert_with(|| (KalmanFilter::new(KalmanConfig::for_sinr()), KalmanFilter::new(KalmanConfig::for_sinr())));
        if sample.sinr_mean.is_finite() {
            mean_filter.predict(1.0);
            mean_filter.update(sample.sinr_mean);
            sample.sinr_mean = mean_filter.value();
        }
        if sample.sinr_min.is_finite() {
            min_filter.predict(1.0);
            min_filter.update(sample.sinr_min);
            sample.sinr_min = min_filter.value();
        }
    }

    /// Computes one user's `PositioningSample` at the snapshot's time,
    /// without updating smoothing state — the pure, thread-safe half of
    /// `sample_for_user` used by `sample_many`'s parallel fan-out.
    fn raw_sample_for_user(&self, user_id: &str, user: &UserPosition, snapshot: &NetworkSnapshot) -> PositioningSample {
        let visible = self.visible_geometry(user, &snapshot.satellites);

        if visible.is_empty() {
            return PositioningSample {
                user_id: user_id.to_string(),
                t: snapshot.t,
                visible_satellites: Vec::new(),
                coop_satellites: Vec::new(),
                sinr_mean: f64::NEG_INFINITY,
                sinr_min: f64::NEG_INFINITY,
                crlb: f64::INFINITY,
                gdop: f64::INFINITY,
                crlb_norm: 0.0,
                gdop_norm: 0.0,
                apos: 0.0,
            };
        }

        let los_vectors: Vec<_> = visible.iter().map(|(_, los, _, _)| *los).collect();
        let snr_linear: Vec<_> = visible.iter().map(|(_, _, _, db)| db_to_linear(*db)).collect();
        let fim = compute_crlb_gdop(&los_vectors, &snr_linear);

        let mut by_snr = visible.clone();
        by_snr.sort_by(|a, b| b.3.partial_cmp(&a.3).unwrap_or(std::cmp::Ordering::Equal));
        let coop_count = (self.cfg.min_coop_sats as usize).max(1).min(by_snr.len());
        let coop_satellites: Vec<u32> = by_snr.iter().take(coop_count).map(|(id, ..)| *id).collect();

        let sinr_values: Vec<f64> = visible.iter().map(|(_, _, _, db)| *db).collect();
        let sinr_mean = sinr_values.iter().sum::<f64>() / sinr_values.len() as f64;
        let sinr_min = sinr_values.iter().cloned().fold(f64::MAX, f64::min);

        let visible_satellites: Vec<u32> = visible.iter().map(|(id, ..)| *id).collect();

        // Below min_visible_beams, CRLB/GDOP are not trustworthy estimates
        // (the FIM is ill-conditioned with too few independent beams) and
        // are reported as +inf regardless of what compute_crlb_gdop returned.
        let enough_beams = visible_satellites.len() >= self.cfg.min_visible_beams as usize;
        let (crlb, gdop) = if enough_beams { (fim.crlb, fim.gdop) } else { (f64::INFINITY, f64::INFINITY) };

        let apos = if enough_beams && crlb.is_finite() {
            apos_score(
                visible_satellites.len(),
                coop_satellites.len(),
                crlb,
                self.cfg.crlb_threshold,
                self.cfg.visible_beams_target,
                self.cfg.coop_sats_target,
                self.cfg.min_visible_beams,
            )
        } else {
            0.0
        };

        PositioningSample {
            user_id: user_id.to_string(),
            t: snapshot.t,
            visible_satellites,
            coop_satellites,
            sinr_mean,
            sinr_min,
            crlb,
            gdop,
            crlb_norm: normalize_lower_is_better(crlb, self.crlb_min, self.crlb_max),
            gdop_norm: normalize_lower_is_better(gdop, self.gdop_min, self.gdop_max),
            apos,
        }
    }

    /// Computes samples for many users in parallel within the step, joined
    /// before returning — the CPU-heavy per-user CRLB fan-out named in the
    /// concurrency model. Smoothing update (sequential, stateful) happens
    /// after the parallel fan-out completes.
    pub fn sample_many(
        &mut self,
        users: &[(String, UserPosition)],
        snapshot: &NetworkSnapshot,
    ) -> Vec<PositioningSample> {
        let mut samples: Vec<PositioningSample> =
            users.par_iter().map(|(id, pos)| self.raw_sample_for_user(id, pos, snapshot)).collect();
        for sample in &mut samples {
            self.smooth_sinr(sample);
        }
        samples
    }

    pub fn beam_hints_for_user(
        &self,
        user: &UserPosition,
        snapshot: &NetworkSnapshot,
        budget: usize,
    ) -> Vec<BeamHintEntry> {
        let visible = self.visible_geometry(user, &snapshot.satellites);
        if visible.is_empty() {
            return Vec::new();
        }
        let sat_ids: Vec<u32> = visible.iter().map(|(id, ..)| *id).collect();
        let los: Vec<_> = visible.iter().map(|(_, los, _, _)| *los).collect();
        let elevations: Vec<f64> = visible.iter().map(|(_, _, el, _)| *el).collect();
        let snr_linear: Vec<f64> = visible.iter().map(|(_, _, _, db)| db_to_linear(*db)).collect();

        select_beam_hints(
            &sat_ids,
            &los,
            &elevations,
            &snr_linear,
            self.cfg.elevation_mask_deg,
            db_to_linear(-1.0),
            budget,
            self.cfg.w_fim,
            self.cfg.w_snr,
            self.cfg.w_geom,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leo_topology::{GroundStationSpec, SimplifiedBackend, TopologyBackend};

    fn engine_and_snapshot() -> (PositioningEngine, NetworkSnapshot) {
        let constellation = leo_common::config::ConstellationConfig {
            altitude_km: 550.0,
            inclination_deg: 53.0,
            num_orbits: 6,
            sats_per_orbit: 11,
            isl_rate_mbps: 1000.0,
            gs_antennas: 2,
        };
        let gs = vec![GroundStationSpec { name_idx: 0, lat_deg: 39.9, lon_deg: 116.4 }];
        let backend = SimplifiedBackend::new(constellation, gs);
        let snapshot = backend.snapshot_at(0.0).unwrap();

        let cfg = PositioningConfig {
            elevation_mask_deg: 10.0,
            crlb_threshold: 50.0,
            min_visible_beams: 2,
            min_coop_sats: 2,
            beams_per_user: 3,
            w_fim: 0.5,
            w_snr: 0.3,
            w_geom: 0.2,
            visible_beams_target: 4.0,
            coop_sats_target: 3.0,
        };
        (PositioningEngine::new(cfg), snapshot)
    }

    #[test]
    fn no_visible_satellites_yields_zero_apos_and_infinite_crlb() {
        let (mut engine, mut snapshot) = engine_and_snapshot();
        snapshot.satellites.clear();
        let sample = engine.sample_for_user("usr_test", &UserPosition { lat_deg: 39.9, lon_deg: 116.4 }, &snapshot);
        assert_eq!(sample.apos, 0.0);
        assert_eq!(sample.crlb, f64::INFINITY);
    }

    #[test]
    fn below_min_visible_beams_forces_infinite_crlb_gdop_despite_visible_satellites() {
        let (mut engine, snapshot) = engine_and_snapshot();
        assert!(
            !snapshot.satellites.is_empty(),
            "fixture must have satellites visible for this test to be meaningful"
        );
        engine.cfg.min_visible_beams = u32::MAX;
        let sample = engine.sample_for_user("usr_test", &UserPosition { lat_deg: 39.9, lon_deg: 116.4 }, &snapshot);
        assert!(!sample.visible_satellites.is_empty());
        assert_eq!(sample.crlb, f64::INFINITY);
        assert_eq!(sample.gdop, f64::INFINITY);
        assert_eq!(sample.apos, 0.0);
    }

    #[test]
    fn apos_is_bounded() {
        let (mut engine, snapshot) = engine_and_snapshot();
        let sample = engine.sample_for_user("usr_test", &UserPosition { lat_deg: 39.9, lon_deg: 116.4 }, &snapshot);
        assert!((0.0..=1.0).contains(&sample.apos));
    }

    #[test]
    fn sample_many_preserves_order_and_count() {
        let (mut engine, snapshot) = engine_and_snapshot();
        let users = vec![
            ("usr_a".to_string(), UserPosition { lat_deg: 39.9, lon_deg: 116.4 }),
            ("usr_b".to_string(), UserPosition { lat_deg: 40.7, lon_deg: -74.0 }),
        ];
        let samples = engine.sample_many(&users, &snapshot);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].user_id, "usr_a");
        assert_eq!(samples[1].user_id, "usr_b");
    }

    #[test]
    fn sinr_trend_is_smoothed_across_calls_not_passed_through_raw() {
        let (mut engine, _snapshot) = engine_and_snapshot();
        let mut sample = PositioningSample {
            user_id: "usr_trend".to_string(),
            t: 0.0,
            visible_satellites: vec![1, 2, 3],
            coop_satellites: vec![1],
            sinr_mean: 0.0,
            sinr_min: -2.0,
            crlb: 1.0,
            gdop: 1.0,
            crlb_norm: 1.0,
            gdop_norm: 1.0,
            apos: 1.0,
        };
        engine.smooth_sinr(&mut sample);
        assert_eq!(sample.sinr_mean, 0.0, "first measurement seeds the filter exactly");

        let mut next = sample.clone();
        next.sinr_mean = 20.0;
        next.sinr_min = 18.0;
        engine.smooth_sinr(&mut next);
        assert!(
            next.sinr_mean > 0.0 && next.sinr_mean < 20.0,
            "smoothed value should lag behind the new raw measurement, got {}",
            next.sinr_mean
        );
    }

    #[test]
    fn beam_hints_respect_budget() {
        let (engine, snapshot) = engine_and_snapshot();
        let hints = engine.beam_hints_for_user(&UserPosition { lat_deg: 39.9, lon_deg: 116.4 }, &snapshot, 3);
        assert!(hints.len() <= 3);
    }
}
