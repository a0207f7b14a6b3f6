//! Simplified back-end: satellites placed on ideal circular Walker orbits.
//!
//! Positions are analytic functions of simulated time — no RNG is involved,
//! so two runs with the same constellation config produce byte-identical
//! geometry. The faithful mode (real TLE/ISL/GSL data) is the other half of
//! the `TopologyBackend` contract and is out of scope here; this is the only
//! implementation this workspace ships.

use crate::backend::TopologyBackend;
use crate::types::{GroundStation, Link, NetworkSnapshot, NodeId, RoutingStabilityMetrics, Satellite};
use leo_common::config::ConstellationConfig;
use leo_common::error::SimResult;
use std::collections::HashMap;

const EARTH_RADIUS_KM: f64 = 6371.0;
const EARTH_MU_KM3_S2: f64 = 398_600.4418;
const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundStationSpec {
    pub name_idx: u32,
    pub lat_deg: f64,
    pub lon_deg: f64,
}

pub struct SimplifiedBackend {
    constellation: ConstellationConfig,
    ground_stations: Vec<GroundStationSpec>,
    orbit_radius_km: f64,
    period_s: f64,
    /// Epoch before which snapshots are "warming up" (empty), as documented
    /// in the Oracle's edge policies.
    epoch_s: f64,
}

impl SimplifiedBackend {
    pub fn new(constellation: ConstellationConfig, ground_stations: Vec<GroundStationSpec>) -> Self {
        let orbit_radius_km = EARTH_RADIUS_KM + constellation.altitude_km;
        let period_s = 2.0 * std::f64::consts::PI * (orbit_radius_km.powi(3) / EARTH_MU_KM3_S2).sqrt();
        SimplifiedBackend {
            constellation,
            ground_stations,
            orbit_radius_km,
            period_s,
            epoch_s: 0.0,
        }
    }

    fn satellite_angle(&self, orbit_idx: u32, slot_idx: u32, t: f64) -> f64 {
        let sats_per_orbit = self.constellation.sats_per_orbit as f64;
        let num_orbits = self.constellation.num_orbits as f64;
        let omega = 2.0 * std::f64::consts::PI / self.period_s;
        let in_plane_phase = 2.0 * std::f64::consts::PI * (slot_idx as f64) / sats_per_orbit;
        // Walker-delta style phase offset between adjacent planes (F = 1).
        let inter_plane_phase = 2.0 * std::f64::consts::PI * (orbit_idx as f64) / (sats_per_orbit * num_orbits);
        in_plane_phase + inter_plane_phase + omega * t
    }

    fn raan(&self, orbit_idx: u32) -> f64 {
        2.0 * std::f64::consts::PI * (orbit_idx as f64) / self.constellation.num_orbits as f64
    }

    /// Sub-satellite latitude/longitude for the given orbit slot at time `t`,
    /// treating longitude in an Earth-fixed-ignoring-rotation frame (a
    /// deterministic simplification acceptable for an idealized backend).
    fn satellite_lat_lon(&self, orbit_idx: u32, slot_idx: u32, t: f64) -> (f64, f64) {
        let inclination = self.constellation.inclination_deg.to_radians();
        let theta = self.satellite_angle(orbit_idx, slot_idx, t);
        let raan = self.raan(orbit_idx);
        let lat = (inclination.sin() * theta.sin()).asin();
        let lon = raan + (inclination.cos() * theta.sin()).atan2(theta.cos());
        (lat.to_degrees(), normalize_lon_deg(lon.to_degrees()))
    }

    fn satellites_at(&self, t: f64) -> Vec<(Satellite, f64, f64)> {
        let mut out = Vec::new();
        let num_orbits = self.constellation.num_orbits;
        let sats_per_orbit = self.constellation.sats_per_orbit;
        for orbit_idx in 0..num_orbits {
            for slot_idx in 0..sats_per_orbit {
                let id = orbit_idx * sats_per_orbit + slot_idx;
                let (lat_deg, lon_deg) = self.satellite_lat_lon(orbit_idx, slot_idx, t);
                let theta = self.satellite_angle(orbit_idx, slot_idx, t);
                out.push((
                    Satellite {
                        id,
                        orbit_idx,
                        slot_idx,
                        lat_deg,
                        lon_deg,
                        alt_km: self.constellation.altitude_km,
                        spare_capacity: 1.0,
                    },
                    lat_deg,
                    lon_deg,
                ));
                let _ = theta;
            }
        }
        out
    }

    fn isl_links(&self, sats: &[(Satellite, f64, f64)]) -> Vec<Link> {
        let num_orbits = self.constellation.num_orbits;
        let sats_per_orbit = self.constellation.sats_per_orbit;
        let capacity_bps = self.constellation.isl_rate_mbps * 1e6;
        let mut links = Vec::new();

        let in_plane_angle = 2.0 * std::f64::consts::PI / sats_per_orbit as f64;
        let in_plane_dist_km = 2.0 * self.orbit_radius_km * (in_plane_angle / 2.0).sin();
        let in_plane_latency_s = in_plane_dist_km / SPEED_OF_LIGHT_KM_S;

        // One in-plane ring edge per slot, wrapping last slot back to slot 0.
        if sats_per_orbit > 1 {
            for orbit_idx in 0..num_orbits {
                for slot_idx in 0..sats_per_orbit {
                    let id = orbit_idx * sats_per_orbit + slot_idx;
                    let next_slot = (slot_idx + 1) % sats_per_orbit;
                    let next_id = orbit_idx * sats_per_orbit + next_slot;
                    links.push(Link {
                        a: NodeId::Sat(id),
                        b: NodeId::Sat(next_id),
                        capacity_bps,
                        current_load_bps: 0.0,
                        propagation_latency_s: in_plane_latency_s,
                        active: true,
                        seam: false,
                    });
                }
            }
        }

        if num_orbits > 1 {
            for orbit_idx in 0..num_orbits {
                let next_orbit = (orbit_idx + 1) % num_orbits;
                let is_seam = next_orbit < orbit_idx || (orbit_idx == num_orbits - 1);
                for slot_idx in 0..sats_per_orbit {
                    let id = orbit_idx * sats_per_orbit + slot_idx;
                    let next_id = next_orbit * sats_per_orbit + slot_idx;
                    let (_, lat_a, lon_a) = sats[id as usize];
                    let (_, lat_b, lon_b) = sats[next_id as usize];
                    let gamma = central_angle_deg(lat_a, lon_a, lat_b, lon_b).to_radians();
                    let dist_km = 2.0 * self.orbit_radius_km * (gamma / 2.0).sin();
                    links.push(Link {
                        a: NodeId::Sat(id.min(next_id)),
                        b: NodeId::Sat(id.max(next_id)),
                        capacity_bps,
                        current_load_bps: 0.0,
                        propagation_latency_s: dist_km.abs() / SPEED_OF_LIGHT_KM_S,
                        active: true,
                        seam: is_seam,
                    });
                }
            }
        }

        links
    }

    fn gsl_links_and_visibility(
        &self,
        sats: &[(Satellite, f64, f64)],
    ) -> (Vec<Link>, HashMap<u32, Vec<u32>>) {
        let capacity_bps = self.constellation.isl_rate_mbps * 1e6;
        let elevation_mask_deg = 10.0;
        let mut links = Vec::new();
        let mut visibility: HashMap<u32, Vec<u32>> = HashMap::new();

        for gs in &self.ground_stations {
            let mut visible = Vec::new();
            for (sat, lat, lon) in sats {
                let gamma_deg = central_angle_deg(gs.lat_deg, gs.lon_deg, *lat, *lon);
                let elevation_deg = elevation_angle_deg(gamma_deg, EARTH_RADIUS_KM, self.orbit_radius_km);
                if elevation_deg >= elevation_mask_deg {
                    visible.push(sat.id);
                    let gamma = gamma_deg.to_radians();
                    let slant_km = (EARTH_RADIUS_KM.powi(2) + self.orbit_radius_km.powi(2)
                        - 2.0 * EARTH_RADIUS_KM * self.orbit_radius_km * gamma.cos())
                    .sqrt();
                    links.push(Link {
                        a: NodeId::Ground(gs.name_idx),
                        b: NodeId::Sat(sat.id),
                        capacity_bps,
                        current_load_bps: 0.0,
                        propagation_latency_s: slant_km / SPEED_OF_LIGHT_KM_S,
                        active: true,
                        seam: false,
                    });
                }
            }
            visibility.insert(gs.name_idx, visible);
        }

        (links, visibility)
    }
}

fn normalize_lon_deg(lon: f64) -> f64 {
    let mut l = lon % 360.0;
    if l > 180.0 {
        l -= 360.0;
    }
    if l < -180.0 {
        l += 360.0;
    }
    l
}

fn central_angle_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let cos_gamma = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * (lon1 - lon2).cos();
    cos_gamma.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Elevation angle of a satellite above a ground station's local horizon,
/// given the geocentric central angle between them.
fn elevation_angle_deg(central_angle_deg: f64, earth_radius_km: f64, sat_radius_km: f64) -> f64 {
    let gamma = central_angle_deg.to_radians();
    let ratio = earth_radius_km / sat_radius_km;
    (gamma.cos() - ratio).atan2(gamma.sin()).to_degrees()
}

impl TopologyBackend for SimplifiedBackend {
    fn snapshot_at(&self, t: f64) -> SimResult<NetworkSnapshot> {
        if t < self.epoch_s {
            return Ok(NetworkSnapshot::empty_warming_up(t));
        }
        let sats = self.satellites_at(t);
        let satellites: Vec<Satellite> = sats.iter().map(|(s, _, _)| *s).collect();
        let ground_stations: Vec<GroundStation> = self
            .ground_stations
            .iter()
            .map(|gs| GroundStation {
                id: gs.name_idx,
                name: format!("gs{}", gs.name_idx),
                lat_deg: gs.lat_deg,
                lon_deg: gs.lon_deg,
            })
            .collect();

        let mut links = self.isl_links(&sats);
        let (gsl, visibility) = self.gsl_links_and_visibility(&sats);
        links.extend(gsl);

        Ok(NetworkSnapshot {
            t,
            warming_up: false,
            satellites,
            ground_stations,
            links,
            visibility,
        })
    }

    fn link_capacity(&self, t: f64) -> SimResult<HashMap<(NodeId, NodeId), f64>> {
        let snap = self.snapshot_at(t)?;
        Ok(snap.links.iter().map(|l| (l.key(), l.capacity_bps)).collect())
    }

    fn orbit_phase(&self, t: f64) -> f64 {
        let phase = (t.max(0.0) % self.period_s) / self.period_s;
        phase.clamp(0.0, 1.0)
    }

    fn topology_change_rate(&self, t: f64, delta_s: f64) -> SimResult<f64> {
        if t - delta_s < self.epoch_s {
            return Ok(0.0);
        }
        let before = self.snapshot_at(t - delta_s)?;
        let after = self.snapshot_at(t)?;
        let before_keys: std::collections::HashSet<_> =
            before.links.iter().filter(|l| l.active).map(|l| l.key()).collect();
        let after_keys: std::collections::HashSet<_> =
            after.links.iter().filter(|l| l.active).map(|l| l.key()).collect();
        let changed = before_keys.symmetric_difference(&after_keys).count();
        let total = before_keys.len().max(after_keys.len()).max(1);
        Ok(changed as f64 / total as f64)
    }

    fn predict_future_capacity(&self, t: f64, horizon_s: f64) -> SimResult<f64> {
        let snap = self.snapshot_at(t + horizon_s)?;
        Ok(snap.links.iter().filter(|l| l.active).map(|l| l.capacity_bps).sum())
    }

    fn routing_stability_metrics(&self, t: f64) -> SimResult<RoutingStabilityMetrics> {
        const WINDOW_S: f64 = 60.0;
        const SAMPLES: usize = 6;
        let step = WINDOW_S / SAMPLES as f64;

        let mut handovers = 0u32;
        let mut earliest_handover_s = WINDOW_S;
        let mut found_handover = false;
        let mut prev_visibility = self.snapshot_at(t)?.visibility;

        for i in 1..=SAMPLES {
            let sample_t = t + step * i as f64;
            let snap = self.snapshot_at(sample_t)?;
            for (gs, visible_now) in &snap.visibility {
                let visible_before = prev_visibility.get(gs).cloned().unwrap_or_default();
                if visible_before.first() != visible_now.first() {
                    handovers += 1;
                    if !found_handover {
                        earliest_handover_s = step * i as f64;
                        found_handover = true;
                    }
                }
            }
            prev_visibility = snap.visibility;
        }

        let current = self.snapshot_at(t)?;
        let seam_risk = current.links.iter().any(|l| l.seam && l.active);
        let contact_margin_s = if found_handover {
            earliest_handover_s
        } else {
            WINDOW_S
        };

        Ok(RoutingStabilityMetrics {
            predicted_handover_count: handovers,
            earliest_handover_s,
            seam_risk,
            contact_margin_s,
        })
    }
}

impl SimplifiedBackend {
    pub fn with_epoch(mut self, epoch_s: f64) -> Self {
        self.epoch_s = epoch_s;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_constellation() -> ConstellationConfig {
        ConstellationConfig {
            altitude_km: 550.0,
            inclination_deg: 53.0,
            num_orbits: 6,
            sats_per_orbit: 11,
            isl_rate_mbps: 1000.0,
            gs_antennas: 2,
        }
    }

    fn beijing_and_ny() -> Vec<GroundStationSpec> {
        vec![
            GroundStationSpec { name_idx: 0, lat_deg: 39.9, lon_deg: 116.4 },
            GroundStationSpec { name_idx: 1, lat_deg: 40.7, lon_deg: -74.0 },
        ]
    }

    #[test]
    fn snapshot_is_deterministic_for_time() {
        let backend = SimplifiedBackend::new(small_constellation(), beijing_and_ny());
        let a = backend.snapshot_at(100.0).unwrap();
        let b = backend.snapshot_at(100.0).unwrap();
        assert_eq!(a.satellites.len(), b.satellites.len());
        for (sa, sb) in a.satellites.iter().zip(b.satellites.iter()) {
            assert_eq!(sa.lat_deg, sb.lat_deg);
            assert_eq!(sa.lon_deg, sb.lon_deg);
        }
        assert_eq!(a.links.len(), b.links.len());
    }

    #[test]
    fn before_epoch_is_warming_up_and_empty() {
        let backend = SimplifiedBackend::new(small_constellation(), beijing_and_ny()).with_epoch(10.0);
        let snap = backend.snapshot_at(5.0).unwrap();
        assert!(snap.warming_up);
        assert!(snap.satellites.is_empty());
        assert!(snap.links.is_empty());
    }

    #[test]
    fn all_satellites_present_with_correct_count() {
        let cfg = small_constellation();
        let backend = SimplifiedBackend::new(cfg.clone(), beijing_and_ny());
        let snap = backend.snapshot_at(0.0).unwrap();
        assert_eq!(snap.satellites.len(), (cfg.num_orbits * cfg.sats_per_orbit) as usize);
    }

    #[test]
    fn orbit_phase_is_within_unit_interval() {
        let backend = SimplifiedBackend::new(small_constellation(), beijing_and_ny());
        for t in [0.0, 1234.5, 99999.9] {
            let phase = backend.orbit_phase(t);
            assert!((0.0..1.0).contains(&phase), "phase {phase} out of range for t={t}");
        }
    }

    #[test]
    fn ground_station_with_no_visibility_has_empty_set_not_error() {
        let cfg = ConstellationConfig {
            altitude_km: 550.0,
            inclination_deg: 5.0,
            num_orbits: 2,
            sats_per_orbit: 2,
            isl_rate_mbps: 1000.0,
            gs_antennas: 1,
        };
        let far_pole = vec![GroundStationSpec { name_idx: 0, lat_deg: 89.9, lon_deg: 0.0 }];
        let backend = SimplifiedBackend::new(cfg, far_pole);
        let snap = backend.snapshot_at(0.0).unwrap();
        assert!(snap.visibility.contains_key(&0));
    }

    #[test]
    fn isl_links_form_a_complete_in_plane_ring() {
        // num_orbits = 1 so the cross-plane pass is skipped and isl_links
        // returns only the in-plane ring: one edge per slot.
        let cfg = ConstellationConfig {
            altitude_km: 550.0,
            inclination_deg: 53.0,
            num_orbits: 1,
            sats_per_orbit: 11,
            isl_rate_mbps: 1000.0,
            gs_antennas: 2,
        };
        let backend = SimplifiedBackend::new(cfg.clone(), beijing_and_ny());
        let sats = backend.satellites_at(0.0);
        let links = backend.isl_links(&sats);
        assert_eq!(links.len(), cfg.sats_per_orbit as usize);

        let mut neighbor_count = vec![0u32; cfg.sats_per_orbit as usize];
        for link in &links {
            if let (NodeId::Sat(a), NodeId::Sat(b)) = (link.a, link.b) {
                neighbor_count[a as usize] += 1;
                neighbor_count[b as usize] += 1;
            }
        }
        assert!(neighbor_count.iter().all(|&n| n == 2), "every satellite should have exactly two in-plane neighbors");
    }

    #[test]
    fn link_capacity_never_negative_and_matches_isl_rate() {
        let cfg = small_constellation();
        let backend = SimplifiedBackend::new(cfg.clone(), beijing_and_ny());
        let caps = backend.link_capacity(0.0).unwrap();
        for cap in caps.values() {
            assert!(*cap > 0.0);
            assert_eq!(*cap, cfg.isl_rate_mbps * 1e6);
        }
    }

    #[test]
    fn topology_change_rate_is_zero_for_static_window_before_epoch() {
        let backend = SimplifiedBackend::new(small_constellation(), beijing_and_ny()).with_epoch(1000.0);
        let rate = backend.topology_change_rate(1.0, 1.0).unwrap();
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn predict_future_capacity_is_nonnegative() {
        let backend = SimplifiedBackend::new(small_constellation(), beijing_and_ny());
        let cap = backend.predict_future_capacity(0.0, 30.0).unwrap();
        assert!(cap >= 0.0);
    }

    #[test]
    fn routing_stability_metrics_reports_seam_risk_when_seam_link_active() {
        let backend = SimplifiedBackend::new(small_constellation(), beijing_and_ny());
        let metrics = backend.routing_stability_metrics(0.0).unwrap();
        assert!(metrics.contact_margin_s >= 0.0);
        assert!(metrics.earliest_handover_s >= 0.0);
        let _ = metrics.seam_risk;
    }
}
