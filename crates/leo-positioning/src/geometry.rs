//! Line-of-sight geometry between a ground user and a visible satellite:
//! central angle, elevation, azimuth, and the local ENU unit vector used as
//! a row of the linearized measurement Jacobian `H`.

#[derive(Debug, Clone, Copy)]
pub struct Vec3 {
    pub e: f64,
    pub n: f64,
    pub u: f64,
}

impl Vec3 {
    pub fn dot(&self, other: &Vec3) -> f64 {
        self.e * other.e + self.n * other.n + self.u * other.u
    }
}

pub fn central_angle_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let cos_gamma = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * (lon1 - lon2).cos();
    cos_gamma.clamp(-1.0, 1.0).acos().to_degrees()
}

pub fn elevation_deg(gamma_deg: f64, earth_radius_km: f64, sat_radius_km: f64) -> f64 {
    let gamma = gamma_deg.to_radians();
    let ratio = earth_radius_km / sat_radius_km;
    (gamma.cos() - ratio).atan2(gamma.sin()).to_degrees()
}

fn azimuth_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlon = (lon2 - lon1).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    y.atan2(x).to_degrees()
}

/// Unit line-of-sight vector from a ground user to a satellite, in the
/// user's local East-North-Up frame.
pub fn line_of_sight_enu(
    user_lat_deg: f64,
    user_lon_deg: f64,
    sat_lat_deg: f64,
    sat_lon_deg: f64,
    earth_radius_km: f64,
    sat_radius_km: f64,
) -> Option<(Vec3, f64, f64)> {
    let gamma_deg = central_angle_deg(user_lat_deg, user_lon_deg, sat_lat_deg, sat_lon_deg);
    let elevation = elevation_deg(gamma_deg, earth_radius_km, sat_radius_km);
    if elevation < -90.0 || elevation > 90.0 {
        return None;
    }
    let azimuth = azimuth_deg(user_lat_deg, user_lon_deg, sat_lat_deg, sat_lon_deg);
    let el_rad = elevation.to_radians();
    let az_rad = azimuth.to_radians();
    let v = Vec3 {
        e: el_rad.cos() * az_rad.sin(),
        n: el_rad.cos() * az_rad.cos(),
        u: el_rad.sin(),
    };
    Some((v, elevation, gamma_deg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overhead_satellite_has_unit_up_component() {
        let (v, elevation, gamma) = line_of_sight_enu(0.0, 0.0, 0.0, 0.0, 6371.0, 6371.0 + 550.0).unwrap();
        assert!((elevation - 90.0).abs() < 1e-6);
        assert_eq!(gamma, 0.0);
        assert!((v.u - 1.0).abs() < 1e-9);
    }

    #[test]
    fn antipodal_point_is_below_horizon() {
        let (_, elevation, _) = line_of_sight_enu(0.0, 0.0, 0.0, 180.0, 6371.0, 6371.0 + 550.0).unwrap();
        assert!(elevation < 0.0);
    }
}
