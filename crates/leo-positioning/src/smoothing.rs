//! Two-state (value + velocity) Kalman filter for smoothing noisy per-user
//! SINR/CRLB history, used only for the Observation Builder's rolling trend
//! features — never for the CRLB/GDOP/Apos decision values themselves.

#[derive(Debug, Clone, Copy)]
pub struct KalmanConfig {
    pub process_noise: f64,
    pub measurement_noise: f64,
}

impl KalmanConfig {
    pub fn for_sinr() -> Self {
        KalmanConfig { process_noise: 0.05, measurement_noise: 1.0 }
    }

    pub fn for_crlb() -> Self {
        KalmanConfig { process_noise: 0.1, measurement_noise: 4.0 }
    }
}

/// Constant-velocity Kalman filter over a single scalar quantity.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    cfg: KalmanConfig,
    x: f64,
    v: f64,
    p00: f64,
    p01: f64,
    p11: f64,
    initialized: bool,
}

impl KalmanFilter {
    pub fn new(cfg: KalmanConfig) -> Self {
        KalmanFilter {
            cfg,
            x: 0.0,
            v: 0.0,
            p00: 1.0,
            p01: 0.0,
            p11: 1.0,
            initialized: false,
        }
    }

    pub fn predict(&mut self, dt: f64) {
        if !self.initialized {
            return;
        }
        self.x += self.v * dt;
        let q = self.cfg.process_noise * dt;
        self.p00 += dt * (2.0 * self.p01 + dt * self.p11) + q;
        self.p01 += dt * self.p11;
        self.p11 += q;
    }

    pub fn update(&mut self, measurement: f64) {
        if !self.initialized {
            self.x = measurement;
            self.v = 0.0;
            self.initialized = true;
            return;
        }
        let r = self.cfg.measurement_noise;
        let innovation = measurement - self.x;
        let s = self.p00 + r;
        let k0 = self.p00 / s;
        let k1 = self.p01 / s;
        self.x += k0 * innovation;
        self.v += k1 * innovation;
        let p00_new = self.p00 - k0 * self.p00;
        let p01_new = self.p01 - k0 * self.p01;
        let p11_new = self.p11 - k1 * self.p01;
        self.p00 = p00_new;
        self.p01 = p01_new;
        self.p11 = p11_new;
    }

    pub fn value(&self) -> f64 {
        self.x
    }

    pub fn trend(&self) -> f64 {
        self.v
    }

    pub fn reset(&mut self) {
        self.x = 0.0;
        self.v = 0.0;
        self.p00 = 1.0;
        self.p01 = 0.0;
        self.p11 = 1.0;
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_seeds_the_filter() {
        let mut kf = KalmanFilter::new(KalmanConfig::for_sinr());
        kf.update(10.0);
        assert_eq!(kf.value(), 10.0);
    }

    #[test]
    fn filter_smooths_toward_steady_value() {
        let mut kf = KalmanFilter::new(KalmanConfig::for_sinr());
        for _ in 0..50 {
            kf.predict(1.0);
            kf.update(20.0);
        }
        assert!((kf.value() - 20.0).abs() < 0.5);
    }

    #[test]
    fn reset_clears_state() {
        let mut kf = KalmanFilter::new(KalmanConfig::for_crlb());
        kf.update(5.0);
        kf.reset();
        assert_eq!(kf.value(), 0.0);
    }
}
