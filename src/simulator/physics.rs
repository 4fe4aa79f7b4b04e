use rand::Rng;

/// Thermal inertia of the simulated incubator. Each step covers
/// `1 - DAMPING` of the remaining distance to the setpoint.
pub const DAMPING: f64 = 0.8;

/// Peak-to-peak width of the measurement noise on published temperatures.
pub const TEMPERATURE_NOISE: f64 = 0.2;

/// Wells on a standard microplate.
pub const WELLS: usize = 96;

pub fn low_pass(current: f64, setpoint: f64, damping: f64) -> f64 {
    damping * current + (1.0 - damping) * setpoint
}

/// Superimpose uniform noise in `[-amplitude / 2, amplitude / 2)` on `value`.
pub fn add_noise<R: Rng + ?Sized>(rng: &mut R, value: f64, amplitude: f64) -> f64 {
    value + amplitude * (rng.gen::<f64>() - 0.5)
}

/// One plate read: well `i` reports `i²` plus independent noise in `[-0.5, 0.5)`.
pub fn luminescence_readings<R: Rng + ?Sized>(rng: &mut R) -> Vec<f64> {
    (0..WELLS)
        .map(|i| add_noise(rng, (i * i) as f64, 1.0))
        .collect()
}
