use freeze::core::kernel::DEFAULT_CUTOFF;
use freeze::engine::config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_OVERLAP_TOLERANCE};

pub struct DefaultsConfig {
    pub max_attempts: usize,
    pub overlap_tolerance: f64,
    pub bounding_margin: f64,
    pub kernel_cutoff: f64,
    pub origin: [f64; 3],
    pub background_mean: f64,
    pub background_variance: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            overlap_tolerance: DEFAULT_OVERLAP_TOLERANCE,
            bounding_margin: 0.0,
            kernel_cutoff: DEFAULT_CUTOFF,
            origin: [0.0; 3],
            background_mean: 0.0,
            background_variance: 0.0,
        }
    }
}
