use crate::error::ConfigError;
use std::sync::OnceLock;

const PAR_THRESHOLD_DEFAULT: usize = 256;

/// Population size below which phases run on the calling thread instead of
/// being fanned out to the pool.
pub(crate) fn parallel_threshold() -> usize {
    static THRESHOLD: OnceLock<usize> = OnceLock::new();
    *THRESHOLD.get_or_init(|| env_usize("SIM_PAR_THRESHOLD").unwrap_or(PAR_THRESHOLD_DEFAULT))
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldParams {
    pub width: f64,
    pub height: f64,
    pub cell_size: f64,
    pub substeps: usize,
    pub workers: Option<usize>,
    pub boundary_restitution: f64,
    pub rest_speed_threshold: f64,
    pub rest_repulsion: f64,
    pub envelope_factor: f64,
    pub fragment_count: usize,
    pub fragment_speed: f64,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
            cell_size: 10.0,
            substeps: 4,
            workers: None,
            boundary_restitution: 0.8,
            rest_speed_threshold: 0.05,
            rest_repulsion: 0.02,
            envelope_factor: 4.0,
            fragment_count: 10,
            fragment_speed: 1.0,
        }
    }
}

impl WorldParams {
    pub fn new(width: f64, height: f64, cell_size: f64) -> Self {
        Self {
            width,
            height,
            cell_size,
            ..Self::default()
        }
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(workers) = env_usize("SIM_WORKERS") {
            self.workers = Some(workers);
        }
        if let Some(substeps) = env_usize("SIM_SUBSTEPS") {
            self.substeps = substeps;
        }
        self
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let dims_ok = |v: f64| v.is_finite() && v > 0.0;
        if !dims_ok(self.width) || !dims_ok(self.height) {
            return Err(ConfigError::Dimensions {
                width: self.width,
                height: self.height,
            });
        }
        if !dims_ok(self.cell_size) {
            return Err(ConfigError::CellSize(self.cell_size));
        }
        if self.substeps == 0 {
            return Err(ConfigError::Substeps);
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Workers);
        }
        if !(0.0..=1.0).contains(&self.boundary_restitution) {
            return Err(ConfigError::Restitution(self.boundary_restitution));
        }
        for (name, value) in [
            ("rest_speed_threshold", self.rest_speed_threshold),
            ("rest_repulsion", self.rest_repulsion),
            ("envelope_factor", self.envelope_factor),
            ("fragment_speed", self.fragment_speed),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        assert_eq!(WorldParams::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_positive_cell_size() {
        let params = WorldParams::new(100.0, 100.0, 0.0);
        assert_eq!(params.validate(), Err(ConfigError::CellSize(0.0)));
        let params = WorldParams::new(100.0, 100.0, -3.0);
        assert_eq!(params.validate(), Err(ConfigError::CellSize(-3.0)));
    }

    #[test]
    fn rejects_bad_dimensions_and_substeps() {
        let params = WorldParams::new(0.0, 50.0, 5.0);
        assert!(matches!(params.validate(), Err(ConfigError::Dimensions { .. })));
        let params = WorldParams {
            substeps: 0,
            ..WorldParams::default()
        };
        assert_eq!(params.validate(), Err(ConfigError::Substeps));
        let params = WorldParams {
            workers: Some(0),
            ..WorldParams::default()
        };
        assert_eq!(params.validate(), Err(ConfigError::Workers));
    }

    #[test]
    fn explicit_worker_count_wins() {
        let params = WorldParams {
            workers: Some(3),
            ..WorldParams::default()
        };
        assert_eq!(params.worker_count(), 3);
        assert!(WorldParams::default().worker_count() >= 1);
    }
}
