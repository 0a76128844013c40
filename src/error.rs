use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("cell size must be positive and finite, got {0}")]
    CellSize(f64),
    #[error("world dimensions must be positive and finite, got {width}x{height}")]
    Dimensions { width: f64, height: f64 },
    #[error("substep count must be at least 1")]
    Substeps,
    #[error("worker count must be at least 1")]
    Workers,
    #[error("mass must be positive and finite, got {0}")]
    Mass(f64),
    #[error("radius must be non-negative and finite, got {0}")]
    Radius(f64),
    #[error("restitution {0} must be between 0.0 and 1.0")]
    Restitution(f64),
    #[error("friction must be non-negative and finite, got {0}")]
    Friction(f64),
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("worker pool unavailable: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
