use thiserror::Error;

/// Errors raised while loading detection settings.
///
/// Running the detectors themselves never fails: a rule that lacks what it
/// needs falls back to defaults or stays silent.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("failed to parse detection config: {0}")]
    Parse(String),

    #[error("invalid detection config: {0}")]
    InvalidConfig(String),
}
