use crate::engine::selection::CapStrategy;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
}

const DEFAULT_BATCH_SIZE: usize = 64;

/// Parameters of one sampling run.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    /// Lower edge of the useful-uncertainty band (inclusive).
    pub lo: f64,
    /// Upper edge of the useful-uncertainty band (inclusive).
    pub hi: f64,
    /// Maximum number of configurations to select.
    pub max_n: usize,
    /// How an over-capacity filtered set is reduced.
    pub strategy: CapStrategy,
    /// Number of frames pulled from the stream and evaluated together.
    /// Bounds both peak memory and the size of one parallel work unit.
    pub batch_size: usize,
    /// Whether diagnostics keep each frame's per-atom deviation vector.
    pub keep_per_atom: bool,
}

#[derive(Default)]
pub struct SamplingConfigBuilder {
    lo: Option<f64>,
    hi: Option<f64>,
    max_n: Option<usize>,
    strategy: Option<CapStrategy>,
    batch_size: Option<usize>,
    keep_per_atom: bool,
}

impl SamplingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn band(mut self, lo: f64, hi: f64) -> Self {
        self.lo = Some(lo);
        self.hi = Some(hi);
        self
    }

    pub fn max_n(mut self, max_n: usize) -> Self {
        self.max_n = Some(max_n);
        self
    }

    pub fn strategy(mut self, strategy: CapStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn keep_per_atom(mut self, keep: bool) -> Self {
        self.keep_per_atom = keep;
        self
    }

    pub fn build(self) -> Result<SamplingConfig, ConfigError> {
        Ok(SamplingConfig {
            lo: self.lo.ok_or(ConfigError::MissingParameter("lo"))?,
            hi: self.hi.ok_or(ConfigError::MissingParameter("hi"))?,
            max_n: self.max_n.ok_or(ConfigError::MissingParameter("max_n"))?,
            strategy: self.strategy.unwrap_or_default(),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
            keep_per_atom: self.keep_per_atom,
        })
    }
}
