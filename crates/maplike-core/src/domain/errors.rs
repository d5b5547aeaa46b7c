use crate::numerics::linalg::SolveError;
use std::error::Error;

pub type MapLikeResult<T> = Result<T, MapLikeError>;

/// Error type produced by a [`crate::modules::SpectralModel`] implementation.
pub type ModelError = Box<dyn Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    InputValidation,
    IoSystem,
    Computation,
}

impl ErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidation => 2,
            Self::IoSystem => 3,
            Self::Computation => 4,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidation => "InputValidationError",
            Self::IoSystem => "IoSystemError",
            Self::Computation => "ComputationError",
        }
    }

    /// Summary line printed after the diagnostic when the process exits on an error.
    pub fn fatal_exit_line(self) -> String {
        format!("FATAL EXIT CODE: {} ({})", self.exit_code(), self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("parameter declared more than once in fixed or variable sets: {}", .names.join(", "))]
    DuplicateParameters { names: Vec<String> },
    #[error(
        "parameter mismatch between model and configuration (missing: [{}], extra: [{}])",
        .missing.join(", "),
        .extra.join(", ")
    )]
    ParameterMismatch {
        missing: Vec<String>,
        extra: Vec<String>,
    },
    #[error("nside {nside} is not a positive power of two")]
    InvalidNside { nside: u32 },
    #[error("{npix} pixels is not a valid HEALPix map size")]
    InvalidPixelCount { npix: usize },
    #[error(
        "base pixel count {base_pixels} is not divisible by region pixel count {region_pixels}"
    )]
    IndivisiblePixelization {
        base_pixels: usize,
        region_pixels: usize,
    },
    #[error("region {region} is out of range for {region_count} regions")]
    RegionOutOfRange { region: usize, region_count: usize },
    #[error("configuration lists no frequencies")]
    EmptyFrequencies,
    #[error("frequency at index {index} is not finite")]
    NonFiniteFrequency { index: usize },
    #[error("failed to read configuration '{path}': {message}")]
    Io { path: String, message: String },
    #[error("failed to parse configuration: {message}")]
    Parse { message: String },
}

impl ConfigError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DuplicateParameters { .. } => "CONFIG.DUPLICATE_PARAMETER",
            Self::ParameterMismatch { .. } => "CONFIG.PARAMETER_MISMATCH",
            Self::InvalidNside { .. } => "CONFIG.INVALID_NSIDE",
            Self::InvalidPixelCount { .. } => "CONFIG.INVALID_NPIX",
            Self::IndivisiblePixelization { .. } => "CONFIG.INDIVISIBLE_PIXELIZATION",
            Self::RegionOutOfRange { .. } => "CONFIG.REGION_OUT_OF_RANGE",
            Self::EmptyFrequencies => "CONFIG.EMPTY_FREQUENCIES",
            Self::NonFiniteFrequency { .. } => "CONFIG.NON_FINITE_FREQUENCY",
            Self::Io { .. } => "IO.CONFIG",
            Self::Parse { .. } => "CONFIG.PARSE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("{operand} has shape {actual:?}, expected {expected:?}")]
    Mismatch {
        operand: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("{operand} is ragged: found a row of length {actual}, expected {expected}")]
    Ragged {
        operand: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{operand} has an empty axis")]
    EmptyAxis { operand: &'static str },
}

impl ShapeError {
    pub fn mismatch(operand: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        Self::Mismatch {
            operand,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

/// One (polarization, pixel) slice whose amplitude system could not be solved.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("polarization {polarization}, pixel {pixel}: {reason}")]
pub struct SingularSlice {
    pub polarization: usize,
    pub pixel: usize,
    pub reason: SolveError,
}

#[derive(Debug, thiserror::Error)]
pub enum MapLikeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(
        "amplitude system is singular in {} slice(s): {}",
        .slices.len(),
        describe_slices(.slices)
    )]
    SingularSystem { slices: Vec<SingularSlice> },
    #[error("degenerate fit with {degrees_of_freedom} degrees of freedom")]
    DegenerateFit { degrees_of_freedom: i64 },
    #[error("spectral model evaluation failed: {source}")]
    SpectralModel {
        #[source]
        source: ModelError,
    },
    #[error("chi-squared distribution failure: {0}")]
    Statistics(String),
}

impl MapLikeError {
    pub fn spectral_model(source: ModelError) -> Self {
        Self::SpectralModel { source }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(ConfigError::Io { .. }) => ErrorCategory::IoSystem,
            Self::Config(_) | Self::Shape(_) => ErrorCategory::InputValidation,
            Self::SingularSystem { .. }
            | Self::DegenerateFit { .. }
            | Self::SpectralModel { .. }
            | Self::Statistics(_) => ErrorCategory::Computation,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(error) => error.code(),
            Self::Shape(_) => "SHAPE.MISMATCH",
            Self::SingularSystem { .. } => "SOLVE.SINGULAR",
            Self::DegenerateFit { .. } => "FIT.DEGENERATE",
            Self::SpectralModel { .. } => "MODEL.RESPONSE",
            Self::Statistics(_) => "STATS.CHI2",
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.code(), self)
    }

    pub fn fatal_exit_line(&self) -> String {
        self.category().fatal_exit_line()
    }
}

const DESCRIBED_SLICE_LIMIT: usize = 4;

fn describe_slices(slices: &[SingularSlice]) -> String {
    let mut described: Vec<String> = slices
        .iter()
        .take(DESCRIBED_SLICE_LIMIT)
        .map(ToString::to_string)
        .collect();
    if slices.len() > DESCRIBED_SLICE_LIMIT {
        described.push(format!("... {} more", slices.len() - DESCRIBED_SLICE_LIMIT));
    }
    described.join("; ")
}
