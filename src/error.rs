use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteForgeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Parsing Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    #[error("Geometry Error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Reachability Error: {0}")]
    Reachability(#[from] ReachabilityError),

    #[error("Heuristic Construction Failed: {0}")]
    Construction(String),

    #[error("Thread Pool Error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type SfResult<T> = Result<T, SiteForgeError>;

/// Failures of a population query or of a single tessellation cell.
/// Always recovered locally by the evaluator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("polygon does not intersect the raster extent")]
    OutsideRaster,

    #[error("degenerate geometry: {0}")]
    Degenerate(String),
}

/// Failures of the isochrone collaborator. Heuristics drop the candidate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReachabilityError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("service responded with status {0}")]
    Status(u16),

    #[error("invalid isochrone response: {0}")]
    InvalidResponse(String),
}

impl ReachabilityError {
    /// Transport errors, rate limiting and server-side failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ReachabilityError::Transport(_) => true,
            ReachabilityError::Status(code) => *code == 429 || *code >= 500,
            ReachabilityError::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for ReachabilityError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ReachabilityError::Status(status.as_u16()),
            None if e.is_decode() => ReachabilityError::InvalidResponse(e.to_string()),
            None => ReachabilityError::Transport(e.to_string()),
        }
    }
}
