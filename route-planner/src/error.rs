use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    /// The backend rejected the uploaded route or couldn't read it
    #[error("route could not be parsed: {0}")]
    Parse(String),
    #[error("route has {route} points, but the elevation data has {elevation}")]
    LengthMismatch { route: usize, elevation: usize },
    /// The walk time table reply was unusable
    #[error("walk time table could not be computed: {0}")]
    Compute(String),
    #[error("network request failed: {0}")]
    Network(String),
    #[error("invalid zoom level {0}")]
    InvalidZoomLevel(usize),
    #[error("routing service returned no usable route: {0}")]
    Routing(String),
    #[error("map export was not started: {0}")]
    Export(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = PlannerError> = std::result::Result<T, E>;

impl From<reqwest::Error> for PlannerError {
    fn from(err: reqwest::Error) -> Self {
        PlannerError::Network(err.to_string())
    }
}
