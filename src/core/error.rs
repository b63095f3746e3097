use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("unrecognized loan plan `{0}`")]
    InvalidPlan(String),

    #[error("invalid year: {0}")]
    InvalidYearRange(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown course kind `{0}`")]
    InvalidCourse(String),
}

impl ProjectionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProjectionError::InvalidPlan(_) => "invalid-plan",
            ProjectionError::InvalidYearRange(_) => "invalid-year-range",
            ProjectionError::InvalidAmount(_) => "invalid-amount",
            ProjectionError::InvalidCourse(_) => "invalid-course",
        }
    }
}
