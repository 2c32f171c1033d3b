#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown profile '{requested}'. Available profiles: {}", .available.join(", "))]
    UnknownProfile {
        requested: String,
        available: Vec<String>,
    },

    #[error("Malformed objectives config: {0}")]
    MalformedObjectivesConfig(String),

    #[error("Malformed metrics snapshot: {0}")]
    MalformedMetricsSnapshot(String),
}

impl CoreError {
    /// Stable taxonomy name used in reports and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownProfile { .. } => "UnknownProfile",
            Self::MalformedObjectivesConfig(_) => "MalformedObjectivesConfig",
            Self::MalformedMetricsSnapshot(_) => "MetricsFetchFailure",
        }
    }
}
