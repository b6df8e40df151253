use thiserror::Error;

/// Composition failures. None of these are transient: the input has to be
/// corrected before composing again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error("invalid volume size {size_gib} GiB: must be greater than zero")]
    InvalidSize { size_gib: i64 },

    #[error("cluster '{cluster}' has no resolved identity ARN")]
    MissingClusterIdentity { cluster: String },

    #[error("identity '{arn}' does not belong to cluster '{cluster}': {reason}")]
    InvalidClusterIdentity { cluster: String, arn: String, reason: &'static str },

    #[error("script template must contain placeholder '{token}' exactly once, found {occurrences}")]
    UnresolvedPlaceholder { token: &'static str, occurrences: usize },

    #[error("script template is empty")]
    MissingTemplate,

    #[error("invalid network placement: {reason}")]
    InvalidNetworkPlacement { reason: String },

    #[error("invalid cluster name '{name}': {reason}")]
    InvalidClusterName { name: String, reason: &'static str },

    #[error("invalid account context: {reason}")]
    InvalidAccountContext { reason: String },

    #[error("invalid artifact '{artifact}': {reason}")]
    InvalidArtifact { artifact: String, reason: String },

    #[error("invalid network variant name '{variant}'")]
    InvalidNetworkVariant { variant: String },

    #[error("network variant '{variant}' is configured more than once")]
    DuplicateNetworkVariant { variant: String },

    #[error("stack has no ingestion nodes")]
    EmptyNodeSet,
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
