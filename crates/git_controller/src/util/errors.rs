use thiserror::Error;

#[derive(Error, Debug)]
pub enum StdError {
    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("IoError: {0}")]
    IoError(#[source] std::io::Error),

    #[error("GitError: {0}")]
    GitError(String),

    #[error("MetadataMissing: {0}")]
    MetadataMissing(String),

    #[error("MetricsError: {0}")]
    MetricsError(#[source] prometheus::Error),
}

impl StdError {
    pub fn metric_label(&self) -> String {
        match self {
            StdError::KubeError(_) => "kubeerror",
            StdError::IoError(_) => "ioerror",
            StdError::GitError(_) => "giterror",
            StdError::MetadataMissing(_) => "metadatamissing",
            StdError::MetricsError(_) => "metricserror",
        }
        .to_string()
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    StdError(#[from] StdError),

    /// A workload kind whose pinned revisions moved but which cannot be written back yet
    #[error("UnsupportedMutation: updating {kind} {namespace}/{name} is not yet supported")]
    UnsupportedMutation {
        kind: String,
        namespace: String,
        name: String,
    },
}

impl Error {
    pub fn metric_label(&self) -> String {
        match self {
            Error::StdError(e) => e.metric_label(),
            Error::UnsupportedMutation { .. } => "unsupportedmutation".to_string(),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::UnsupportedMutation { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_mutation_is_distinguishable() {
        let err = Error::UnsupportedMutation {
            kind: "ReplicationController".to_string(),
            namespace: "ns1".to_string(),
            name: "web".to_string(),
        };
        assert!(err.is_unsupported());
        assert_eq!(err.metric_label(), "unsupportedmutation");
        assert_eq!(
            err.to_string(),
            "UnsupportedMutation: updating ReplicationController ns1/web is not yet supported"
        );

        let git = Error::StdError(StdError::GitError("fatal: not a git repository".to_string()));
        assert!(!git.is_unsupported());
        assert_eq!(git.metric_label(), "giterror");
    }

    #[test]
    fn std_errors_keep_their_message() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err = Error::from(StdError::IoError(io));
        assert_eq!(err.to_string(), "IoError: permission denied");
    }
}
