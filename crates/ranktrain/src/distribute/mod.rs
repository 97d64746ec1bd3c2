//! Best-effort copy of the trained artifact to remote storage.
//!
//! Distribution never invalidates a run: a model that was trained and saved
//! locally stays usable whatever happens here. Failures are reported as a
//! [`DistributionOutcome`] and a warning, not as an error.

#[cfg(feature = "s3")]
mod s3;

use std::fmt;
use std::path::Path;

use serde::Serialize;

#[cfg(feature = "s3")]
pub use s3::S3Distributor;

/// Where a distributed artifact lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteDestination {
    pub bucket: String,
    pub key: String,
}

impl RemoteDestination {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Build a destination from optional parts; both or neither must be set.
    pub fn from_parts(
        bucket: Option<String>,
        key: Option<String>,
    ) -> Result<Option<Self>, DistributionError> {
        match (bucket, key) {
            (Some(bucket), Some(key)) => Ok(Some(Self::new(bucket, key))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(DistributionError::IncompleteDestination("key")),
            (None, Some(_)) => Err(DistributionError::IncompleteDestination("bucket")),
        }
    }
}

impl fmt::Display for RemoteDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("remote destination is missing its {0}")]
    IncompleteDestination(&'static str),

    #[error("remote storage client unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read artifact {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload to {destination} failed: {message}")]
    Upload {
        destination: RemoteDestination,
        message: String,
    },
}

/// Copies a local artifact to remote storage.
pub trait ArtifactDistributor {
    fn distribute(&self, local: &Path, destination: &RemoteDestination)
        -> Result<(), DistributionError>;
}

/// What happened to the remote copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DistributionOutcome {
    /// No destination configured.
    Skipped,
    Uploaded { destination: RemoteDestination },
    /// A destination was configured but no distributor is available.
    Unavailable { destination: RemoteDestination },
    Failed {
        destination: RemoteDestination,
        message: String,
    },
}

impl DistributionOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, Self::Uploaded { .. })
    }
}

impl fmt::Display for DistributionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => f.write_str("skipped (no destination)"),
            Self::Uploaded { destination } => write!(f, "uploaded to {destination}"),
            Self::Unavailable { destination } => {
                write!(f, "not uploaded to {destination}: no remote storage client")
            }
            Self::Failed {
                destination,
                message,
            } => write!(f, "upload to {destination} failed: {message}"),
        }
    }
}

/// Distribute `local` if a destination is configured, downgrading every
/// failure to a warning.
pub fn best_effort(
    local: &Path,
    destination: Option<&RemoteDestination>,
    distributor: Option<&dyn ArtifactDistributor>,
) -> DistributionOutcome {
    let Some(destination) = destination else {
        tracing::info!("No remote destination configured; pass --s3-bucket and --s3-key to upload the model");
        return DistributionOutcome::Skipped;
    };
    let Some(distributor) = distributor else {
        tracing::warn!(%destination, "Remote storage client unavailable; model kept locally only");
        return DistributionOutcome::Unavailable {
            destination: destination.clone(),
        };
    };

    match distributor.distribute(local, destination) {
        Ok(()) => {
            tracing::info!(%destination, "Uploaded model artifact");
            DistributionOutcome::Uploaded {
                destination: destination.clone(),
            }
        }
        Err(DistributionError::Unavailable(reason)) => {
            tracing::warn!(%destination, %reason, "Remote storage client unavailable; model kept locally only");
            DistributionOutcome::Unavailable {
                destination: destination.clone(),
            }
        }
        Err(err) => {
            tracing::warn!(%destination, error = %err, "Failed to upload model artifact; local copy is still valid");
            DistributionOutcome::Failed {
                destination: destination.clone(),
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recording(RefCell<Vec<String>>);

    impl ArtifactDistributor for Recording {
        fn distribute(
            &self,
            _local: &Path,
            destination: &RemoteDestination,
        ) -> Result<(), DistributionError> {
            self.0.borrow_mut().push(destination.to_string());
            Ok(())
        }
    }

    struct Failing;

    impl ArtifactDistributor for Failing {
        fn distribute(
            &self,
            _local: &Path,
            destination: &RemoteDestination,
        ) -> Result<(), DistributionError> {
            Err(DistributionError::Upload {
                destination: destination.clone(),
                message: "access denied".into(),
            })
        }
    }

    fn dest() -> RemoteDestination {
        RemoteDestination::new("models", "ranker/model.txt")
    }

    #[test]
    fn destination_parts_must_come_together() {
        assert_eq!(RemoteDestination::from_parts(None, None).unwrap(), None);
        assert_eq!(
            RemoteDestination::from_parts(Some("b".into()), Some("k".into())).unwrap(),
            Some(RemoteDestination::new("b", "k"))
        );
        assert!(matches!(
            RemoteDestination::from_parts(Some("b".into()), None),
            Err(DistributionError::IncompleteDestination("key"))
        ));
        assert!(matches!(
            RemoteDestination::from_parts(None, Some("k".into())),
            Err(DistributionError::IncompleteDestination("bucket"))
        ));
    }

    #[test]
    fn no_destination_skips() {
        let outcome = best_effort(Path::new("m.txt"), None, Some(&Failing));
        assert_eq!(outcome, DistributionOutcome::Skipped);
    }

    #[test]
    fn missing_distributor_is_unavailable() {
        let outcome = best_effort(Path::new("m.txt"), Some(&dest()), None);
        assert_eq!(outcome, DistributionOutcome::Unavailable { destination: dest() });
    }

    #[test]
    fn failure_is_downgraded() {
        let outcome = best_effort(Path::new("m.txt"), Some(&dest()), Some(&Failing));
        match outcome {
            DistributionOutcome::Failed { destination, message } => {
                assert_eq!(destination, dest());
                assert!(message.contains("access denied"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn success_is_recorded() {
        let recorder = Recording(RefCell::new(Vec::new()));
        let outcome = best_effort(Path::new("m.txt"), Some(&dest()), Some(&recorder));
        assert!(outcome.is_uploaded());
        assert_eq!(recorder.0.into_inner(), vec!["s3://models/ranker/model.txt"]);
    }
}
