//! Crate-level error taxonomy.
//!
//! Every subsystem reports through its own enum; [`Error`] wraps them so the
//! pipeline can answer two questions about any failure: which phase it came
//! from ([`Error::phase`]) and which kind of failure it is ([`Error::kind`]).

use std::fmt;

use crate::data::{PrepareError, RecordError};
use crate::distribute::DistributionError;
use crate::model::{ConfigError, TrainError};
use crate::persist::PersistError;
use crate::schema::SchemaError;

/// Pipeline phase a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Load,
    Prepare,
    Train,
    Persist,
    Distribute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Prepare => "prepare",
            Self::Train => "train",
            Self::Persist => "persist",
            Self::Distribute => "distribute",
        })
    }
}

/// Failure categories a caller can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A row failed to parse.
    MalformedRecord,
    /// Columns or feature order differ from the expected schema.
    SchemaMismatch,
    /// Filtering left nothing to train on.
    NoUsableData,
    InvalidConfiguration,
    InvalidTrainingSet,
    ArtifactWriteFailure,
    /// Only produced outside the pipeline; [`crate::pipeline::run`] downgrades it.
    RemoteDistributionFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Prepare(#[from] PrepareError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Train(#[from] TrainError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

impl Error {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Schema(_) | Self::Record(_) => Phase::Load,
            Self::Prepare(PrepareError::Record(_)) => Phase::Load,
            Self::Prepare(_) => Phase::Prepare,
            Self::Config(_) | Self::Train(_) => Phase::Train,
            Self::Persist(_) => Phase::Persist,
            Self::Distribution(_) => Phase::Distribute,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(_) => ErrorKind::SchemaMismatch,
            Self::Record(e) | Self::Prepare(PrepareError::Record(e)) => record_kind(e),
            Self::Prepare(PrepareError::FeatureCount { .. }) => ErrorKind::SchemaMismatch,
            Self::Prepare(PrepareError::NoUsableData { .. }) => ErrorKind::NoUsableData,
            Self::Config(_) | Self::Train(TrainError::InvalidConfiguration(_)) => {
                ErrorKind::InvalidConfiguration
            }
            Self::Train(_) => ErrorKind::InvalidTrainingSet,
            Self::Persist(PersistError::Schema(_)) => ErrorKind::SchemaMismatch,
            Self::Persist(_) => ErrorKind::ArtifactWriteFailure,
            Self::Distribution(_) => ErrorKind::RemoteDistributionFailure,
        }
    }
}

fn record_kind(err: &RecordError) -> ErrorKind {
    match err {
        RecordError::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
        RecordError::Malformed { .. } | RecordError::Read(_) => ErrorKind::MalformedRecord,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_usable_data_is_a_prepare_failure() {
        let err = Error::from(PrepareError::NoUsableData {
            n_records: 4,
            skipped_groups: 2,
        });
        assert_eq!(err.phase(), Phase::Prepare);
        assert_eq!(err.kind(), ErrorKind::NoUsableData);
        assert!(err.to_string().contains("collect more feedback"));
    }

    #[test]
    fn wrapped_record_errors_keep_their_kind() {
        let schema_err = SchemaError::MissingColumns {
            missing: vec!["label".into()],
        };
        let err = Error::from(PrepareError::Record(RecordError::SchemaMismatch(schema_err)));
        assert_eq!(err.phase(), Phase::Load);
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn config_errors_map_to_invalid_configuration() {
        let err = Error::from(TrainError::InvalidConfiguration(ConfigError::InvalidNRounds));
        assert_eq!(err.phase(), Phase::Train);
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(Error::from(ConfigError::InvalidNRounds).kind(), ErrorKind::InvalidConfiguration);
    }
}
