use crate::logic::validate::ValidationErrors;
use crate::model::Id;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures surfaced by the entity management engine.
///
/// `Configuration` is an operator fault (bad descriptor table, unresolved screen field,
/// missing factory) and is never recoverable by the end user. Everything else is
/// presented to the user through [`EngineError::user_message`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("optimistic lock conflict on {entity_type} '{id}'")]
    OptimisticLockConflict { entity_type: String, id: Id },

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("collaborator failure: {0:#}")]
    Collaborator(anyhow::Error),
}

impl EngineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Text shown to the end user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(_) => {
                "This screen is not configured correctly. Please contact an administrator."
                    .to_string()
            }
            Self::Validation(errors) => {
                let mut message = String::from("Failed to save the data. Please check:");
                for error in errors.iter() {
                    message.push_str(&format!("\n• {}: {}", error.display_name, error.message));
                }
                message
            }
            Self::OptimisticLockConflict { .. } => {
                "Somebody else has updated the record while you were making changes.".to_string()
            }
            Self::Precondition(message) => message.clone(),
            Self::Collaborator(_) => "An unexpected error occurred. Please try again.".to_string(),
        }
    }

    /// Whether the user can fix the situation without operator intervention.
    pub fn is_user_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::OptimisticLockConflict { .. })
    }
}

/// Failures reported by persistence collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity_type} '{id}' was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        entity_type: String,
        id: Id,
        expected: u64,
        actual: u64,
    },

    #[error("{entity_type} '{id}' not found")]
    NotFound { entity_type: String, id: Id },

    #[error("{entity_type} already exists for {key}")]
    Duplicate { entity_type: String, key: String },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::VersionConflict { entity_type, id, .. } => {
                EngineError::OptimisticLockConflict { entity_type, id }
            }
            duplicate @ StoreError::Duplicate { .. } => {
                EngineError::Precondition(duplicate.to_string())
            }
            other => EngineError::Collaborator(anyhow::Error::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_differs_from_generic_failure() {
        let conflict: EngineError = StoreError::VersionConflict {
            entity_type: "CProject".to_string(),
            id: "p-1".to_string(),
            expected: 1,
            actual: 2,
        }
        .into();
        let generic: EngineError = StoreError::Backend(anyhow::anyhow!("disk full")).into();

        assert!(conflict.is_conflict());
        assert!(!generic.is_conflict());
        assert_ne!(conflict.user_message(), generic.user_message());
        assert!(conflict.user_message().contains("Somebody else"));
    }

    #[test]
    fn test_not_found_maps_to_collaborator_failure() {
        let error: EngineError = StoreError::NotFound {
            entity_type: "CUser".to_string(),
            id: "u-9".to_string(),
        }
        .into();
        assert!(matches!(error, EngineError::Collaborator(_)));
        assert!(error.to_string().contains("u-9"));
    }

    #[test]
    fn test_duplicate_is_a_targeted_precondition() {
        let error: EngineError = StoreError::Duplicate {
            entity_type: "CUserProjectSettings".to_string(),
            key: "u-1/p-1".to_string(),
        }
        .into();
        assert!(matches!(error, EngineError::Precondition(_)));
        assert!(error.user_message().contains("u-1/p-1"));
    }

    #[test]
    fn test_configuration_is_not_user_recoverable() {
        assert!(!EngineError::configuration("missing factory").is_user_recoverable());
        assert!(EngineError::precondition("nothing selected").is_user_recoverable());
    }
}
