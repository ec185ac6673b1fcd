//! Domain errors for version ordering and deploy decisions.
//!
//! These errors are returned when a domain invariant is violated or a deploy
//! policy rejects a candidate release.
//!
//! # Examples
//!
//! ```
//! use harbormaster::domain::error::VersionError;
//! use harbormaster::domain::version::VersionOrdinal;
//!
//! let result = VersionOrdinal::parse("not a version");
//! assert!(matches!(result, Err(VersionError::InvalidFormat { .. })));
//! ```

use thiserror::Error;

/// Errors raised while parsing or comparing version ordinals.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// Input is neither a non-negative integer cursor nor a semantic version.
    #[error("invalid version format: {input:?}")]
    InvalidFormat {
        /// The rejected input.
        input: String,
    },

    /// A cursor was compared against a semantic version.
    #[error("cannot compare {left} with {right}: ordinals are of different kinds")]
    Incomparable {
        /// Rendering of the left operand.
        left: String,
        /// Rendering of the right operand.
        right: String,
    },
}

/// Policy rejections produced by the deploy decision engine.
///
/// All variants are non-retryable: the same request against the same catalog
/// fails the same way until an operator changes something.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    /// No release carries the requested label.
    #[error("no release found with version label {label:?}")]
    LabelNotFound {
        /// The label that was requested.
        label: String,
    },

    /// The selected sequence is a past version and rollback is disabled.
    #[error("rollback to sequence {sequence} is not allowed for this channel")]
    RollbackNotAllowed {
        /// The rejected past sequence.
        sequence: u64,
    },

    /// The selected sequence still needs configuration before it can deploy.
    #[error("sequence {sequence} requires configuration before it can be deployed")]
    ConfigurationRequired {
        /// The sequence awaiting configuration.
        sequence: u64,
    },

    /// The catalog does not contain the selected sequence.
    #[error("sequence {sequence} not found in release catalog")]
    SequenceNotFound {
        /// The missing sequence.
        sequence: u64,
    },
}

/// Unknown value for an enumerated domain setting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownVariant {
    /// Which setting was being parsed.
    pub kind: &'static str,
    /// The rejected value.
    pub value: String,
}
