//! Error types for the DCEL kernel.
//!
//! Container lookups and conversions report failures through [`DcelError`].
//! Query operators return plain booleans, and edit operators report an
//! [`ExitStatus`](crate::algo::ExitStatus) instead of an error.

use thiserror::Error;

use crate::algo::ExitStatus;

/// Result type alias using [`DcelError`].
pub type Result<T> = std::result::Result<T, DcelError>;

/// Errors that can occur while building, querying or editing a [`Dcel`](crate::mesh::Dcel).
#[derive(Error, Debug)]
pub enum DcelError {
    /// The handle is the invalid sentinel.
    #[error("invalid {kind} index")]
    InvalidIndex {
        /// Entity kind ("vertex", "half-edge", ...).
        kind: &'static str,
    },

    /// The handle refers to an entity that was never allocated or has been retired.
    #[error("{kind} {index} not found")]
    NotFound {
        /// Entity kind.
        kind: &'static str,
        /// The raw index that was looked up.
        index: usize,
    },

    /// A local topology invariant is violated.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// An edit operator rejected the requested operation.
    #[error("operation not processable: {0}")]
    NotProcessable(String),

    /// The requested configuration is recognised but has no implementation.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// The index type cannot address another entity of this kind.
    #[error("{kind} index space exhausted (largest index is {limit})")]
    IndexOverflow {
        /// Entity kind.
        kind: &'static str,
        /// Largest index the index type can address.
        limit: usize,
    },

    /// The input mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices.
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// An edge is shared by more than two faces, or two faces traverse it in the same direction.
    #[error("edge ({v0}, {v1}) is non-manifold or inconsistently oriented")]
    NonManifoldEdge {
        /// First vertex of the edge.
        v0: usize,
        /// Second vertex of the edge.
        v1: usize,
    },

    /// The mesh has non-manifold topology around a vertex.
    #[error("mesh has non-manifold topology: {details}")]
    NonManifold {
        /// Description of the non-manifold condition.
        details: String,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A mesh file could not be parsed.
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number (0 for binary formats).
        line: usize,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl DcelError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        DcelError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create an invalid topology error.
    pub fn topology(message: impl Into<String>) -> Self {
        DcelError::InvalidTopology(message.into())
    }

    /// Create a not-processable error.
    pub fn not_processable(message: impl Into<String>) -> Self {
        DcelError::NotProcessable(message.into())
    }

    /// The pipeline exit status that corresponds to this error.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            DcelError::InvalidIndex { .. } => ExitStatus::InvalidIndex,
            DcelError::NotFound { .. } => ExitStatus::NotFound,
            DcelError::InvalidTopology(_) => ExitStatus::InvalidTopology,
            DcelError::NotProcessable(_) => ExitStatus::NotProcessable,
            DcelError::NotImplemented(_) => ExitStatus::NotImplemented,
            DcelError::IndexOverflow { .. } => ExitStatus::NotProcessable,
            _ => ExitStatus::ConfigError,
        }
    }
}
