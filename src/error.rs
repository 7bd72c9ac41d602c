//! Error types for scene assembly.
//!
//! Nothing in this crate raises a fatal error. A payload-level problem
//! rejects that payload (`Err`), an item-level problem skips that item and
//! is returned in the `Ok` report vector so the caller can log or surface
//! it. Sibling and queued work always continues.

use std::fmt;

/// Errors produced while assembling a streamed scene.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneError {
    /// A payload did not have the expected shape (for example a non-array
    /// where an array is required). The whole payload is rejected.
    MalformedPayload {
        /// Entry point that rejected the payload.
        context: &'static str,
        /// Parser diagnostics.
        reason: String,
    },
    /// A tree node arrived without an identifier and was skipped.
    MissingNodeId,
    /// A node's declared parent could not be resolved after the retry stage.
    UnresolvedParent {
        /// Identifier of the node whose parent is missing.
        sid: String,
        /// The unresolved parent identifier.
        parent: String,
    },
    /// A batch-local child index pointed outside the current batch.
    ChildIndexOutOfRange {
        /// Identifier of the referencing node.
        sid: String,
        /// The offending index.
        index: usize,
    },
    /// An operation referenced a view that was never registered.
    UnknownView(String),
    /// A geometry entry carried no payload bytes where content was required.
    EmptyGeometry(String),
    /// A sequence referenced a track by positional index before any track
    /// list was received.
    UnknownTrackIndex {
        /// Identifier of the referencing sequence.
        sequence: String,
        /// The positional index that could not be resolved.
        index: usize,
    },
    /// The binary reader ran past the end of its buffer.
    BufferOverrun {
        /// Read position at the time of the failure.
        offset: usize,
        /// Number of bytes the read wanted.
        wanted: usize,
        /// Total buffer length.
        len: usize,
    },
}

/// Result alias used throughout the crate.
pub type SceneResult<T> = Result<T, SceneError>;

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedPayload { context, reason } => {
                write!(f, "malformed payload in {context}: {reason}")
            }
            Self::MissingNodeId => write!(f, "tree node has no identifier"),
            Self::UnresolvedParent { sid, parent } => {
                write!(f, "node {sid} references unresolved parent {parent}")
            }
            Self::ChildIndexOutOfRange { sid, index } => {
                write!(f, "node {sid} references child index {index} outside the batch")
            }
            Self::UnknownView(id) => write!(f, "unknown view: {id}"),
            Self::EmptyGeometry(id) => write!(f, "geometry {id} has an empty buffer"),
            Self::UnknownTrackIndex { sequence, index } => {
                write!(f, "sequence {sequence} references unknown track index {index}")
            }
            Self::BufferOverrun { offset, wanted, len } => {
                write!(f, "read of {wanted} bytes at offset {offset} overruns buffer of {len}")
            }
        }
    }
}

impl std::error::Error for SceneError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = SceneError::MissingNodeId;
        assert_eq!(err.to_string(), "tree node has no identifier");

        let err = SceneError::UnresolvedParent {
            sid: "a".into(),
            parent: "b".into(),
        };
        assert_eq!(err.to_string(), "node a references unresolved parent b");

        let err = SceneError::BufferOverrun {
            offset: 4,
            wanted: 8,
            len: 6,
        };
        assert_eq!(
            err.to_string(),
            "read of 8 bytes at offset 4 overruns buffer of 6"
        );
    }
}
