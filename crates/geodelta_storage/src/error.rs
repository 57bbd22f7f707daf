//! Error types for feature store operations.

use crate::model::{CollectionRef, GeometryKind};
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing a feature store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A geometry could not be parsed from WKT.
    #[error("WKT error: {0}")]
    Wkt(String),

    /// The path does not hold a feature store.
    #[error("not a feature store: {path}")]
    NotAStore {
        /// The offending path.
        path: String,
    },

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access to {path}")]
    Locked {
        /// The store root.
        path: String,
    },

    /// The collection does not exist in this store.
    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionRef),

    /// A collection with the same reference already exists.
    #[error("collection already exists: {0}")]
    CollectionExists(CollectionRef),

    /// A feature's geometry does not match the collection kind.
    #[error("geometry kind mismatch in {collection}: expected {expected}, got {actual}")]
    GeometryKindMismatch {
        /// The target collection.
        collection: CollectionRef,
        /// Kind declared by the collection.
        expected: GeometryKind,
        /// Kind of the rejected geometry, if it has one.
        actual: String,
    },

    /// An attribute names a field the schema does not declare.
    #[error("unknown field {field} in {collection}")]
    UnknownField {
        /// The target collection.
        collection: CollectionRef,
        /// The field name.
        field: String,
    },

    /// An attribute targets an identity, geometry or read-only field.
    #[error("field {field} in {collection} is not editable")]
    FieldNotEditable {
        /// The target collection.
        collection: CollectionRef,
        /// The field name.
        field: String,
    },

    /// A container or collection name cannot be stored.
    #[error("invalid collection name {reference}: {reason}")]
    InvalidName {
        /// The rejected reference.
        reference: CollectionRef,
        /// Why it was rejected.
        reason: String,
    },

    /// Stored data is corrupted.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

impl StoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates an invalid-name error.
    pub fn invalid_name(reference: &CollectionRef, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            reference: reference.clone(),
            reason: reason.into(),
        }
    }

    /// Creates a not-a-store error for a path.
    pub fn not_a_store(path: impl Into<String>) -> Self {
        Self::NotAStore { path: path.into() }
    }
}

impl<T: std::fmt::Debug> From<ciborium::ser::Error<T>> for StoreError {
    fn from(err: ciborium::ser::Error<T>) -> Self {
        Self::Codec(err.to_string())
    }
}

impl<T: std::fmt::Debug> From<ciborium::de::Error<T>> for StoreError {
    fn from(err: ciborium::de::Error<T>) -> Self {
        Self::Codec(err.to_string())
    }
}
