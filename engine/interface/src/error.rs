// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Native engine interface library - Error module

use thiserror::Error;

/// Native engine error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Context handle is unknown to the engine
    #[error("invalid context handle")]
    InvalidContext,

    /// Object handle is unknown, of the wrong kind, or owned by another context
    #[error("invalid handle")]
    InvalidHandle,

    /// Engine returned the sentinel handle from a creation call
    #[error("engine returned a null handle")]
    NullHandle,

    /// Algorithm or curve is not implemented by the engine
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Algorithm is not approved for a FIPS context
    #[error("algorithm not permitted in FIPS mode: {0}")]
    NotPermittedInFips(String),

    /// Encoded key material could not be decoded
    #[error("invalid key encoding")]
    InvalidEncoding,

    /// Keys used together are on different curves
    #[error("key curve mismatch")]
    CurveMismatch,

    /// Requested shared secret length does not match the curve
    #[error("shared secret length mismatch: expected {expected}, requested {actual}")]
    SecretLengthMismatch {
        /// Length produced by the curve
        expected: usize,

        /// Length requested by the caller
        actual: usize,
    },

    /// Failure reported by the underlying native library
    #[error("native failure: {0}")]
    Native(String),
}
