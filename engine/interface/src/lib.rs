// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![warn(missing_docs)]

//! Native engine interface library
//!
//! Defines the capability boundary between the `nativekey` object model and a
//! native cryptographic engine. Every object the engine creates is addressed by
//! an opaque [`NativeHandle`] scoped to one context handle.

mod error;

use std::fmt;
use std::str::FromStr;

pub use error::EngineError;

/// Engine Result
pub type EngineResult<T> = Result<T, EngineError>;

/// Opaque handle to an object living inside the native engine.
///
/// `0` is the universal sentinel for "invalid or released".
#[repr(transparent)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeHandle(u64);

impl NativeHandle {
    /// The invalid/released sentinel.
    pub const INVALID: NativeHandle = NativeHandle(0);

    /// Wraps a raw engine handle value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns `true` unless this is the sentinel value.
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for NativeHandle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Curves supported for XDH key agreement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum XecCurve {
    /// Curve25519 (RFC 7748)
    X25519,

    /// Curve448 (RFC 7748)
    X448,
}

impl XecCurve {
    /// Canonical curve name.
    pub const fn name(self) -> &'static str {
        match self {
            XecCurve::X25519 => "X25519",
            XecCurve::X448 => "X448",
        }
    }

    /// Size of the raw public (and private) key in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            XecCurve::X25519 => 32,
            XecCurve::X448 => 56,
        }
    }

    /// Size of the shared secret produced by key agreement.
    pub const fn shared_secret_len(self) -> usize {
        self.key_size()
    }
}

impl fmt::Display for XecCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for XecCurve {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("X25519") {
            Ok(XecCurve::X25519)
        } else if s.eq_ignore_ascii_case("X448") {
            Ok(XecCurve::X448)
        } else {
            Err(EngineError::UnsupportedAlgorithm(s.to_owned()))
        }
    }
}

/// Native engine trait
///
/// Each method is a blocking call into the engine from the calling thread.
/// Implementations must be callable from many threads at once; per-handle
/// serialization is the caller's responsibility.
pub trait Engine: Send + Sync {
    /// Returns a short engine name used in logs.
    fn name(&self) -> &str;

    /// Opens a new engine context
    ///
    /// # Arguments
    /// * `fips` - Whether the context runs in FIPS mode
    ///
    /// # Returns
    /// * `NativeHandle` - Context handle, never [`NativeHandle::INVALID`] on success
    ///
    /// # Error
    /// * `EngineError` - The engine could not initialize a context
    fn open_context(&self, fips: bool) -> EngineResult<NativeHandle>;

    /// Closes a context and every object still owned by it
    ///
    /// # Arguments
    /// * `ctx` - Context handle
    fn close_context(&self, ctx: NativeHandle) -> EngineResult<()>;

    /// Generates a new XDH key pair
    ///
    /// # Arguments
    /// * `ctx`   - Context handle
    /// * `curve` - Curve to generate on
    ///
    /// # Returns
    /// * `NativeHandle` - Key handle
    fn create_key_pair(&self, ctx: NativeHandle, curve: XecCurve) -> EngineResult<NativeHandle>;

    /// Imports a private key from its encoded form
    ///
    /// # Arguments
    /// * `ctx`     - Context handle
    /// * `encoded` - Encoded private key
    ///
    /// # Returns
    /// * `NativeHandle` - Key handle
    fn create_from_private_bytes(
        &self,
        ctx: NativeHandle,
        encoded: &[u8],
    ) -> EngineResult<NativeHandle>;

    /// Imports a public key from its encoded form
    ///
    /// # Arguments
    /// * `ctx`     - Context handle
    /// * `encoded` - Encoded public key
    ///
    /// # Returns
    /// * `NativeHandle` - Key handle
    fn create_from_public_bytes(
        &self,
        ctx: NativeHandle,
        encoded: &[u8],
    ) -> EngineResult<NativeHandle>;

    /// Computes an XDH shared secret
    ///
    /// # Arguments
    /// * `ctx`         - Context handle
    /// * `public_key`  - Peer key handle (only its public half is used)
    /// * `private_key` - Local private key handle
    /// * `secret_len`  - Expected shared secret length
    ///
    /// # Returns
    /// * `Vec<u8>` - Shared secret
    fn derive_shared_secret(
        &self,
        ctx: NativeHandle,
        public_key: NativeHandle,
        private_key: NativeHandle,
        secret_len: usize,
    ) -> EngineResult<Vec<u8>>;

    /// Returns the encoded private key, or `None` for a public-only key
    ///
    /// # Arguments
    /// * `ctx` - Context handle
    /// * `key` - Key handle
    fn get_private_material(&self, ctx: NativeHandle, key: NativeHandle)
        -> EngineResult<Option<Vec<u8>>>;

    /// Returns the encoded public key, or `None` if the engine has none
    ///
    /// # Arguments
    /// * `ctx` - Context handle
    /// * `key` - Key handle
    fn get_public_material(&self, ctx: NativeHandle, key: NativeHandle)
        -> EngineResult<Option<Vec<u8>>>;

    /// Deletes a key handle
    ///
    /// # Arguments
    /// * `ctx` - Context handle
    /// * `key` - Key handle
    fn delete_handle(&self, ctx: NativeHandle, key: NativeHandle) -> EngineResult<()>;

    /// Creates a PRNG stream
    ///
    /// # Arguments
    /// * `ctx`       - Context handle
    /// * `algorithm` - Engine-specific PRNG algorithm name
    ///
    /// # Returns
    /// * `NativeHandle` - Stream handle
    fn create_random_stream(&self, ctx: NativeHandle, algorithm: &str)
        -> EngineResult<NativeHandle>;

    /// Fills `buf` in place with output of the stream
    ///
    /// # Arguments
    /// * `ctx`    - Context handle
    /// * `stream` - Stream handle
    /// * `buf`    - Buffer to fill
    fn fill_random_bytes(
        &self,
        ctx: NativeHandle,
        stream: NativeHandle,
        buf: &mut [u8],
    ) -> EngineResult<()>;

    /// Mixes `seed` into the stream state
    ///
    /// # Arguments
    /// * `ctx`    - Context handle
    /// * `stream` - Stream handle
    /// * `seed`   - Additional seed material
    fn reseed_random_stream(
        &self,
        ctx: NativeHandle,
        stream: NativeHandle,
        seed: &[u8],
    ) -> EngineResult<()>;

    /// Deletes a PRNG stream
    ///
    /// # Arguments
    /// * `ctx`    - Context handle
    /// * `stream` - Stream handle
    fn delete_random_stream(&self, ctx: NativeHandle, stream: NativeHandle) -> EngineResult<()>;
}
