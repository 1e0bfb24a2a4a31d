// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![warn(missing_docs)]

//! Native key object library
//!
//! Safe wrappers around objects that live inside a native cryptographic
//! engine and are reachable only through opaque handles. Each wrapper owns
//! exactly one handle, serializes access to it with its own lock, caches
//! derived material, and releases the handle exactly once: explicitly via
//! [`NativeObject::release_handle`] or, as a backstop, on the [`Reclaimer`]
//! thread after the wrapper is dropped.

mod config;
mod context;
mod error;
mod provider;
mod random;
mod reclaim;
mod traits;
mod xec;

pub use config::ProviderConfig;
pub use config::ENV_FIPS;
pub use config::ENV_PROVIDER_NAME;
pub use config::ENV_RANDOM_ALGORITHM;
pub use context::Context;
pub(crate) use error::validate_created;
pub use error::NativeKeyError;
pub use nativekey_engine_interface::Engine;
pub use nativekey_engine_interface::EngineError;
pub use nativekey_engine_interface::EngineResult;
pub use nativekey_engine_interface::NativeHandle;
pub use nativekey_engine_interface::XecCurve;
pub use provider::Provider;
pub use random::RandomStream;
pub use reclaim::Reclaimer;
pub use reclaim::Registration;
pub use reclaim::ReleaseAction;
pub use traits::AsymmetricKey;
pub use traits::NativeObject;
pub use xec::XecKey;
pub use zeroize::Zeroizing;

/// Native key object Result
pub type NativeKeyResult<T> = Result<T, NativeKeyError>;
