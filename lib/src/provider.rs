// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use super::*;

/// Owner of the engine session shared by every key and stream it hands out.
#[derive(Debug)]
pub struct Provider {
    config: ProviderConfig,
    context: Context,
}

impl Provider {
    /// Opens the provider's context
    ///
    /// # Arguments
    /// * `engine` - Native engine backing every object
    /// * `config` - Provider settings
    ///
    /// # Error
    /// * `NativeKeyError::InvalidArgument` - `config` failed validation
    /// * `NativeKeyError::EngineFailure`   - The engine could not open a context
    #[tracing::instrument(skip_all, fields(name = %config.name, fips = config.fips))]
    pub fn new(engine: Arc<dyn Engine>, config: ProviderConfig) -> NativeKeyResult<Self> {
        config.validate()?;
        let context = Context::open(engine, config.fips)?;
        tracing::info!(ctx = ?context.id(), "Provider ready");
        Ok(Self { config, context })
    }

    /// Provider name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns `true` if the context runs in FIPS mode.
    pub fn is_fips(&self) -> bool {
        self.context.is_fips()
    }

    /// Shared context
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Settings the provider was opened with
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Picks the random source for an operation.
    ///
    /// In FIPS mode a caller-supplied stream is ignored and a fresh stream of
    /// the configured algorithm is returned. Otherwise `user` is returned when
    /// present.
    pub fn secure_random(&self, user: Option<RandomStream>) -> NativeKeyResult<RandomStream> {
        match user {
            Some(stream) if !self.is_fips() => Ok(stream),
            _ => RandomStream::create(&self.context, &self.config.random_algorithm),
        }
    }
}
