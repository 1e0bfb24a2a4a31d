// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::*;

/// Environment variable overriding [`ProviderConfig::name`].
pub const ENV_PROVIDER_NAME: &str = "NATIVEKEY_PROVIDER_NAME";

/// Environment variable overriding [`ProviderConfig::fips`].
pub const ENV_FIPS: &str = "NATIVEKEY_FIPS";

/// Environment variable overriding [`ProviderConfig::random_algorithm`].
pub const ENV_RANDOM_ALGORITHM: &str = "NATIVEKEY_RANDOM_ALGORITHM";

const DEFAULT_PROVIDER_NAME: &str = "nativekey";
const DEFAULT_RANDOM_ALGORITHM: &str = "SHA256DRBG";

/// Provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Name reported in logs.
    pub name: String,

    /// Open the engine context in FIPS mode.
    pub fips: bool,

    /// PRNG algorithm used by [`crate::Provider::secure_random`].
    pub random_algorithm: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROVIDER_NAME.to_owned(),
            fips: false,
            random_algorithm: DEFAULT_RANDOM_ALGORITHM.to_owned(),
        }
    }
}

impl ProviderConfig {
    /// Defaults overridden by the `NATIVEKEY_*` environment variables.
    pub fn from_env() -> NativeKeyResult<Self> {
        let mut config = Self::default();
        config.merge_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overrides fields with the values `lookup` returns for the
    /// `NATIVEKEY_*` variable names.
    pub fn merge_with<F>(&mut self, lookup: F) -> NativeKeyResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_PROVIDER_NAME) {
            self.name = name;
        }
        if let Some(fips) = lookup(ENV_FIPS) {
            self.fips = parse_flag(&fips)
                .ok_or(NativeKeyError::InvalidArgument("invalid boolean in NATIVEKEY_FIPS"))?;
        }
        if let Some(algorithm) = lookup(ENV_RANDOM_ALGORITHM) {
            self.random_algorithm = algorithm;
        }
        self.validate()
    }

    /// Rejects empty names.
    pub fn validate(&self) -> NativeKeyResult<()> {
        if self.name.trim().is_empty() {
            Err(NativeKeyError::InvalidArgument("provider name is empty"))?;
        }
        if self.random_algorithm.trim().is_empty() {
            Err(NativeKeyError::InvalidArgument("PRNG algorithm name is empty"))?;
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
