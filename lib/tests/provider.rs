// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod common;

use common::*;
use nativekey::*;
use test_with_tracing::test;

fn config(fips: bool, random_algorithm: &str) -> ProviderConfig {
    ProviderConfig {
        fips,
        random_algorithm: random_algorithm.to_owned(),
        ..Default::default()
    }
}

#[test]
fn test_provider_opens_context() {
    let engine = CountingEngine::new();
    let provider = Provider::new(engine.clone(), ProviderConfig::default()).unwrap();

    assert_eq!(provider.name(), "nativekey");
    assert!(!provider.is_fips());
    assert!(provider.context().id().is_valid());
    assert_eq!(provider.config(), &ProviderConfig::default());

    let key = XecKey::generate_key_pair(provider.context(), XecCurve::X25519).unwrap();
    assert!(key.context().same_as(provider.context()));
}

#[test]
fn test_provider_rejects_invalid_config() {
    let engine = CountingEngine::new();

    let result = Provider::new(engine.clone(), config(false, ""));
    assert!(matches!(result, Err(NativeKeyError::InvalidArgument(_))));
    assert_eq!(engine.calls.total(), 0);
}

#[test]
fn test_secure_random_honors_user_stream() {
    let engine = CountingEngine::new();
    let provider = Provider::new(engine.clone(), config(false, "SHA512DRBG")).unwrap();

    let user = RandomStream::create(provider.context(), "CHACHA20").unwrap();
    let user_handle = user.native_handle().unwrap();
    let chosen = provider.secure_random(Some(user)).unwrap();
    assert_eq!(chosen.native_handle().unwrap(), user_handle);
    assert_eq!(chosen.algorithm(), "CHACHA20");

    let fresh = provider.secure_random(None).unwrap();
    assert_eq!(fresh.algorithm(), "SHA512DRBG");
}

#[test]
fn test_secure_random_in_fips_mode_ignores_user_stream() {
    let engine = CountingEngine::new();
    let provider = Provider::new(engine.clone(), config(true, "SHA256DRBG")).unwrap();
    assert!(provider.is_fips());

    let user = RandomStream::create(provider.context(), "SHA512DRBG").unwrap();
    let user_handle = user.native_handle().unwrap();

    let chosen = provider.secure_random(Some(user)).unwrap();
    assert_ne!(chosen.native_handle().unwrap(), user_handle);
    assert_eq!(chosen.algorithm(), "SHA256DRBG");
}

#[test]
fn test_context_closed_after_last_object() {
    let engine = CountingEngine::new();
    let reclaimer = Reclaimer::new();
    let context = Context::open_with_reclaimer(engine.clone(), false, reclaimer.clone()).unwrap();
    let key = XecKey::generate_key_pair(&context, XecCurve::X25519).unwrap();

    drop(context);
    reclaimer.flush();
    assert_eq!(count(&engine.calls.close_context), 0);
    assert!(key.public_encoding().unwrap().is_some());

    drop(key);
    reclaimer.flush();
    assert_eq!(count(&engine.calls.delete_handle), 1);
    assert_eq!(count(&engine.calls.close_context), 1);
}
