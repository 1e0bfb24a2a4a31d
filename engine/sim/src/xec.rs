// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! OpenSSL-backed XDH keys held by the simulator.
//!
//! Private keys are exported as PKCS#8 and public keys as SubjectPublicKeyInfo
//! DER, which is also what the import paths accept.

use openssl::derive::Deriver;
use openssl::pkey::Id;
use openssl::pkey::PKey;
use openssl::pkey::Private;
use openssl::pkey::Public;

use super::*;

pub(crate) enum SimXecKey {
    Private { curve: XecCurve, pkey: PKey<Private> },
    Public { curve: XecCurve, pkey: PKey<Public> },
}

impl SimXecKey {
    pub(crate) fn generate(curve: XecCurve) -> EngineResult<Self> {
        let pkey = match curve {
            XecCurve::X25519 => PKey::generate_x25519(),
            XecCurve::X448 => PKey::generate_x448(),
        }
        .map_err(native_err)?;

        Ok(SimXecKey::Private { curve, pkey })
    }

    pub(crate) fn from_private_der(der: &[u8]) -> EngineResult<Self> {
        let pkey = PKey::private_key_from_pkcs8(der).map_engine_err(EngineError::InvalidEncoding)?;
        let curve = curve_of(pkey.id())?;
        Ok(SimXecKey::Private { curve, pkey })
    }

    pub(crate) fn from_public_der(der: &[u8]) -> EngineResult<Self> {
        let pkey = PKey::public_key_from_der(der).map_engine_err(EngineError::InvalidEncoding)?;
        let curve = curve_of(pkey.id())?;
        Ok(SimXecKey::Public { curve, pkey })
    }

    pub(crate) fn curve(&self) -> XecCurve {
        match self {
            SimXecKey::Private { curve, .. } | SimXecKey::Public { curve, .. } => *curve,
        }
    }

    pub(crate) fn private_der(&self) -> EngineResult<Option<Vec<u8>>> {
        match self {
            SimXecKey::Private { pkey, .. } => {
                pkey.private_key_to_pkcs8().map(Some).map_err(native_err)
            }
            SimXecKey::Public { .. } => Ok(None),
        }
    }

    pub(crate) fn public_der(&self) -> EngineResult<Option<Vec<u8>>> {
        let der = match self {
            SimXecKey::Private { pkey, .. } => pkey.public_key_to_der(),
            SimXecKey::Public { pkey, .. } => pkey.public_key_to_der(),
        };
        der.map(Some).map_err(native_err)
    }

    /// Computes the shared secret of this private key with `peer`'s public half.
    pub(crate) fn derive(&self, peer: &SimXecKey, secret_len: usize) -> EngineResult<Vec<u8>> {
        let SimXecKey::Private { curve, pkey } = self else {
            tracing::error!("XDH derive requested with a public-only key");
            return Err(EngineError::InvalidHandle);
        };

        if *curve != peer.curve() {
            Err(EngineError::CurveMismatch)?;
        }

        let expected = curve.shared_secret_len();
        if secret_len != expected {
            Err(EngineError::SecretLengthMismatch {
                expected,
                actual: secret_len,
            })?;
        }

        let mut deriver = Deriver::new(pkey).map_err(native_err)?;
        match peer {
            SimXecKey::Private { pkey, .. } => deriver.set_peer(pkey),
            SimXecKey::Public { pkey, .. } => deriver.set_peer(pkey),
        }
        .map_err(native_err)?;

        deriver.derive_to_vec().map_err(native_err)
    }
}

fn curve_of(id: Id) -> EngineResult<XecCurve> {
    if id == Id::X25519 {
        Ok(XecCurve::X25519)
    } else if id == Id::X448 {
        Ok(XecCurve::X448)
    } else {
        Err(EngineError::UnsupportedAlgorithm(format!(
            "pkey id {}",
            id.as_raw()
        )))
    }
}
