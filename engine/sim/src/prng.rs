// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Simulated PRNG streams.
//!
//! `SHA256DRBG` and `SHA512DRBG` run a hash chain over an internal state `v`
//! seeded from the operating system; every request and every reseed advances
//! `v`. `CHACHA20` wraps [`ChaCha20Rng`] and is refused in FIPS contexts.

use openssl::sha::Sha256;
use openssl::sha::Sha512;
use rand::rngs::OsRng;
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use zeroize::Zeroize;
use zeroize::Zeroizing;

use super::*;

const INITIAL_ENTROPY_LEN: usize = 48;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StreamAlgo {
    Sha256Drbg,
    Sha512Drbg,
    ChaCha20,
}

impl StreamAlgo {
    pub(crate) fn from_name(name: &str) -> EngineResult<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SHA256DRBG" => Ok(StreamAlgo::Sha256Drbg),
            "SHA512DRBG" => Ok(StreamAlgo::Sha512Drbg),
            "CHACHA20" => Ok(StreamAlgo::ChaCha20),
            _ => Err(EngineError::UnsupportedAlgorithm(name.to_owned())),
        }
    }

    pub(crate) fn fips_approved(self) -> bool {
        matches!(self, StreamAlgo::Sha256Drbg | StreamAlgo::Sha512Drbg)
    }
}

enum StreamState {
    HashChain { v: Zeroizing<Vec<u8>>, counter: u64 },
    ChaCha(Box<ChaCha20Rng>),
}

pub(crate) struct SimStream {
    algo: StreamAlgo,
    state: StreamState,
}

impl SimStream {
    pub(crate) fn new(algo: StreamAlgo) -> EngineResult<Self> {
        let state = match algo {
            StreamAlgo::Sha256Drbg | StreamAlgo::Sha512Drbg => {
                let mut entropy = Zeroizing::new([0u8; INITIAL_ENTROPY_LEN]);
                OsRng
                    .try_fill_bytes(&mut entropy[..])
                    .map_engine_err(EngineError::Native("OS entropy unavailable".into()))?;
                StreamState::HashChain {
                    v: digest(algo, &[&[0x00], &entropy[..]]),
                    counter: 0,
                }
            }
            StreamAlgo::ChaCha20 => {
                let rng = ChaCha20Rng::from_rng(OsRng)
                    .map_engine_err(EngineError::Native("OS entropy unavailable".into()))?;
                StreamState::ChaCha(Box::new(rng))
            }
        };

        Ok(Self { algo, state })
    }

    pub(crate) fn algo(&self) -> StreamAlgo {
        self.algo
    }

    pub(crate) fn fill(&mut self, buf: &mut [u8]) {
        let algo = self.algo;
        match &mut self.state {
            StreamState::HashChain { v, counter } => {
                for chunk in buf.chunks_mut(digest_len(algo)) {
                    let block = digest(algo, &[&[0x01], v.as_slice(), &counter.to_be_bytes()]);
                    chunk.copy_from_slice(&block[..chunk.len()]);
                    *counter = counter.wrapping_add(1);
                }
                *v = digest(algo, &[&[0x02], v.as_slice(), &counter.to_be_bytes()]);
            }
            StreamState::ChaCha(rng) => rng.fill_bytes(buf),
        }
    }

    pub(crate) fn reseed(&mut self, seed: &[u8]) {
        let algo = self.algo;
        match &mut self.state {
            StreamState::HashChain { v, .. } => {
                *v = digest(algo, &[&[0x03], v.as_slice(), seed]);
            }
            StreamState::ChaCha(rng) => {
                let mut current = [0u8; 32];
                rng.fill_bytes(&mut current);
                let mut hasher = Sha256::new();
                hasher.update(&current);
                hasher.update(seed);
                current.zeroize();
                **rng = ChaCha20Rng::from_seed(hasher.finish());
            }
        }
    }
}

fn digest_len(algo: StreamAlgo) -> usize {
    match algo {
        StreamAlgo::Sha512Drbg => 64,
        _ => 32,
    }
}

fn digest(algo: StreamAlgo, parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
    match algo {
        StreamAlgo::Sha512Drbg => {
            let mut hasher = Sha512::new();
            parts.iter().for_each(|part| hasher.update(part));
            Zeroizing::new(hasher.finish().to_vec())
        }
        _ => {
            let mut hasher = Sha256::new();
            parts.iter().for_each(|part| hasher.update(part));
            Zeroizing::new(hasher.finish().to_vec())
        }
    }
}
