#![allow(unused)]

use bindelta::{apply_patch, create_patch, Compression, Delta};
use rand::prelude::*;
use rand::rngs::StdRng;

/// Compressions available in this build.
pub fn compressions() -> Vec<Compression> {
    let mut all = vec![Compression::None, Compression::Crle];
    if cfg!(feature = "bz2") {
        all.push(Compression::Bz2);
    }
    all
}

pub fn diff(s: &[u8], t: &[u8], compression: Compression) -> bindelta::Result<Vec<u8>> {
    let mut patch = Vec::new();
    Delta::new(s, t).compression(compression).create(&mut patch)?;
    Ok(patch)
}

pub fn check_invertible(s: &[u8], t: &[u8], compression: Compression) {
    let patch = diff(s, t, compression).unwrap();
    let out = apply_patch(s, &patch).unwrap();
    if out != t {
        panic!(
            "not invertible ({}): source {} bytes, target {} bytes",
            compression,
            s.len(),
            t.len()
        );
    }
}

/// Deterministic random buffer with repetitive structure, so that samples
/// exercise both match-heavy and literal-heavy paths.
pub fn random_sample(rng: &mut StdRng, size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        if rng.gen_bool(0.3) && !data.is_empty() {
            // Replay an earlier span.
            let from = rng.gen_range(0, data.len());
            let len = Ord::min(rng.gen_range(1, 64), data.len() - from);
            let span: Vec<u8> = data[from..from + len].to_vec();
            data.extend_from_slice(&span);
        } else if rng.gen_bool(0.2) {
            let len = rng.gen_range(1, 32);
            let byte = rng.gen();
            data.resize(data.len() + len, byte);
        } else {
            let len = rng.gen_range(1, 32);
            for _ in 0..len {
                data.push(rng.gen());
            }
        }
    }
    data.truncate(size);
    data
}

/// Derive a target from a source by random splices: replacements,
/// insertions and deletions of small spans.
pub fn mutate_sample(rng: &mut StdRng, source: &[u8], mutations: usize) -> Vec<u8> {
    let mut data = source.to_vec();
    for _ in 0..mutations {
        let at = if data.is_empty() {
            0
        } else {
            rng.gen_range(0, data.len())
        };
        match rng.gen_range(0, 3) {
            0 => {
                let len = Ord::min(rng.gen_range(1, 16), data.len() - at);
                for slot in data[at..at + len].iter_mut() {
                    *slot = rng.gen();
                }
            }
            1 => {
                let len = rng.gen_range(1, 16);
                let insert: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
                data.splice(at..at, insert);
            }
            _ => {
                let len = Ord::min(rng.gen_range(1, 16), data.len() - at);
                data.splice(at..at + len, std::iter::empty());
            }
        }
    }
    data
}
