// Deterministic, portable pseudo-random number generator.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// This is a hand-rolled implementation with zero external dependencies, chosen
// for portability and to guarantee identical output across all platforms.
//
// This crate is the single source of randomness for the Rhythmweave engine.
// Every (bar, role) selection call derives its own stream via `for_purpose`,
// a pure function of (master seed, role, bar, purpose tag). No stream is ever
// shared between calls, which is what makes parallel fan-out across bars and
// roles safe without sacrificing reproducibility.
//
// **Critical constraint: determinism.** Every method on `WeaveRng` must
// produce identical output given the same prior state, regardless of
// platform, compiler version, or optimization level. Do not use
// floating-point arithmetic in the core generator, stdlib PRNG, or any
// source of non-determinism in this module.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG — the engine's sole source of randomness.
///
/// Each selection call owns exactly one `WeaveRng`, derived from the master
/// seed and the call's identity. Two streams derived with the same key
/// produce identical output sequences.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeaveRng {
    s: [u64; 4],
}

impl WeaveRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Derive the stream for one engine decision.
    ///
    /// Pure function of the key: folds the role name, bar number, and purpose
    /// tag into the master seed via FNV-1a hashing and SplitMix64 mixing.
    /// Any change to any key component decorrelates the stream; identical
    /// keys always reproduce the identical sequence. There is no hidden
    /// global RNG — every call site constructs its own stream.
    pub fn for_purpose(master_seed: u64, role: &str, bar: u32, purpose: &str) -> Self {
        let mut key = master_seed ^ fnv1a64(role.as_bytes());
        splitmix64(&mut key);
        key ^= u64::from(bar);
        splitmix64(&mut key);
        key ^= fnv1a64(purpose.as_bytes());
        Self::new(splitmix64(&mut key))
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a uniform `f64` in [0, 1).
    ///
    /// Uses the upper 53 bits of a `u64` to fill the mantissa of an f64.
    /// 53 bits gives full f64 precision (IEEE 754 double has a 52-bit
    /// mantissa + 1 implicit bit).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// SplitMix64 — used for seeding xoshiro256++ and for key folding.
///
/// This is the standard recommendation from the xoshiro authors for
/// expanding a small seed into a larger state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// FNV-1a over a byte slice. Used only to fold string key components (role
/// name, purpose tag) into the stream-derivation key. Stable by definition;
/// never use a stdlib hasher here (its output may vary across versions).
fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
