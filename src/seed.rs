//! Seed buffers parameterizing the two hash families.
//!
//! Each map owns two seeds, one per table. A seed is an opaque buffer of
//! random 64-bit words; policies are free to interpret it as mixing
//! constants (the default binary policy) or as a byte-indexed tabulation
//! table (the string policy). Both seeds are regenerated whenever a rehash
//! is triggered — fresh seeds are what lets the map escape an unlucky
//! collision pattern for the current key set.
//!
//! Randomness is injected: the map is generic over `rand::RngCore`, so
//! production maps draw from `OsRng` while tests pass a seeded `StdRng`
//! and reproduce exact displacement and rehash sequences.

use rand::RngCore;

/// Words per seed buffer: 1 KiB, wide enough for a byte-indexed
/// tabulation table.
pub const SEED_WORDS: usize = 128;

/// Opaque random buffer feeding a [`Policy`](crate::policy::Policy) hash.
#[derive(Clone)]
pub struct Seed {
    words: Box<[u64; SEED_WORDS]>,
}

impl Seed {
    /// Fresh seed drawn from `rng`.
    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        let mut seed = Self {
            words: Box::new([0; SEED_WORDS]),
        };
        seed.refill(rng);
        seed
    }

    /// Overwrite every word with fresh randomness.
    pub fn refill<R: RngCore>(&mut self, rng: &mut R) {
        for w in self.words.iter_mut() {
            *w = rng.next_u64();
        }
    }

    /// Word at `i`, wrapping modulo the buffer length. The wrap lets
    /// policies index directly by byte value.
    #[inline]
    pub fn word(&self, i: usize) -> u64 {
        self.words[i & (SEED_WORDS - 1)]
    }
}
