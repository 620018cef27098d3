//! cuckoo-hashmap: A single-threaded map over opaque fixed-size records,
//! built on bucketized two-choice cuckoo hashing with a bounded overflow
//! stash and randomized re-seeding.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: bounded worst-case reads (one bucket per table plus a small
//!   stash) paid for by amortized-but-bounded work on writes, over keys
//!   and values the engine never interprets itself.
//! - Layers:
//!   - entry: storage — one aligned heap block per record,
//!     `[key][padding][value]`; the crate's `unsafe` is confined here.
//!   - policy: hash/equality/copy bundles that make the engine generic
//!     over key representation (fixed-width binary by default,
//!     NUL-terminated strings as the bundled alternative).
//!   - seed: two opaque random word buffers parameterizing the hash
//!     families; regenerated on rehash, drawn from an injected
//!     `rand::RngCore` so tests can replay exact sequences.
//!   - cuckoo_map: the engine — two bucket arrays, displacement walks,
//!     the stash, and the resize/rehash controller — behind a thin
//!     facade that holds the debug reentrancy guard.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` by construction.
//! - Entries are owned exclusively by the map and referenced from bucket
//!   slots through stable slotmap keys; displacement moves indices, not
//!   bytes, and a record is freed exactly once.
//! - Insert is idempotent and non-overwriting; duplicate keys cannot
//!   coexist.
//! - Lookup returns a borrowed view; any later mutation invalidates it,
//!   which the borrow checker enforces at compile time.
//! - Once constructed, the only runtime failure `insert` can report is
//!   allocation failure, and the map is left in its prior valid state.
//!
//! Why this split?
//! - Localize invariants: the walk and the controller can be reasoned
//!   about purely in terms of slot contents; byte-level concerns stop at
//!   the entry module; policies never see map internals.
//! - Clear failure boundaries: policies are the only caller code the
//!   engine runs, and a debug-only guard panics if one reenters the map
//!   while its state is transiently inconsistent.
//!
//! Rehash and termination
//! - Displacement failure is absorbed by the stash; a full stash triggers
//!   a re-seeded full rehash. Re-seeding retries are capped per capacity
//!   and escalate to a capacity doubling, so the controller cannot loop
//!   forever on an unlucky key set.
//!
//! The crate also carries two small independent collaborators from the
//! same lineage: slice-based binary-heap primitives (`heap`) and a
//! CSR-style adjacency graph (`graph`). They share nothing with the map
//! beyond the house style.

pub mod cuckoo_map;
mod cuckoo_map_proptest;
mod entry;
pub mod error;
pub mod graph;
mod guard;
pub mod heap;
pub mod policy;
pub mod seed;

// Public surface
pub use cuckoo_map::{CuckooMap, Iter, BUCKET_SIZE, STASH_SIZE};
pub use error::MapError;
pub use policy::{BytesPolicy, NulStrPolicy, Policy};
pub use seed::Seed;
