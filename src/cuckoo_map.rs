//! CuckooMap: bucketized two-choice cuckoo hashing over opaque records.
//!
//! Layout: two parallel bucket arrays (`2^shift` buckets of 8 slots each)
//! addressed by two independently seeded hash values, plus a fixed 8-slot
//! stash. Entries live in a slotmap arena; bucket slots hold arena keys,
//! so displacement moves an index and never relocates entry bytes.
//!
//! Reads are bounded: a probe scans one bucket per table and the stash,
//! in that order. Writes pay for that bound with a displacement walk —
//! a full bucket evicts its tail occupant, the evicted item moves to its
//! bucket in the other table, and so on for at most `ALPHA * shift`
//! rounds. Budget overruns land in the stash; a full stash hands control
//! to the resize/rehash controller, which re-seeds and re-places the
//! whole arena, escalating to a capacity doubling when a capacity's
//! retry budget is spent.
//!
//! The public type is a thin facade holding the debug reentrancy guard;
//! the engine lives in `Core` so the guard's permit and the engine's
//! `&mut` methods never fight over the same borrow.

use crate::entry::{Entry, Geometry};
use crate::error::MapError;
use crate::guard::CallGuard;
use crate::policy::{BytesPolicy, NulStrPolicy, Policy};
use crate::seed::Seed;
use rand::rngs::OsRng;
use rand::RngCore;
use slotmap::{DefaultKey, SlotMap};

/// Slots per bucket.
pub const BUCKET_SIZE: usize = 8;
/// Overflow stash capacity.
pub const STASH_SIZE: usize = 8;
/// Initial capacity exponent: each table starts at `2^INITIAL_SHIFT`
/// buckets.
const INITIAL_SHIFT: u32 = 4;
/// Displacement budget multiplier: a walk runs `ALPHA * shift` rounds.
const ALPHA: u32 = 4;
/// Re-seed passes attempted per capacity before escalating to growth.
const REHASH_RETRY_LIMIT: u32 = 16;

type EntryRef = DefaultKey;
type Bucket = [Option<EntryRef>; BUCKET_SIZE];

const EMPTY_BUCKET: Bucket = [None; BUCKET_SIZE];

/// A bucketized two-choice cuckoo hash map over opaque fixed-size keys and
/// values, with hash/equality/copy behavior supplied by a [`Policy`].
///
/// Single-threaded and non-reentrant: mutating operations take `&mut
/// self`, and a value returned by [`lookup`](Self::lookup) borrows the
/// map, so the borrow checker enforces the "view is valid until the next
/// mutation" contract. In debug builds a guard additionally panics if a
/// policy callback reenters the map.
///
/// Insert is idempotent and non-overwriting: inserting a key that is
/// already present succeeds without touching the stored value.
pub struct CuckooMap<P: Policy = BytesPolicy, R: RngCore = OsRng> {
    guard: CallGuard,
    core: Core<P, R>,
}

impl CuckooMap {
    /// Map over fixed-width binary records with the default policy and OS
    /// randomness. Fails on zero sizes or a non-power-of-two alignment.
    pub fn new(key_size: usize, value_size: usize, alignment: usize) -> Result<Self, MapError> {
        Self::with_policy_and_rng(key_size, value_size, alignment, BytesPolicy, OsRng)
    }
}

impl CuckooMap<NulStrPolicy> {
    /// Map over NUL-terminated string keys and values with the given
    /// maximum lengths (byte-aligned storage, bounded copies).
    pub fn for_nul_strings(max_key_len: usize, max_value_len: usize) -> Result<Self, MapError> {
        Self::with_policy_and_rng(max_key_len, max_value_len, 1, NulStrPolicy, OsRng)
    }
}

impl<P: Policy, R: RngCore> CuckooMap<P, R> {
    /// Fully injected constructor: custom policy and randomness source.
    /// Tests pass a seeded `StdRng` here to reproduce exact displacement
    /// and rehash sequences.
    pub fn with_policy_and_rng(
        key_size: usize,
        value_size: usize,
        alignment: usize,
        policy: P,
        rng: R,
    ) -> Result<Self, MapError> {
        Ok(Self {
            guard: CallGuard::new(),
            core: Core::new(key_size, value_size, alignment, policy, rng)?,
        })
    }

    /// Insert a key/value pair. `Ok` means the key is now present —
    /// whether this call stored it or an earlier one did; an existing
    /// entry is never overwritten. Errors are argument validation and
    /// allocation failure only, and leave the map unchanged.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), MapError> {
        let _permit = self.guard.acquire();
        self.core.insert(key, value)
    }

    /// Borrowed view of the value stored for `key`. The view aliases map
    /// storage and is invalidated by the next mutating call.
    pub fn lookup(&self, key: &[u8]) -> Option<&[u8]> {
        let _permit = self.guard.acquire();
        self.core.lookup(key)
    }

    /// Copy the value stored for `key` into `dst` through the policy's
    /// value writer. `dst` must hold [`value_size`](Self::value_size)
    /// bytes for the default policy. Returns false if the key is absent.
    pub fn lookup_into(&self, key: &[u8], dst: &mut [u8]) -> bool {
        let _permit = self.guard.acquire();
        match self.core.lookup(key) {
            Some(value) => {
                self.core.policy.write_value(dst, value);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.lookup(key).is_some()
    }

    /// Remove the entry for `key`, freeing its storage. False if absent.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let _permit = self.guard.acquire();
        self.core.remove(key)
    }

    /// Number of live entries across both tables and the stash.
    pub fn len(&self) -> usize {
        self.core.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.entries.is_empty()
    }

    pub fn key_size(&self) -> usize {
        self.core.geo.key_size()
    }

    pub fn value_size(&self) -> usize {
        self.core.geo.value_size()
    }

    pub fn alignment(&self) -> usize {
        self.core.geo.alignment()
    }

    /// Visit every live (key, value) byte pair. Order is unspecified and
    /// changes across mutations.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            it: self.core.entries.iter(),
            geo: self.core.geo,
        }
    }
}

/// Iterator over the stored (key, value) byte regions of a map.
pub struct Iter<'a> {
    it: slotmap::basic::Iter<'a, EntryRef, Entry>,
    geo: Geometry,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(_, e)| (e.key_bytes(&self.geo), e.value_bytes(&self.geo)))
    }
}

/// Engine state: bucket arrays, stash, seeds, entry arena.
struct Core<P, R> {
    geo: Geometry,
    policy: P,
    rng: R,
    seeds: [Seed; 2],
    tables: [Vec<Bucket>; 2],
    stash: [Option<EntryRef>; STASH_SIZE],
    entries: SlotMap<EntryRef, Entry>,
    shift: u32,
    // Eviction trail of the walk in flight, for rewinding a failed walk.
    walk_log: Vec<(usize, usize)>,
}

/// State captured before a fallible controller run; restoring it puts the
/// map back exactly as the caller left it.
struct Snapshot {
    tables: [Vec<Bucket>; 2],
    stash: [Option<EntryRef>; STASH_SIZE],
    seeds: [Seed; 2],
    shift: u32,
}

fn alloc_buckets(count: usize) -> Result<Vec<Bucket>, MapError> {
    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(count)
        .map_err(|_| MapError::AllocationFailed {
            size: count * std::mem::size_of::<Bucket>(),
            align: std::mem::align_of::<Bucket>(),
        })?;
    buckets.resize(count, EMPTY_BUCKET);
    Ok(buckets)
}

/// Insert `item` into `bucket`: first free slot if any, else evict the
/// tail occupant, shift the rest toward the tail and write `item` at the
/// front. Returns the evicted occupant.
fn place_in_bucket(bucket: &mut Bucket, item: EntryRef) -> Option<EntryRef> {
    if let Some(slot) = bucket.iter_mut().find(|slot| slot.is_none()) {
        *slot = Some(item);
        return None;
    }
    let evicted = bucket[BUCKET_SIZE - 1];
    bucket.copy_within(0..BUCKET_SIZE - 1, 1);
    bucket[0] = Some(item);
    evicted
}

fn clear_slot(slots: &mut [Option<EntryRef>], item: EntryRef) -> bool {
    for slot in slots.iter_mut() {
        if *slot == Some(item) {
            *slot = None;
            return true;
        }
    }
    false
}

impl<P: Policy, R: RngCore> Core<P, R> {
    fn new(
        key_size: usize,
        value_size: usize,
        alignment: usize,
        policy: P,
        mut rng: R,
    ) -> Result<Self, MapError> {
        let geo = Geometry::new(key_size, value_size, alignment)?;
        let seeds = [Seed::generate(&mut rng), Seed::generate(&mut rng)];
        let buckets = 1usize << INITIAL_SHIFT;
        let tables = [alloc_buckets(buckets)?, alloc_buckets(buckets)?];
        Ok(Self {
            geo,
            policy,
            rng,
            seeds,
            tables,
            stash: [None; STASH_SIZE],
            entries: SlotMap::with_key(),
            shift: INITIAL_SHIFT,
            walk_log: Vec::new(),
        })
    }

    #[inline]
    fn mask(&self) -> u64 {
        (1u64 << self.shift) - 1
    }

    #[inline]
    fn max_iterations(&self) -> u32 {
        ALPHA * self.shift
    }

    fn total_slots(&self) -> usize {
        2 * (1usize << self.shift) * BUCKET_SIZE
    }

    fn should_grow(&self) -> bool {
        2 * self.entries.len() >= self.total_slots()
    }

    /// Bucket index for a caller-supplied key in table `which`.
    fn bucket_index(&self, which: usize, key: &[u8]) -> usize {
        (self.policy.hash(key, &self.seeds[which]) & self.mask()) as usize
    }

    /// Bucket index for a stored entry in table `which`.
    fn bucket_of(&self, which: usize, item: EntryRef) -> usize {
        let key = self.entries[item].key_bytes(&self.geo);
        (self.policy.hash(key, &self.seeds[which]) & self.mask()) as usize
    }

    fn scan(&self, slots: &[Option<EntryRef>], key: &[u8]) -> Option<EntryRef> {
        slots.iter().filter_map(|slot| *slot).find(|&item| {
            self.entries
                .get(item)
                .map(|e| self.policy.eq(key, e.key_bytes(&self.geo)))
                .unwrap_or(false)
        })
    }

    /// Two bucket scans plus the stash; first equality match wins. The
    /// residency invariant guarantees at most one match exists.
    fn probe(&self, key: &[u8]) -> Option<EntryRef> {
        for which in 0..2 {
            let b = self.bucket_index(which, key);
            if let Some(item) = self.scan(&self.tables[which][b], key) {
                return Some(item);
            }
        }
        self.scan(&self.stash, key)
    }

    fn lookup(&self, key: &[u8]) -> Option<&[u8]> {
        if self.policy.check_key(key, self.geo.key_size()).is_err() {
            return None;
        }
        let item = self.probe(key)?;
        Some(self.entries[item].value_bytes(&self.geo))
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), MapError> {
        self.policy.check_key(key, self.geo.key_size())?;
        self.policy.check_value(value, self.geo.value_size())?;

        if self.probe(key).is_some() {
            // Non-overwriting: the first value stored for a key wins.
            return Ok(());
        }

        if self.should_grow() {
            self.rebuild(true)?;
        }

        let mut entry = Entry::alloc(&self.geo)?;
        self.policy.write_key(entry.key_bytes_mut(&self.geo), key);
        self.policy.write_value(entry.value_bytes_mut(&self.geo), value);
        let item = self.entries.insert(entry);

        // Stash residents get a chance to move back into the tables first;
        // the walk below may need the free stash slots.
        self.drain_stash();

        if let Some(leftover) = self.run_walk(item) {
            // Walk budget and stash both exhausted. Rewind the walk so
            // every prior entry is placed again, then let the controller
            // find a layout with room for all of them.
            let recovered = self.unwind_walk(leftover);
            debug_assert_eq!(recovered, item);
            if let Err(e) = self.rebuild(false) {
                self.entries.remove(item);
                return Err(e);
            }
        }

        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> bool {
        if self.policy.check_key(key, self.geo.key_size()).is_err() {
            return false;
        }
        let Some(item) = self.probe(key) else {
            return false;
        };
        // Clear whichever slot holds it: h0 bucket, h1 bucket, or stash.
        let b0 = self.bucket_of(0, item);
        if !clear_slot(&mut self.tables[0][b0], item) {
            let b1 = self.bucket_of(1, item);
            if !clear_slot(&mut self.tables[1][b1], item) {
                let cleared = clear_slot(&mut self.stash, item);
                debug_assert!(cleared, "probe hit must occupy a slot");
            }
        }
        self.entries.remove(item);
        true
    }

    /// Drive one displacement walk for `item`: alternate between the
    /// tables, evicting bucket tails, until a free slot absorbs the
    /// traveling item or the budget runs out; the stash then absorbs the
    /// straggler if it can. Returns the item still in hand when even the
    /// stash is full. Every eviction is recorded in `walk_log` so a failed
    /// walk can be rewound.
    fn run_walk(&mut self, mut item: EntryRef) -> Option<EntryRef> {
        self.walk_log.clear();
        for _ in 0..self.max_iterations() {
            for which in 0..2 {
                let b = self.bucket_of(which, item);
                match place_in_bucket(&mut self.tables[which][b], item) {
                    None => return None,
                    Some(evicted) => {
                        self.walk_log.push((which, b));
                        item = evicted;
                    }
                }
            }
        }
        for slot in self.stash.iter_mut() {
            if slot.is_none() {
                *slot = Some(item);
                return None;
            }
        }
        Some(item)
    }

    /// Undo the evictions of the walk just run, in reverse: the traveler
    /// leaves the bucket front, occupants shift back, and the previously
    /// evicted tail returns. Returns the item the walk started with, now
    /// unplaced; every other entry is back in the slot it held before.
    fn unwind_walk(&mut self, mut leftover: EntryRef) -> EntryRef {
        let log = std::mem::take(&mut self.walk_log);
        for &(which, b) in log.iter().rev() {
            let bucket = &mut self.tables[which][b];
            let entered = bucket[0].take();
            bucket.copy_within(1.., 0);
            bucket[BUCKET_SIZE - 1] = Some(leftover);
            leftover = entered.expect("walk log records an eviction at this bucket");
        }
        self.walk_log = log;
        leftover
    }

    /// Re-place stash residents into the tables where the current seeds
    /// allow it. Membership is preserved: a walk that fails parks its
    /// traveler in the slot freed here.
    fn drain_stash(&mut self) {
        for i in 0..STASH_SIZE {
            if let Some(item) = self.stash[i].take() {
                if let Some(back) = self.run_walk(item) {
                    self.stash[i] = Some(back);
                }
            }
        }
    }

    /// Resize/rehash controller. `grow_first` doubles capacity up front
    /// (load-factor trigger); otherwise growth happens only as escalation
    /// once a capacity's re-seed budget is spent. On allocation failure
    /// the state captured at entry is restored, so the map is exactly as
    /// the caller left it.
    fn rebuild(&mut self, grow_first: bool) -> Result<(), MapError> {
        let snapshot = self.capture();
        match self.rebuild_inner(grow_first) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.restore(snapshot);
                Err(e)
            }
        }
    }

    fn rebuild_inner(&mut self, grow_first: bool) -> Result<(), MapError> {
        if grow_first {
            self.grow()?;
        }
        loop {
            for _ in 0..REHASH_RETRY_LIMIT {
                if self.rehash_pass() {
                    return Ok(());
                }
            }
            // These seeds keep failing for the current key set; escalate
            // to more room instead of retrying forever.
            self.grow()?;
        }
    }

    /// One full re-seed and re-place pass. Placement runs over the arena,
    /// so entries are never lost regardless of how a previous pass ended.
    fn rehash_pass(&mut self) -> bool {
        self.seeds[0].refill(&mut self.rng);
        self.seeds[1].refill(&mut self.rng);
        for table in &mut self.tables {
            table.fill(EMPTY_BUCKET);
        }
        self.stash = [None; STASH_SIZE];

        let items: Vec<EntryRef> = self.entries.keys().collect();
        for item in items {
            if self.run_walk(item).is_some() {
                return false;
            }
        }
        true
    }

    /// Double both bucket arrays, preserving contents at their old
    /// indices. The caller must rehash afterwards: the mask is wider now.
    fn grow(&mut self) -> Result<(), MapError> {
        let new_shift = self.shift + 1;
        let new_len = 1usize << new_shift;
        let mut grown = [alloc_buckets(new_len)?, alloc_buckets(new_len)?];
        for (new, old) in grown.iter_mut().zip(self.tables.iter()) {
            new[..old.len()].copy_from_slice(old);
        }
        self.tables = grown;
        self.shift = new_shift;
        Ok(())
    }

    fn capture(&self) -> Snapshot {
        Snapshot {
            tables: [self.tables[0].clone(), self.tables[1].clone()],
            stash: self.stash,
            seeds: [self.seeds[0].clone(), self.seeds[1].clone()],
            shift: self.shift,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.tables = snapshot.tables;
        self.stash = snapshot.stash;
        self.seeds = snapshot.seeds;
        self.shift = snapshot.shift;
    }
}
