//! Name interning: the quark table.
//!
//! A [`SymbolTable`] maps names to dense integer [`Quark`]s so the rest of
//! the runtime can compare and dispatch on small integers instead of hashing
//! strings over and over.
//!
//! # Architecture
//!
//! - Open chaining: each bucket holds a singly-linked chain of nodes
//! - Each node stores its precomputed `FxHash`, so growth never rehashes a
//!   string
//! - Capacity is always prime and grows once occupancy passes 70%
//! - An inverse vector maps quark to name for O(1) [`SymbolTable::qmap`]
//!
//! Quarks are handed out sequentially from 1 and never reused; quark 0 is
//! the empty name. Nothing is ever removed.
//!
//! # Thread Safety
//!
//! One [`Mutex`] guards the whole table, resize included. Interning happens
//! mostly while code is loaded, not on per-operation hot paths, so a single
//! lock is enough.

use crate::error::{Error, Result};
use crate::sync::Mutex;
use fxhash::FxHasher;
use kestrel_log::{debug, trace};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Initial bucket count of [`SymbolTable::new`].
pub const DEFAULT_CAPACITY: usize = 17;

/// Growth threshold: nodes / buckets may not exceed `LOAD_NUM / LOAD_DEN`.
const LOAD_NUM: usize = 7;
const LOAD_DEN: usize = 10;

/// Dense identifier of an interned name.
///
/// `Quark::EMPTY` (0) is the empty name; every other quark was issued by a
/// symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Quark(u32);

impl Quark {
    /// The quark of the empty name.
    pub const EMPTY: Quark = Quark(0);

    /// Wraps a raw quark value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Quark(raw)
    }

    /// Raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Raw value as an index.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns true for the empty-name quark.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Quark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct SymbolNode {
    name: Arc<str>,
    hash: u64,
    quark: Quark,
    /// Next node in the same bucket, as an index into `nodes`.
    next: Option<usize>,
}

struct TableState {
    buckets: Vec<Option<usize>>,
    nodes: Vec<SymbolNode>,
    /// `names[q]` is the name of quark `q`; `names[0]` is "".
    names: Vec<Arc<str>>,
}

impl TableState {
    fn find(&self, name: &str, hash: u64) -> Option<Quark> {
        let mut cursor = self.buckets[bucket_of(hash, self.buckets.len())];
        while let Some(index) = cursor {
            let node = &self.nodes[index];
            if node.hash == hash && *node.name == *name {
                return Some(node.quark);
            }
            cursor = node.next;
        }
        None
    }

    fn over_threshold(&self) -> bool {
        self.nodes.len() * LOAD_DEN > self.buckets.len() * LOAD_NUM
    }

    /// Moves every node into a larger prime-sized bucket array.
    fn grow(&mut self) {
        let capacity = next_prime(self.buckets.len() * 2 + 1);
        let mut buckets = vec![None; capacity];
        for (index, node) in self.nodes.iter_mut().enumerate() {
            let bucket = bucket_of(node.hash, capacity);
            node.next = buckets[bucket];
            buckets[bucket] = Some(index);
        }
        debug!(
            "symbol table grown from {} to {} buckets ({} names)",
            self.buckets.len(),
            capacity,
            self.nodes.len()
        );
        self.buckets = buckets;
    }
}

/// Usage figures of a [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolStats {
    /// Interned names, not counting the empty name.
    pub names: usize,
    /// Bucket count.
    pub capacity: usize,
    /// Length of the longest chain.
    pub longest_chain: usize,
    /// Buckets with no node.
    pub empty_buckets: usize,
}

/// Thread-safe name to quark table.
///
/// # Example
///
/// ```rust
/// use kestrel::runtime::symbol::{Quark, SymbolTable};
///
/// let table = SymbolTable::new();
/// let alpha = table.intern("alpha");
/// assert_eq!(alpha, Quark::new(1));
/// assert_eq!(table.intern("alpha"), alpha);
/// assert_eq!(&*table.qmap(alpha).unwrap(), "alpha");
/// assert_eq!(table.intern(""), Quark::EMPTY);
/// ```
pub struct SymbolTable {
    state: Mutex<TableState>,
}

impl SymbolTable {
    /// Creates a table with [`DEFAULT_CAPACITY`] buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a table with at least `capacity` buckets, rounded up to a
    /// prime.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = next_prime(capacity.max(2));
        SymbolTable {
            state: Mutex::new(TableState {
                buckets: vec![None; capacity],
                nodes: Vec::new(),
                names: vec![Arc::from("")],
            }),
        }
    }

    /// Returns the quark of `name`, issuing a new one on first sight.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` names are interned.
    pub fn intern(&self, name: &str) -> Quark {
        if name.is_empty() {
            return Quark::EMPTY;
        }
        let hash = hash_name(name);

        let mut state = self.state.guard();
        if let Some(quark) = state.find(name, hash) {
            return quark;
        }

        let Ok(raw) = u32::try_from(state.names.len()) else {
            panic!("symbol table exhausted the quark space");
        };
        let quark = Quark(raw);
        let name: Arc<str> = Arc::from(name);
        let bucket = bucket_of(hash, state.buckets.len());
        let index = state.nodes.len();
        let next = state.buckets[bucket];
        state.nodes.push(SymbolNode {
            name: Arc::clone(&name),
            hash,
            quark,
            next,
        });
        state.buckets[bucket] = Some(index);
        state.names.push(name);
        trace!("interned quark {}", quark);

        if state.over_threshold() {
            state.grow();
        }
        quark
    }

    /// Returns the quark of `name` without interning it.
    pub fn lookup(&self, name: &str) -> Option<Quark> {
        if name.is_empty() {
            return Some(Quark::EMPTY);
        }
        let hash = hash_name(name);
        self.state.guard().find(name, hash)
    }

    /// Returns true if `name` has a quark.
    pub fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Returns the name of `quark`.
    ///
    /// # Errors
    ///
    /// `InvalidQuark` if the quark was never issued by this table.
    pub fn qmap(&self, quark: Quark) -> Result<Arc<str>> {
        let state = self.state.guard();
        state
            .names
            .get(quark.as_usize())
            .cloned()
            .ok_or(Error::InvalidQuark {
                quark: quark.as_u32(),
                issued: state.names.len(),
            })
    }

    /// Number of interned names, not counting the empty name.
    pub fn len(&self) -> usize {
        self.state.guard().nodes.len()
    }

    /// Returns true if nothing but the empty name is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current bucket count.
    pub fn capacity(&self) -> usize {
        self.state.guard().buckets.len()
    }

    /// Walks every chain and reports usage figures.
    pub fn stats(&self) -> SymbolStats {
        let state = self.state.guard();
        let mut longest_chain = 0;
        let mut empty_buckets = 0;
        for head in &state.buckets {
            let mut length = 0;
            let mut cursor = *head;
            while let Some(index) = cursor {
                length += 1;
                cursor = state.nodes[index].next;
            }
            if length == 0 {
                empty_buckets += 1;
            }
            longest_chain = longest_chain.max(length);
        }
        SymbolStats {
            names: state.nodes.len(),
            capacity: state.buckets.len(),
            longest_chain,
            empty_buckets,
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.guard();
        f.debug_struct("SymbolTable")
            .field("names", &state.nodes.len())
            .field("capacity", &state.buckets.len())
            .finish()
    }
}

fn hash_name(name: &str) -> u64 {
    let mut hasher = FxHasher::default();
    name.hash(&mut hasher);
    hasher.finish()
}

// Lossless: the remainder is below `capacity`
#[allow(clippy::cast_possible_truncation)]
#[inline]
fn bucket_of(hash: u64, capacity: usize) -> usize {
    (hash % capacity as u64) as usize
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut divisor = 3;
    while divisor * divisor <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    true
}

/// Smallest prime not below `n`.
fn next_prime(n: usize) -> usize {
    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}
