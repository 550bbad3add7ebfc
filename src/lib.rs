//! # cedar-rs
//!
//! An efficiently-updatable double-array trie (the "cedar" layout): a compact
//! byte-keyed map from keys to `i32` values supporting exact lookup,
//! common-prefix search, predictive (subtree) enumeration, multi-pattern text
//! scanning, insertion, deletion, and a flat binary snapshot format.
//!
//! Nodes live in one flat array of `(base, check)` pairs. A transition from
//! node `s` on byte `c` leads to `t = base[s] ^ c`, valid iff `check[t] == s`.
//! Free nodes are threaded through per-block free lists, and blocks of 256
//! nodes are classified Open/Closed/Full to speed up placement.
//!
//! ## Example
//!
//! ```rust
//! use cedar_rs::{Cedar, Probe};
//!
//! let mut cedar = Cedar::new();
//! cedar.build(&["a", "ab", "abc"]).unwrap();
//!
//! assert_eq!(cedar.find("ab"), Probe::Value(1));
//! assert_eq!(cedar.find("abcd"), Probe::NoPath);
//!
//! let values: Vec<i32> = cedar.prefixes("abcdefg").map(|m| m.value).collect();
//! assert_eq!(values, vec![0, 1, 2]);
//!
//! let image = cedar.serialize();
//! let copy = Cedar::deserialize(&image).unwrap();
//! assert!(cedar.compare(&copy));
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod block;
mod codec;
mod config;
mod engine;
mod error;
mod iter;
mod records;
mod shared;
mod table;

pub use codec::FIELD_OVERHEAD;
pub use config::Config;
pub use error::{CedarError, Result};
pub use iter::{Cursor, PredictIter, Prediction, PrefixIter, PrefixMatch, ScanIter, ScanMatch};
pub use shared::SharedCedar;

use std::time::Duration;

use records::{Block, Node, NodeInfo, Reject, BLOCK_SIZE};
use table::Table;

/// Marks "path exists but no value". Cannot be stored.
pub const NO_VALUE: i32 = -1;

/// Outcome of walking a key through the trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Some byte of the key has no transition.
    NoPath,
    /// The key is a path in the trie but no value ends there.
    NoValue,
    /// The key is stored with this value.
    Value(i32),
}

impl Probe {
    pub fn value(self) -> Option<i32> {
        match self {
            Probe::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// A stored key found by [`Cedar::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupHit {
    pub value: i32,
    /// Node reached by the key's last byte.
    pub node: usize,
}

/// Byte sizes of the trie's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub nodes: usize,
    pub infos: usize,
    pub blocks: usize,
    pub reject: usize,
    /// Length of the serialized image.
    pub image: usize,
    /// Time spent reallocating tables on growth.
    pub stall: Duration,
}

/// Converts a non-negative node, block, or link value to an index.
#[inline]
pub(crate) fn idx(v: i32) -> usize {
    debug_assert!(v >= 0, "negative index {v}");
    v as usize
}

// =============================================================================
// Cedar
// =============================================================================

/// Double-array trie mapping byte keys to `i32` values.
///
/// Keys must be non-empty and must not contain byte 0, which labels the
/// terminal transition holding a key's value.
#[derive(Clone)]
pub struct Cedar {
    pub(crate) array: Table<Node>,
    pub(crate) infos: Table<NodeInfo>,
    pub(crate) blocks: Table<Block>,
    pub(crate) reject: Table<Reject>,
    pub(crate) head_full: i32,
    pub(crate) head_closed: i32,
    pub(crate) head_open: i32,
    pub(crate) capacity: usize,
    pub(crate) size: usize,
    pub(crate) ordered: bool,
    pub(crate) max_trial: i32,
    pub(crate) stall: Duration,
}

impl Cedar {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// # Panics
    /// Panics if `config.max_trial < 1`.
    pub fn with_config(config: Config) -> Self {
        assert!(config.max_trial >= 1, "max_trial must be at least 1");

        let mut array: Table<Node> = Table::new(BLOCK_SIZE);
        let mut infos: Table<NodeInfo> = Table::new(BLOCK_SIZE);
        infos.fill_to_capacity();
        let mut blocks: Table<Block> = Table::new(1);
        blocks.push(Block::default());
        let mut reject: Table<Reject> = Table::new(BLOCK_SIZE + 1);
        for j in 0..=BLOCK_SIZE as i16 {
            reject.push(Reject(j + 1));
        }

        array.push(Node { base: 0, check: -1 });
        for i in 1..BLOCK_SIZE as i32 {
            array.push(Node {
                base: -(i - 1),
                check: -(i + 1),
            });
        }
        // Close nodes 1..=255 into a ring.
        array.set_base(1, -(BLOCK_SIZE as i32 - 1));
        array.set_check(BLOCK_SIZE - 1, -1);

        // The root occupies node 0, so block 0 starts one short.
        blocks.set_num(0, BLOCK_SIZE as i16 - 1);
        blocks.set_head(0, 1);

        Self {
            array,
            infos,
            blocks,
            reject,
            head_full: 0,
            head_closed: 0,
            head_open: 0,
            capacity: BLOCK_SIZE,
            size: BLOCK_SIZE,
            ordered: config.ordered,
            max_trial: config.max_trial,
            stall: Duration::ZERO,
        }
    }

    pub fn config(&self) -> Config {
        Config {
            ordered: self.ordered,
            max_trial: self.max_trial,
        }
    }

    /// True when no key is stored.
    pub fn is_empty(&self) -> bool {
        // Label 0 at the root is a placeholder whose sibling is the first real
        // root label.
        self.infos.sibling(0) == 0
    }

    /// Inserts `key` or overwrites its value. Returns the stored value.
    pub fn update(&mut self, key: impl AsRef<[u8]>, value: i32) -> Result<i32> {
        let key = key.as_ref();
        if value == NO_VALUE {
            return Err(CedarError::ReservedValue);
        }
        if key.is_empty() {
            return Err(CedarError::EmptyKey);
        }
        if let Some(position) = key.iter().position(|&b| b == 0) {
            return Err(CedarError::NulByte { position });
        }

        let mut from = 0usize;
        for &label in key {
            from = idx(self.follow(from, label));
        }
        let to = self.follow(from, 0);
        self.array.set_base(idx(to), value);
        Ok(value)
    }

    /// Inserts every key with its position in `keys` as value.
    pub fn build<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<()> {
        for (i, key) in keys.iter().enumerate() {
            self.update(key, i as i32)?;
        }
        Ok(())
    }

    pub fn find(&self, key: impl AsRef<[u8]>) -> Probe {
        self.find_with(key.as_ref(), &mut Cursor::root())
    }

    /// Walks `key` starting at `cursor`, advancing it over every matched byte.
    ///
    /// On [`Probe::NoPath`] the cursor stays on the last node reached. To search
    /// a sub-range of a buffer, pass the slice.
    pub fn find_with(&self, key: &[u8], cursor: &mut Cursor) -> Probe {
        for &label in key {
            if label == 0 {
                return Probe::NoPath;
            }
            let base = self.array.base(cursor.node);
            if base < 0 {
                return Probe::NoPath;
            }
            let to = base ^ label as i32;
            if self.array.check(idx(to)) != cursor.node as i32 {
                return Probe::NoPath;
            }
            cursor.node = idx(to);
            cursor.depth += 1;
        }

        let base = self.array.base(cursor.node);
        if base < 0 {
            return Probe::NoValue;
        }
        let terminal = self.array.node(idx(base));
        if terminal.check != cursor.node as i32 {
            Probe::NoValue
        } else {
            Probe::Value(terminal.base)
        }
    }

    pub fn lookup(&self, key: impl AsRef<[u8]>) -> Option<LookupHit> {
        let mut cursor = Cursor::root();
        let value = self.find_with(key.as_ref(), &mut cursor).value()?;
        Some(LookupHit {
            value,
            node: cursor.node,
        })
    }

    /// Removes `key`, returning its value. Absent keys leave the trie untouched.
    pub fn erase(&mut self, key: impl AsRef<[u8]>) -> Option<i32> {
        let mut cursor = Cursor::root();
        let value = self.find_with(key.as_ref(), &mut cursor).value()?;
        self.erase_from(cursor.node);
        Some(value)
    }

    /// Deep structural equality: scalars, then every table byte for byte.
    pub fn compare(&self, other: &Cedar) -> bool {
        self == other
    }

    pub fn allocation(&self) -> Allocation {
        Allocation {
            nodes: self.array.byte_len(),
            infos: self.infos.byte_len(),
            blocks: self.blocks.byte_len(),
            reject: self.reject.byte_len(),
            image: self.serialized_len(),
            stall: self.stall,
        }
    }
}

impl Default for Cedar {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Cedar {
    fn eq(&self, other: &Self) -> bool {
        self.head_full == other.head_full
            && self.head_closed == other.head_closed
            && self.head_open == other.head_open
            && self.capacity == other.capacity
            && self.size == other.size
            && self.ordered == other.ordered
            && self.max_trial == other.max_trial
            && self.array == other.array
            && self.infos == other.infos
            && self.blocks == other.blocks
            && self.reject == other.reject
    }
}

impl Eq for Cedar {}

impl std::fmt::Debug for Cedar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cedar")
            .field("size", &self.size)
            .field("capacity", &self.capacity)
            .field("ordered", &self.ordered)
            .field("max_trial", &self.max_trial)
            .field("head_open", &self.head_open)
            .field("head_closed", &self.head_closed)
            .field("head_full", &self.head_full)
            .finish()
    }
}


#[cfg(test)]
mod proptests;
