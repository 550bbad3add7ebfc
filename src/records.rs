//! Record layouts of the four trie tables and their field accessors.

use crate::table::{Record, Table};

/// Nodes per block.
pub(crate) const BLOCK_SIZE: usize = 256;

/// Base/check pair.
///
/// Occupied: `check` is the parent id and `base` either a stored value (terminal
/// node) or the XOR offset of the node's children. Free: both hold negated
/// links of the block's circular free list (`base = -prev`, `check = -next`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Node {
    pub base: i32,
    pub check: i32,
}

impl Node {
    const BASE: usize = 0;
    const CHECK: usize = 4;
}

impl Record for Node {
    const UNIT: usize = 8;

    fn write(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.base.to_le_bytes());
        out[4..8].copy_from_slice(&self.check.to_le_bytes());
    }
}

impl Table<Node> {
    #[inline]
    pub(crate) fn base(&self, i: usize) -> i32 {
        self.i32_at(i, Node::BASE)
    }

    #[inline]
    pub(crate) fn check(&self, i: usize) -> i32 {
        self.i32_at(i, Node::CHECK)
    }

    #[inline]
    pub(crate) fn node(&self, i: usize) -> Node {
        Node {
            base: self.base(i),
            check: self.check(i),
        }
    }

    #[inline]
    pub(crate) fn set_base(&mut self, i: usize, base: i32) {
        self.set_i32(i, Node::BASE, base);
    }

    #[inline]
    pub(crate) fn set_check(&mut self, i: usize, check: i32) {
        self.set_i32(i, Node::CHECK, check);
    }
}

/// Child/sibling labels. `child` is the first child label of a node, `sibling`
/// the next label under the same parent; 0 ends a chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct NodeInfo {
    pub sibling: u8,
    pub child: u8,
}

impl NodeInfo {
    const SIBLING: usize = 0;
    const CHILD: usize = 1;
}

impl Record for NodeInfo {
    const UNIT: usize = 2;

    fn write(&self, out: &mut [u8]) {
        out[0] = self.sibling;
        out[1] = self.child;
    }
}

impl Table<NodeInfo> {
    #[inline]
    pub(crate) fn sibling(&self, i: usize) -> u8 {
        self.u8_at(i, NodeInfo::SIBLING)
    }

    #[inline]
    pub(crate) fn child(&self, i: usize) -> u8 {
        self.u8_at(i, NodeInfo::CHILD)
    }

    #[inline]
    pub(crate) fn set_sibling(&mut self, i: usize, label: u8) {
        self.set_u8(i, NodeInfo::SIBLING, label);
    }

    #[inline]
    pub(crate) fn set_child(&mut self, i: usize, label: u8) {
        self.set_u8(i, NodeInfo::CHILD, label);
    }
}

/// Per-block bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Block {
    /// Previous block in this block's class list.
    pub prev: i32,
    /// Next block in this block's class list.
    pub next: i32,
    /// Free nodes in the block.
    pub num: i16,
    /// Smallest label-set size known not to fit; larger sets skip the block.
    pub reject: i16,
    /// Failed multi-slot placements since the block last gained a free node.
    pub trial: i32,
    /// First node of the block's free ring.
    pub head: i32,
}

impl Block {
    const PREV: usize = 0;
    const NEXT: usize = 4;
    const NUM: usize = 8;
    const REJECT: usize = 10;
    const TRIAL: usize = 12;
    const HEAD: usize = 16;
}

impl Default for Block {
    fn default() -> Self {
        Self {
            prev: 0,
            next: 0,
            num: BLOCK_SIZE as i16,
            reject: BLOCK_SIZE as i16 + 1,
            trial: 0,
            head: 0,
        }
    }
}

impl Record for Block {
    const UNIT: usize = 20;

    fn write(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.prev.to_le_bytes());
        out[4..8].copy_from_slice(&self.next.to_le_bytes());
        out[8..10].copy_from_slice(&self.num.to_le_bytes());
        out[10..12].copy_from_slice(&self.reject.to_le_bytes());
        out[12..16].copy_from_slice(&self.trial.to_le_bytes());
        out[16..20].copy_from_slice(&self.head.to_le_bytes());
    }
}

impl Table<Block> {
    #[inline]
    pub(crate) fn prev(&self, b: usize) -> i32 {
        self.i32_at(b, Block::PREV)
    }

    #[inline]
    pub(crate) fn next(&self, b: usize) -> i32 {
        self.i32_at(b, Block::NEXT)
    }

    #[inline]
    pub(crate) fn num(&self, b: usize) -> i16 {
        self.i16_at(b, Block::NUM)
    }

    #[inline]
    pub(crate) fn reject(&self, b: usize) -> i16 {
        self.i16_at(b, Block::REJECT)
    }

    #[inline]
    pub(crate) fn trial(&self, b: usize) -> i32 {
        self.i32_at(b, Block::TRIAL)
    }

    #[inline]
    pub(crate) fn head(&self, b: usize) -> i32 {
        self.i32_at(b, Block::HEAD)
    }

    #[inline]
    pub(crate) fn set_prev(&mut self, b: usize, v: i32) {
        self.set_i32(b, Block::PREV, v);
    }

    #[inline]
    pub(crate) fn set_next(&mut self, b: usize, v: i32) {
        self.set_i32(b, Block::NEXT, v);
    }

    #[inline]
    pub(crate) fn set_num(&mut self, b: usize, v: i16) {
        self.set_i16(b, Block::NUM, v);
    }

    #[inline]
    pub(crate) fn set_reject(&mut self, b: usize, v: i16) {
        self.set_i16(b, Block::REJECT, v);
    }

    #[inline]
    pub(crate) fn set_trial(&mut self, b: usize, v: i32) {
        self.set_i32(b, Block::TRIAL, v);
    }

    #[inline]
    pub(crate) fn set_head(&mut self, b: usize, v: i32) {
        self.set_i32(b, Block::HEAD, v);
    }
}

/// Entry of the reject histogram: the smallest rejected label-set size seen
/// for a block with a given number of free nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Reject(pub i16);

impl Record for Reject {
    const UNIT: usize = 2;

    fn write(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.0.to_le_bytes());
    }
}

impl Table<Reject> {
    #[inline]
    pub(crate) fn at(&self, num: usize) -> i16 {
        self.i16_at(num, 0)
    }

    #[inline]
    pub(crate) fn set_at(&mut self, num: usize, v: i16) {
        self.set_i16(num, 0, v);
    }
}
