//! Block classes, per-block free rings, and slot placement.
//!
//! Every block of 256 nodes belongs to exactly one class list (block 0 is
//! never listed):
//!
//! - **Open**: two or more free nodes and still worth probing for multi-slot
//!   placements.
//! - **Closed**: one free node, or too many failed probes.
//! - **Full**: no free nodes.
//!
//! Each list is circular and doubly linked through `Block::{prev, next}`; a
//! head of 0 means the list is empty. Free nodes of a block form a circular
//! ring through negated `base`/`check` links.

use std::time::Instant;

use tracing::debug;

use crate::records::{Block, Node, NodeInfo, BLOCK_SIZE};
use crate::{idx, Cedar};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlockClass {
    Open,
    Closed,
    Full,
}

impl Cedar {
    fn head_of(&self, class: BlockClass) -> i32 {
        match class {
            BlockClass::Open => self.head_open,
            BlockClass::Closed => self.head_closed,
            BlockClass::Full => self.head_full,
        }
    }

    fn head_of_mut(&mut self, class: BlockClass) -> &mut i32 {
        match class {
            BlockClass::Open => &mut self.head_open,
            BlockClass::Closed => &mut self.head_closed,
            BlockClass::Full => &mut self.head_full,
        }
    }

    fn pop_block(&mut self, bi: i32, class: BlockClass, last: bool) {
        if last {
            *self.head_of_mut(class) = 0;
            return;
        }
        let b = idx(bi);
        let prev = self.blocks.prev(b);
        let next = self.blocks.next(b);
        self.blocks.set_next(idx(prev), next);
        self.blocks.set_prev(idx(next), prev);
        let head = self.head_of_mut(class);
        if bi == *head {
            *head = next;
        }
    }

    fn push_block(&mut self, bi: i32, class: BlockClass, empty: bool) {
        let b = idx(bi);
        if empty {
            self.blocks.set_next(b, bi);
            self.blocks.set_prev(b, bi);
        } else {
            let head = self.head_of(class);
            let tail = self.blocks.prev(idx(head));
            self.blocks.set_prev(b, tail);
            self.blocks.set_next(b, head);
            self.blocks.set_next(idx(tail), bi);
            self.blocks.set_prev(idx(head), bi);
        }
        *self.head_of_mut(class) = bi;
    }

    pub(crate) fn transfer_block(&mut self, bi: i32, from: BlockClass, to: BlockClass) {
        let last = bi == self.blocks.next(idx(bi));
        // A block emptied into Full is linked after the Full head even when the
        // list is empty; block 0 then stands in as the sentinel head.
        let empty = self.head_of(to) == 0 && self.blocks.num(idx(bi)) != 0;
        self.pop_block(bi, from, last);
        self.push_block(bi, to, empty);
    }

    /// Appends a fresh block of free nodes, doubling the tables when full.
    /// Returns the new block's index.
    pub(crate) fn add_block(&mut self) -> i32 {
        if self.size == self.capacity {
            let started = Instant::now();
            self.capacity += self.capacity;
            self.array.resize(self.capacity, Node { base: 0, check: 0 });
            self.infos.resize(self.capacity, NodeInfo::default());
            self.blocks.resize(self.capacity / BLOCK_SIZE, Block::default());
            let elapsed = started.elapsed();
            self.stall += elapsed;
            debug!(
                capacity = self.capacity,
                elapsed_us = elapsed.as_micros() as u64,
                "grew trie tables"
            );
        }

        let size = self.size as i32;
        let last = size + BLOCK_SIZE as i32 - 1;
        let b = self.size / BLOCK_SIZE;
        self.blocks.set_head(b, size);
        self.array.set(
            self.size,
            Node {
                base: -last,
                check: -(size + 1),
            },
        );
        for i in size + 1..last {
            self.array.set(
                idx(i),
                Node {
                    base: -(i - 1),
                    check: -(i + 1),
                },
            );
        }
        self.array.set(
            idx(last),
            Node {
                base: -(last - 1),
                check: -size,
            },
        );

        let empty = self.head_open == 0;
        self.push_block(b as i32, BlockClass::Open, empty);
        self.size += BLOCK_SIZE;
        b as i32
    }

    /// A free node for a single label.
    pub(crate) fn find_place(&mut self) -> i32 {
        if self.head_closed != 0 {
            return self.blocks.head(idx(self.head_closed));
        }
        if self.head_open != 0 {
            return self.blocks.head(idx(self.head_open));
        }
        self.add_block() << 8
    }

    /// A base offset `e ^ labels[0]` at which every label of `labels` lands on
    /// a free node, probing Open blocks in list order. Returns that `e`.
    pub(crate) fn find_places(&mut self, labels: &[u8]) -> i32 {
        debug_assert!(labels.len() > 1);
        let mut bi = self.head_open;
        if bi != 0 {
            let last = self.blocks.prev(idx(self.head_open));
            let nc = labels.len() as i16;
            loop {
                let b = idx(bi);
                if self.blocks.num(b) >= nc && nc < self.blocks.reject(b) {
                    let mut e = self.blocks.head(b);
                    loop {
                        let base = e ^ labels[0] as i32;
                        let mut i = 1;
                        while self.array.check(idx(base ^ labels[i] as i32)) < 0 {
                            if i == labels.len() - 1 {
                                self.blocks.set_head(b, e);
                                return e;
                            }
                            i += 1;
                        }
                        e = -self.array.check(idx(e));
                        if e == self.blocks.head(b) {
                            break;
                        }
                    }
                }

                self.blocks.set_reject(b, nc);
                let num = self.blocks.num(b) as usize;
                if nc < self.reject.at(num) {
                    self.reject.set_at(num, nc);
                }
                let next = self.blocks.next(b);
                let trial = self.blocks.trial(b) + 1;
                self.blocks.set_trial(b, trial);
                if trial == self.max_trial {
                    self.transfer_block(bi, BlockClass::Open, BlockClass::Closed);
                }
                if bi == last {
                    break;
                }
                bi = next;
            }
        }
        self.add_block() << 8
    }

    /// Takes a free node for `label` under `from` and occupies it.
    ///
    /// With `base < 0` the parent has no children yet: a slot is chosen by
    /// [`Cedar::find_place`] and the parent's base set to match.
    pub(crate) fn pop_e_node(&mut self, base: i32, label: u8, from: i32) -> i32 {
        let e = if base < 0 {
            self.find_place()
        } else {
            base ^ label as i32
        };
        let b = idx(e >> 8);
        let n = self.array.node(idx(e));
        let num = self.blocks.num(b) - 1;
        self.blocks.set_num(b, num);
        if num == 0 {
            if b != 0 {
                self.transfer_block(b as i32, BlockClass::Closed, BlockClass::Full);
            }
        } else {
            self.array.set_check(idx(-n.base), n.check);
            self.array.set_base(idx(-n.check), n.base);
            if e == self.blocks.head(b) {
                self.blocks.set_head(b, -n.check);
            }
            if b != 0 && num == 1 && self.blocks.trial(b) != self.max_trial {
                self.transfer_block(b as i32, BlockClass::Open, BlockClass::Closed);
            }
        }

        self.array.set(
            idx(e),
            Node {
                base: if label != 0 { -1 } else { 0 },
                check: from,
            },
        );
        if base < 0 {
            self.array.set_base(idx(from), e ^ label as i32);
        }
        e
    }

    /// Returns node `e` to its block's free ring.
    pub(crate) fn push_e_node(&mut self, e: i32) {
        let b = idx(e >> 8);
        let num = self.blocks.num(b) + 1;
        self.blocks.set_num(b, num);
        if num == 1 {
            self.blocks.set_head(b, e);
            self.array.set(idx(e), Node { base: -e, check: -e });
            if b != 0 {
                self.transfer_block(b as i32, BlockClass::Full, BlockClass::Closed);
            }
        } else {
            let prev = self.blocks.head(b);
            let next = -self.array.check(idx(prev));
            self.array.set(
                idx(e),
                Node {
                    base: -prev,
                    check: -next,
                },
            );
            self.array.set_check(idx(prev), -e);
            self.array.set_base(idx(next), -e);
            if b != 0 && (num == 2 || self.blocks.trial(b) == self.max_trial) {
                self.transfer_block(b as i32, BlockClass::Closed, BlockClass::Open);
            }
            self.blocks.set_trial(b, 0);
        }

        let floor = self.reject.at(num as usize);
        if self.blocks.reject(b) < floor {
            self.blocks.set_reject(b, floor);
        }
        self.infos.set(idx(e), NodeInfo::default());
    }
}
