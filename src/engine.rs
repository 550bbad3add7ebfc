//! Transitions, sibling chains, collision resolution, and erasure.

use smallvec::SmallVec;
use tracing::trace;

use crate::{idx, Cedar};

/// Labels of one node's children, in chain order.
type Labels = SmallVec<[u8; 64]>;

/// Where a label in a sibling chain is referenced from.
#[derive(Clone, Copy)]
enum Link {
    /// `child` field of the parent.
    Child(usize),
    /// `sibling` field of the preceding child.
    Sibling(usize),
}

impl Cedar {
    fn set_link(&mut self, link: Link, label: u8) {
        match link {
            Link::Child(ix) => self.infos.set_child(ix, label),
            Link::Sibling(ix) => self.infos.set_sibling(ix, label),
        }
    }

    /// Node reached from `from` on `label`, creating it if needed.
    pub(crate) fn follow(&mut self, from: usize, label: u8) -> i32 {
        let base = self.array.base(from);
        if base < 0 || self.array.check(idx(base ^ label as i32)) < 0 {
            let to = self.pop_e_node(base, label, from as i32);
            self.push_sibling(from, to ^ label as i32, label, base >= 0);
            to
        } else {
            let to = base ^ label as i32;
            if self.array.check(idx(to)) != from as i32 {
                self.resolve(from, base, label)
            } else {
                to
            }
        }
    }

    /// Links `label` into the child chain of `from`, whose children sit at
    /// `base`.
    pub(crate) fn push_sibling(&mut self, from: usize, base: i32, label: u8, has_child: bool) {
        let first = self.infos.child(from);
        let keep_order = if self.ordered {
            label > first
        } else {
            first == 0
        };

        let mut link = Link::Child(from);
        let mut c = first;
        if has_child && keep_order {
            loop {
                let ix = idx(base ^ c as i32);
                link = Link::Sibling(ix);
                c = self.infos.sibling(ix);
                if !(self.ordered && c != 0 && c < label) {
                    break;
                }
            }
        }
        self.set_link(link, label);
        self.infos.set_sibling(idx(base ^ label as i32), c);
    }

    /// Unlinks `label` from the child chain of `from`.
    pub(crate) fn pop_sibling(&mut self, from: usize, base: i32, label: u8) {
        let mut link = Link::Child(from);
        let mut c = self.infos.child(from);
        while c != label {
            let ix = idx(base ^ c as i32);
            link = Link::Sibling(ix);
            c = self.infos.sibling(ix);
        }
        let next = self.infos.sibling(idx(base ^ label as i32));
        self.set_link(link, next);
    }

    /// Walks both child chains in lockstep. True when the chain at `base_p`
    /// is the longer one, so the node at `base_n` should move instead.
    fn consult(&self, base_n: i32, base_p: i32, mut c_n: u8, mut c_p: u8) -> bool {
        loop {
            c_n = self.infos.sibling(idx(base_n ^ c_n as i32));
            c_p = self.infos.sibling(idx(base_p ^ c_p as i32));
            if c_n == 0 || c_p == 0 {
                break;
            }
        }
        c_p != 0
    }

    /// Child labels of a chain starting at `c`, with `label` spliced in when
    /// `not_terminal`.
    fn collect_labels(&self, base: i32, mut c: u8, label: u8, not_terminal: bool) -> Labels {
        let mut labels = Labels::new();
        if c == 0 {
            labels.push(c);
            c = self.infos.sibling(idx(base ^ c as i32));
        }
        if self.ordered {
            while c != 0 && c <= label {
                labels.push(c);
                c = self.infos.sibling(idx(base ^ c as i32));
            }
        }
        if not_terminal {
            labels.push(label);
        }
        while c != 0 {
            labels.push(c);
            c = self.infos.sibling(idx(base ^ c as i32));
        }
        labels
    }

    /// Handles `base_n ^ label_n` being owned by another parent. Relocates the
    /// children of whichever parent has fewer and returns the node now
    /// reached from `from_n` on `label_n`.
    fn resolve(&mut self, mut from_n: usize, base_n: i32, label_n: u8) -> i32 {
        let to_pn = base_n ^ label_n as i32;
        let from_p = self.array.check(idx(to_pn));
        let base_p = self.array.base(idx(from_p));

        let move_new = self.consult(
            base_n,
            base_p,
            self.infos.child(from_n),
            self.infos.child(idx(from_p)),
        );
        let labels = if move_new {
            self.collect_labels(base_n, self.infos.child(from_n), label_n, true)
        } else {
            self.collect_labels(base_p, self.infos.child(idx(from_p)), 255, false)
        };
        trace!(
            from = from_n,
            owner = from_p,
            moved = labels.len(),
            move_new,
            "resolving base collision"
        );

        let place = if labels.len() == 1 {
            self.find_place()
        } else {
            self.find_places(&labels)
        };
        let base = place ^ labels[0] as i32;

        let (from, base_old) = if move_new {
            (from_n as i32, base_n)
        } else {
            (from_p, base_p)
        };
        if move_new && labels[0] == label_n {
            self.infos.set_child(idx(from), label_n);
        }
        self.array.set_base(idx(from), base);

        for (i, &label) in labels.iter().enumerate() {
            let to = self.pop_e_node(base, label, from);
            let to_old = base_old ^ label as i32;
            let next = labels.get(i + 1).copied().unwrap_or(0);
            self.infos.set_sibling(idx(to), next);
            if move_new && to_old == to_pn {
                continue;
            }

            let moved = self.array.base(idx(to_old));
            self.array.set_base(idx(to), moved);
            if moved > 0 && label != 0 {
                let mut c = self.infos.child(idx(to_old));
                self.infos.set_child(idx(to), c);
                loop {
                    let ix = idx(moved ^ c as i32);
                    self.array.set_check(ix, to);
                    c = self.infos.sibling(ix);
                    if c == 0 {
                        break;
                    }
                }
            }

            if !move_new && to_old == from_n as i32 {
                from_n = idx(to);
            }
            if !move_new && to_old == to_pn {
                self.push_sibling(from_n, to_pn ^ label_n as i32, label_n, true);
                self.infos.set_child(idx(to_old), 0);
                self.array
                    .set_base(idx(to_old), if label_n != 0 { -1 } else { 0 });
                self.array.set_check(idx(to_old), from_n as i32);
            } else {
                self.push_e_node(to_old);
            }
        }

        if move_new {
            base ^ label_n as i32
        } else {
            to_pn
        }
    }

    /// Frees the terminal under `from` and every ancestor left childless.
    pub(crate) fn erase_from(&mut self, mut from: usize) {
        let mut e = self.array.base(from);
        loop {
            let base = self.array.base(from);
            let has_sibling = self.infos.sibling(idx(base ^ self.infos.child(from) as i32)) != 0;
            if has_sibling {
                self.pop_sibling(from, base, (base ^ e) as u8);
            }
            self.push_e_node(e);
            if has_sibling {
                break;
            }
            e = from as i32;
            from = idx(self.array.check(from));
        }
    }
}
