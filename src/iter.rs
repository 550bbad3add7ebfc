//! Read-only traversals: common-prefix search, predictive enumeration, and
//! multi-pattern text scanning.

use crate::{idx, Cedar, Probe};

/// Resumable position for [`Cedar::find_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub(crate) node: usize,
    pub(crate) depth: usize,
}

impl Cursor {
    pub fn root() -> Self {
        Self::default()
    }

    /// Node reached so far.
    pub fn node(&self) -> usize {
        self.node
    }

    /// Bytes consumed so far.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// A stored key that is a prefix of the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixMatch {
    pub value: i32,
    /// Length of the matched prefix in bytes.
    pub len: usize,
    pub node: usize,
}

/// A stored key that extends the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub value: i32,
    /// Node of the key's last byte.
    pub node: usize,
    /// Bytes of the key past the query; see [`Cedar::suffix`].
    pub len: usize,
}

/// A stored key found inside scanned text, at `text[begin..end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanMatch {
    pub begin: usize,
    pub end: usize,
    pub value: i32,
}

/// Iterator returned by [`Cedar::prefixes`].
pub struct PrefixIter<'a> {
    cedar: &'a Cedar,
    key: &'a [u8],
    cursor: Cursor,
    pos: usize,
}

impl Iterator for PrefixIter<'_> {
    type Item = PrefixMatch;

    fn next(&mut self) -> Option<PrefixMatch> {
        while self.pos < self.key.len() {
            let byte = &self.key[self.pos..self.pos + 1];
            match self.cedar.find_with(byte, &mut self.cursor) {
                Probe::NoPath => {
                    self.pos = self.key.len();
                }
                Probe::NoValue => {
                    self.pos += 1;
                }
                Probe::Value(value) => {
                    self.pos += 1;
                    return Some(PrefixMatch {
                        value,
                        len: self.pos,
                        node: self.cursor.node,
                    });
                }
            }
        }
        None
    }
}

impl std::iter::FusedIterator for PrefixIter<'_> {}

enum PredictState {
    Start,
    At {
        from: usize,
        len: usize,
        root: usize,
        value: i32,
    },
    Done,
}

/// Iterator returned by [`Cedar::predict`]. Depth-first over the subtree below
/// the query, in child-chain order.
pub struct PredictIter<'a> {
    cedar: &'a Cedar,
    key: &'a [u8],
    state: PredictState,
}

impl Iterator for PredictIter<'_> {
    type Item = Prediction;

    fn next(&mut self) -> Option<Prediction> {
        if let PredictState::Start = self.state {
            let mut cursor = Cursor::root();
            self.state = match self.cedar.find_with(self.key, &mut cursor) {
                Probe::NoPath => PredictState::Done,
                _ => self.cedar.first_leaf(cursor.node, 0, cursor.node),
            };
        }

        match self.state {
            PredictState::At {
                from,
                len,
                root,
                value,
            } => {
                self.state = self.cedar.next_leaf(from, len, root);
                Some(Prediction {
                    value,
                    node: from,
                    len,
                })
            }
            _ => None,
        }
    }
}

impl std::iter::FusedIterator for PredictIter<'_> {}

/// Iterator returned by [`Cedar::scan`].
pub struct ScanIter<'a> {
    cedar: &'a Cedar,
    text: &'a [u8],
    begin: usize,
    cursor: Cursor,
}

impl Iterator for ScanIter<'_> {
    type Item = ScanMatch;

    fn next(&mut self) -> Option<ScanMatch> {
        while self.begin < self.text.len() {
            let mut at = self.begin + self.cursor.depth;
            while at < self.text.len() {
                match self.cedar.find_with(&self.text[at..at + 1], &mut self.cursor) {
                    Probe::NoPath => break,
                    Probe::NoValue => at += 1,
                    Probe::Value(value) => {
                        return Some(ScanMatch {
                            begin: self.begin,
                            end: at + 1,
                            value,
                        });
                    }
                }
            }
            self.begin += 1;
            self.cursor = Cursor::root();
        }
        None
    }
}

impl std::iter::FusedIterator for ScanIter<'_> {}

impl Cedar {
    /// Every stored key that is a prefix of `key`, shortest first.
    pub fn prefixes<'a, K: AsRef<[u8]> + ?Sized>(&'a self, key: &'a K) -> PrefixIter<'a> {
        PrefixIter {
            cedar: self,
            key: key.as_ref(),
            cursor: Cursor::root(),
            pos: 0,
        }
    }

    /// Every stored key that starts with `key`.
    pub fn predict<'a, K: AsRef<[u8]> + ?Sized>(&'a self, key: &'a K) -> PredictIter<'a> {
        PredictIter {
            cedar: self,
            key: key.as_ref(),
            state: PredictState::Start,
        }
    }

    /// Every occurrence of a stored key inside `text`, by start offset, then
    /// by length.
    pub fn scan<'a, K: AsRef<[u8]> + ?Sized>(&'a self, text: &'a K) -> ScanIter<'a> {
        ScanIter {
            cedar: self,
            text: text.as_ref(),
            begin: 0,
            cursor: Cursor::root(),
        }
    }

    /// The last `len` bytes of the path from the root to `node`.
    pub fn suffix(&self, node: usize, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        let mut to = node;
        for slot in out.iter_mut().rev() {
            let from = idx(self.array.check(to));
            *slot = (self.array.base(from) ^ to as i32) as u8;
            to = from;
        }
        out
    }

    /// All stored keys, in enumeration order.
    pub fn keys(&self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.predict(b"").map(move |p| self.suffix(p.node, p.len))
    }

    /// All stored values, in enumeration order.
    pub fn indices(&self) -> impl Iterator<Item = i32> + '_ {
        self.predict(b"").map(|p| p.value)
    }

    pub fn entries(&self) -> impl Iterator<Item = (Vec<u8>, i32)> + '_ {
        self.predict(b"")
            .map(move |p| (self.suffix(p.node, p.len), p.value))
    }

    /// Descends along first children from `from` to the first leaf.
    fn first_leaf(&self, mut from: usize, mut len: usize, root: usize) -> PredictState {
        let mut c = self.infos.child(from);
        if from == 0 {
            // Skip the root's placeholder terminal label.
            c = self.infos.sibling(idx(self.array.base(from) ^ c as i32));
            if c == 0 {
                return PredictState::Done;
            }
        }
        while c != 0 {
            from = idx(self.array.base(from) ^ c as i32);
            c = self.infos.child(from);
            len += 1;
        }
        let value = self.array.base(idx(self.array.base(from) ^ c as i32));
        PredictState::At {
            from,
            len,
            root,
            value,
        }
    }

    /// Climbs from the leaf under `from` to the nearest unvisited sibling and
    /// descends again.
    fn next_leaf(&self, mut from: usize, mut len: usize, root: usize) -> PredictState {
        let mut c = self.infos.sibling(idx(self.array.base(from)));
        while c == 0 && from != root {
            c = self.infos.sibling(from);
            from = idx(self.array.check(from));
            len -= 1;
        }
        if c != 0 {
            let next = idx(self.array.base(from) ^ c as i32);
            self.first_leaf(next, len + 1, root)
        } else {
            PredictState::Done
        }
    }
}
