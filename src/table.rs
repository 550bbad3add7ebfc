//! Growable fixed-record tables over a flat little-endian byte buffer.
//!
//! Every trie table (nodes, node infos, blocks, reject histogram) is a
//! [`Table`] of one [`Record`] type. Records are never materialised in memory
//! as structs: fields are read and written in place at fixed byte offsets, so
//! the buffer is exactly what the snapshot format stores.

use std::marker::PhantomData;

/// Records added by [`Table::push`] when the table is full.
const GROW_STEP: usize = 64;

/// Size of the `{byte_len, len, cap}` metadata triple.
pub(crate) const TABLE_META_LEN: usize = 12;

/// A fixed-size record stored in a [`Table`].
pub(crate) trait Record: Copy {
    /// Record size in bytes.
    const UNIT: usize;

    fn write(&self, out: &mut [u8]);
}

/// Fixed-record byte table.
///
/// `len` counts live records; `cap` counts records the buffer was sized for.
/// Indexed access is only valid below `len`.
#[derive(Clone)]
pub(crate) struct Table<R: Record> {
    data: Vec<u8>,
    len: usize,
    cap: usize,
    _marker: PhantomData<R>,
}

impl<R: Record> Table<R> {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            data: vec![0u8; cap * R::UNIT],
            len: 0,
            cap,
            _marker: PhantomData,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Marks every allocated record as live.
    pub(crate) fn fill_to_capacity(&mut self) {
        self.len = self.cap;
    }

    pub(crate) fn push(&mut self, record: R) {
        if self.len >= self.cap {
            self.grow(GROW_STEP);
        }
        let off = self.len * R::UNIT;
        record.write(&mut self.data[off..off + R::UNIT]);
        self.len += 1;
    }

    fn grow(&mut self, more: usize) {
        self.data.resize(self.data.len() + more * R::UNIT, 0);
        self.cap += more;
    }

    /// Resizes to `new_len` records, all live. Records from the old `len`
    /// onward are overwritten with `init`.
    pub(crate) fn resize(&mut self, new_len: usize, init: R) {
        let old_len = self.len;
        self.data.resize(new_len * R::UNIT, 0);
        self.len = new_len;
        self.cap = new_len;
        for i in old_len..new_len {
            let off = i * R::UNIT;
            init.write(&mut self.data[off..off + R::UNIT]);
        }
    }

    pub(crate) fn set(&mut self, index: usize, record: R) {
        let off = self.offset(index);
        record.write(&mut self.data[off..off + R::UNIT]);
    }

    #[inline]
    fn offset(&self, index: usize) -> usize {
        let off = index * R::UNIT;
        assert!(
            index < self.len && off + R::UNIT <= self.data.len(),
            "table index {index} out of bounds (len {})",
            self.len
        );
        off
    }

    #[inline]
    pub(crate) fn i32_at(&self, index: usize, field: usize) -> i32 {
        let at = self.offset(index) + field;
        i32::from_le_bytes([
            self.data[at],
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
        ])
    }

    #[inline]
    pub(crate) fn set_i32(&mut self, index: usize, field: usize, v: i32) {
        let at = self.offset(index) + field;
        self.data[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub(crate) fn i16_at(&self, index: usize, field: usize) -> i16 {
        let at = self.offset(index) + field;
        i16::from_le_bytes([self.data[at], self.data[at + 1]])
    }

    #[inline]
    pub(crate) fn set_i16(&mut self, index: usize, field: usize, v: i16) {
        let at = self.offset(index) + field;
        self.data[at..at + 2].copy_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub(crate) fn u8_at(&self, index: usize, field: usize) -> u8 {
        self.data[self.offset(index) + field]
    }

    #[inline]
    pub(crate) fn set_u8(&mut self, index: usize, field: usize, v: u8) {
        let at = self.offset(index) + field;
        self.data[at] = v;
    }

    /// Writes `{byte_len, len, cap}` at `at`; returns the next offset.
    pub(crate) fn write_meta(&self, out: &mut [u8], at: usize) -> usize {
        out[at..at + 4].copy_from_slice(&(self.data.len() as i32).to_le_bytes());
        out[at + 4..at + 8].copy_from_slice(&(self.len as i32).to_le_bytes());
        out[at + 8..at + 12].copy_from_slice(&(self.cap as i32).to_le_bytes());
        at + TABLE_META_LEN
    }

    /// Builds an empty-bodied table from a metadata triple. The buffer is
    /// zeroed and must be filled with [`Table::load_data`].
    pub(crate) fn from_meta(byte_len: usize, len: usize, cap: usize) -> Self {
        Self {
            data: vec![0u8; byte_len],
            len,
            cap,
            _marker: PhantomData,
        }
    }

    pub(crate) fn load_data(&mut self, src: &[u8]) {
        self.data.copy_from_slice(src);
    }

    /// Rounds `offset` up to a multiple of the record size.
    pub(crate) fn align(offset: usize) -> usize {
        offset.div_ceil(R::UNIT) * R::UNIT
    }
}

impl<R: Record> PartialEq for Table<R> {
    fn eq(&self, other: &Self) -> bool {
        self.cap == other.cap && self.len == other.len && self.data == other.data
    }
}

impl<R: Record> Eq for Table<R> {}

impl<R: Record> std::fmt::Debug for Table<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("unit", &R::UNIT)
            .field("len", &self.len)
            .field("cap", &self.cap)
            .field("byte_len", &self.data.len())
            .finish()
    }
}
