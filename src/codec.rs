//! Flat little-endian snapshot format.
//!
//! ```text
//! [0..28)   head_closed, head_open, head_full, capacity, size, ordered, max_trial (i32 each)
//! [28..76)  {byte_len, len, cap} for nodes, infos, blocks, reject
//! [76..92)  byte offsets of the four sections
//! [92..96)  reserved, zero
//! [96..)    node section, then infos, blocks, reject; each section starts
//!           at a multiple of its record size
//! ```

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::error::{CedarError, Result};
use crate::records::{Block, Node, NodeInfo, Reject};
use crate::table::{Record, Table, TABLE_META_LEN};
use crate::Cedar;

/// Header bytes before the node section.
pub const FIELD_OVERHEAD: usize = 96;

const META_LEN: usize = 28;
const TABLES_AT: usize = META_LEN;
const OFFSETS_AT: usize = TABLES_AT + 4 * TABLE_META_LEN;

struct Sections {
    nodes: usize,
    infos: usize,
    blocks: usize,
    reject: usize,
    end: usize,
}

impl Cedar {
    fn sections(&self) -> Sections {
        let nodes = FIELD_OVERHEAD;
        let infos = Table::<NodeInfo>::align(nodes + self.array.byte_len());
        let blocks = Table::<Block>::align(infos + self.infos.byte_len());
        let reject = Table::<Reject>::align(blocks + self.blocks.byte_len());
        let end = reject + self.reject.byte_len();
        Sections {
            nodes,
            infos,
            blocks,
            reject,
            end,
        }
    }

    /// Exact length of the image [`Cedar::serialize`] produces.
    pub fn serialized_len(&self) -> usize {
        self.sections().end
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.serialized_len()];
        self.write_image(&mut out, &self.sections());
        out
    }

    /// Writes the image into the front of `out`, returning its length.
    pub fn serialize_to(&self, out: &mut [u8]) -> Result<usize> {
        let sections = self.sections();
        if out.len() < sections.end {
            return Err(CedarError::BufferTooSmall {
                needed: sections.end,
                available: out.len(),
            });
        }
        let out = &mut out[..sections.end];
        out.fill(0);
        self.write_image(out, &sections);
        Ok(sections.end)
    }

    fn write_image(&self, out: &mut [u8], s: &Sections) {
        let meta = [
            self.head_closed,
            self.head_open,
            self.head_full,
            self.capacity as i32,
            self.size as i32,
            self.ordered as i32,
            self.max_trial,
        ];
        for (i, v) in meta.iter().enumerate() {
            put_i32(out, i * 4, *v);
        }

        let mut at = TABLES_AT;
        at = self.array.write_meta(out, at);
        at = self.infos.write_meta(out, at);
        at = self.blocks.write_meta(out, at);
        self.reject.write_meta(out, at);

        for (i, off) in [s.nodes, s.infos, s.blocks, s.reject].iter().enumerate() {
            put_i32(out, OFFSETS_AT + i * 4, *off as i32);
        }

        copy_section(out, s.nodes, &self.array);
        copy_section(out, s.infos, &self.infos);
        copy_section(out, s.blocks, &self.blocks);
        copy_section(out, s.reject, &self.reject);
    }

    /// Rebuilds a trie from an image. The result compares equal to the trie
    /// that produced it.
    pub fn deserialize(bytes: &[u8]) -> Result<Cedar> {
        let head_closed = get_i32(bytes, 0)?;
        let head_open = get_i32(bytes, 4)?;
        let head_full = get_i32(bytes, 8)?;
        let capacity = get_len(bytes, 12, "capacity")?;
        let size = get_len(bytes, 16, "size")?;
        let ordered = get_i32(bytes, 20)? != 0;
        let max_trial = get_i32(bytes, 24)?;

        let array = read_table::<Node>(bytes, 0)?;
        let infos = read_table::<NodeInfo>(bytes, 1)?;
        let blocks = read_table::<Block>(bytes, 2)?;
        let reject = read_table::<Reject>(bytes, 3)?;

        Ok(Cedar {
            array,
            infos,
            blocks,
            reject,
            head_full,
            head_closed,
            head_open,
            capacity,
            size,
            ordered,
            max_trial,
            stall: Default::default(),
        })
    }

    /// Writes the image to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let image = self.serialize();
        std::fs::write(path, &image)?;
        debug!(path = %path.display(), bytes = image.len(), "saved trie snapshot");
        Ok(())
    }

    /// Loads an image written by [`Cedar::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Cedar> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the map is read once into owned tables and dropped before
        // returning; the file is not expected to change meanwhile.
        let map = unsafe { Mmap::map(&file)? };
        let cedar = Cedar::deserialize(&map)?;
        debug!(path = %path.display(), bytes = map.len(), size = cedar.size, "loaded trie snapshot");
        Ok(cedar)
    }
}

fn put_i32(out: &mut [u8], at: usize, v: i32) {
    out[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn get_i32(bytes: &[u8], at: usize) -> Result<i32> {
    let raw = bytes.get(at..at + 4).ok_or(CedarError::Truncated {
        needed: at + 4,
        available: bytes.len(),
    })?;
    Ok(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn get_len(bytes: &[u8], at: usize, field: &'static str) -> Result<usize> {
    let value = get_i32(bytes, at)?;
    usize::try_from(value).map_err(|_| CedarError::Corrupt { field, value })
}

fn copy_section<R: Record>(out: &mut [u8], at: usize, table: &Table<R>) {
    out[at..at + table.byte_len()].copy_from_slice(table.as_bytes());
}

fn read_table<R: Record>(bytes: &[u8], slot: usize) -> Result<Table<R>> {
    let meta = TABLES_AT + slot * TABLE_META_LEN;
    let byte_len = get_len(bytes, meta, "table byte length")?;
    let len = get_len(bytes, meta + 4, "table length")?;
    let cap = get_len(bytes, meta + 8, "table capacity")?;
    let at = get_len(bytes, OFFSETS_AT + slot * 4, "section offset")?;

    let src = bytes.get(at..at + byte_len).ok_or(CedarError::Truncated {
        needed: at + byte_len,
        available: bytes.len(),
    })?;
    let mut table = Table::from_meta(byte_len, len, cap);
    table.load_data(src);
    Ok(table)
}
