use crate::cell::*;
use crate::error::*;

use std::collections::BTreeMap;
use std::ops::Range;

// Fixed layout of the low memory. Address 0 stays zero so that it can serve
// as the null pointer.
pub const SOURCE_VAR: usize = 8;
pub const MODE_VAR: usize = 16;
pub const ON_OK_VAR: usize = 24;
pub const ON_ERROR_VAR: usize = 32;
pub const ON_WHAT_VAR: usize = 40;
// instruction pointer value that returns control to the host
pub const HALT: usize = 48;
pub const PARSE_BUF: usize = 56;
pub const PARSE_SIZE: usize = 1024;
pub const SPARSE_BUF: usize = PARSE_BUF + PARSE_SIZE;
pub const SPARSE_SIZE: usize = 1024;
pub const SPARSE_BUFS: usize = 3;
pub const FORMAT_BUF: usize = SPARSE_BUF + SPARSE_SIZE * SPARSE_BUFS;
pub const FORMAT_SIZE: usize = 4096;
pub const FORMAT_BUFS: usize = 3;
pub const CODE_BASE: usize = FORMAT_BUF + FORMAT_SIZE * FORMAT_BUFS;

/// Byte addressed memory shared by code space, scratch buffers and heap.
#[derive(Clone, Default)]
pub struct Memory {
    bytes: Vec<u8>,
    heap_base: usize,
    heap_limit: usize,
    // live heap blocks, start -> length
    blocks: BTreeMap<usize, usize>,
    // released heap blocks (start, length)
    free: Vec<(usize, usize)>,
}

impl Memory {
    pub fn new(code_size: usize, heap_limit: usize) -> Self {
        let heap_base = CODE_BASE + code_size;
        Self {
            bytes: vec![0; heap_base],
            heap_base,
            heap_limit,
            blocks: BTreeMap::new(),
            free: Vec::new(),
        }
    }

    /// First address past the code space.
    pub fn code_end(&self) -> usize {
        self.heap_base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    fn range(&self, a: Xint, len: usize) -> Xresult1<Range<usize>> {
        let start = to_addr(a).ok_or(Xerr::InvalidAddress(a))?;
        let end = start.checked_add(len).ok_or(Xerr::InvalidAddress(a))?;
        if end <= self.bytes.len() {
            Ok(start..end)
        } else {
            Err(Xerr::InvalidAddress(a))
        }
    }

    pub fn fetch(&self, a: Xint) -> Xresult1<Xint> {
        let r = self.range(a, CELL)?;
        let mut buf = [0u8; CELL];
        buf.copy_from_slice(&self.bytes[r]);
        Ok(Xint::from_le_bytes(buf))
    }

    pub fn store(&mut self, a: Xint, val: Xint) -> Xresult {
        let r = self.range(a, CELL)?;
        self.bytes[r].copy_from_slice(&val.to_le_bytes());
        OK
    }

    pub fn cfetch(&self, a: Xint) -> Xresult1<u8> {
        let r = self.range(a, 1)?;
        Ok(self.bytes[r.start])
    }

    pub fn cstore(&mut self, a: Xint, c: u8) -> Xresult {
        let r = self.range(a, 1)?;
        self.bytes[r.start] = c;
        OK
    }

    pub fn tok(&self, a: usize) -> Xresult1<Xtok> {
        let r = self.range(a as Xint, TOK)?;
        let mut buf = [0u8; TOK];
        buf.copy_from_slice(&self.bytes[r]);
        Ok(Xtok::from_le_bytes(buf))
    }

    pub fn set_tok(&mut self, a: usize, t: Xtok) -> Xresult {
        let r = self.range(a as Xint, TOK)?;
        self.bytes[r].copy_from_slice(&t.to_le_bytes());
        OK
    }

    pub fn slice(&self, a: Xint, len: usize) -> Xresult1<&[u8]> {
        let r = self.range(a, len)?;
        Ok(&self.bytes[r])
    }

    pub fn slice_mut(&mut self, a: Xint, len: usize) -> Xresult1<&mut [u8]> {
        let r = self.range(a, len)?;
        Ok(&mut self.bytes[r])
    }

    /// Length of the NUL terminated string at `a`.
    pub fn cstr_len(&self, a: Xint) -> Xresult1<usize> {
        let r = self.range(a, 0)?;
        memchr::memchr(0, &self.bytes[r.start..]).ok_or(Xerr::InvalidAddress(a))
    }

    pub fn cstr(&self, a: Xint) -> Xresult1<&[u8]> {
        let len = self.cstr_len(a)?;
        self.slice(a, len)
    }

    pub fn cstring(&self, a: Xint) -> Xresult1<String> {
        Ok(String::from_utf8_lossy(self.cstr(a)?).into_owned())
    }

    /// Write `s` followed by a NUL byte.
    pub fn put_cstr(&mut self, a: Xint, s: &[u8]) -> Xresult {
        let buf = self.slice_mut(a, s.len() + 1)?;
        buf[..s.len()].copy_from_slice(s);
        buf[s.len()] = 0;
        OK
    }

    /// Overlapping copy, like memmove.
    pub fn copy(&mut self, src: Xint, dst: Xint, len: usize) -> Xresult {
        let from = self.range(src, len)?;
        let to = self.range(dst, len)?;
        self.bytes.copy_within(from, to.start);
        OK
    }

    pub fn fill(&mut self, a: Xint, len: usize, val: u8) -> Xresult {
        let r = self.range(a, len)?;
        for b in &mut self.bytes[r] {
            *b = val;
        }
        OK
    }

    /// Zero filled block of at least one cell, or 0 when the heap is full.
    pub fn allocate(&mut self, n: Xint) -> Xint {
        if n < 0 {
            return 0;
        }
        let n = (n as usize).max(CELL);
        let n = (n + CELL - 1) / CELL * CELL;
        if let Some(i) = self.free.iter().position(|(_, len)| *len >= n) {
            let (start, len) = self.free.swap_remove(i);
            for b in &mut self.bytes[start..start + len] {
                *b = 0;
            }
            self.blocks.insert(start, len);
            return start as Xint;
        }
        let start = self.bytes.len();
        if start + n - self.heap_base > self.heap_limit {
            return 0;
        }
        self.bytes.resize(start + n, 0);
        self.blocks.insert(start, n);
        start as Xint
    }

    /// Block size of a live allocation.
    pub fn block_len(&self, a: Xint) -> Option<usize> {
        to_addr(a).and_then(|a| self.blocks.get(&a).cloned())
    }

    pub fn release(&mut self, a: Xint) -> Xresult {
        if a == 0 {
            return OK;
        }
        let start = to_addr(a).ok_or(Xerr::InvalidAddress(a))?;
        let len = self.blocks.remove(&start).ok_or(Xerr::InvalidAddress(a))?;
        self.free.push((start, len));
        OK
    }

    /// Grow or shrink a block, moving its contents. Returns 0 and keeps the
    /// old block when the heap is full.
    pub fn resize(&mut self, a: Xint, n: Xint) -> Xresult1<Xint> {
        if a == 0 {
            return Ok(self.allocate(n));
        }
        let old_len = self.block_len(a).ok_or(Xerr::InvalidAddress(a))?;
        let b = self.allocate(n);
        if b == 0 {
            return Ok(0);
        }
        let new_len = self.block_len(b).unwrap_or(0);
        self.copy(a, b, old_len.min(new_len))?;
        self.release(a)?;
        Ok(b)
    }

    /// Copy a byte string into a fresh heap block as a C string.
    pub fn alloc_cstr(&mut self, s: &[u8]) -> Xint {
        let a = self.allocate((s.len() + 1) as Xint);
        if a != 0 {
            let buf = &mut self.bytes[a as usize..a as usize + s.len()];
            buf.copy_from_slice(s);
        }
        a
    }
}
