use crate::cell::*;
use crate::error::*;
use crate::memory::*;

// longest word or string literal, the buffers keep one byte for NUL
const PARSE_MAX: usize = PARSE_SIZE - 1;
const SPARSE_MAX: usize = SPARSE_SIZE - 1;
// significant characters of a number literal
const NUMBER_MAX: usize = 31;

fn source_text(mem: &Memory) -> Xresult1<(Xint, &[u8])> {
    let s = mem.fetch(SOURCE_VAR as Xint)?;
    if s == 0 {
        let empty: &[u8] = &[];
        Ok((0, empty))
    } else {
        Ok((s, mem.cstr(s)?))
    }
}

fn advance_source(mem: &mut Memory, s: Xint, n: usize) -> Xresult {
    if s != 0 {
        mem.store(SOURCE_VAR as Xint, s + n as Xint)?;
    }
    OK
}

/// Parse a white-space delimited word from the source into the parse
/// buffer. Returns the word length, zero at the end of input.
pub fn parse(mem: &mut Memory) -> Xresult1<usize> {
    let (s, text) = source_text(mem)?;
    let start = text.iter().position(|c| *c > b' ').unwrap_or(text.len());
    let len = text[start..]
        .iter()
        .take(PARSE_MAX)
        .take_while(|c| **c > b' ')
        .count();
    let mut word = [0u8; PARSE_MAX];
    word[..len].copy_from_slice(&text[start..start + len]);
    mem.put_cstr(PARSE_BUF as Xint, &word[..len])?;
    advance_source(mem, s, start + len)?;
    Ok(len)
}

/// Last word stored by `parse`.
pub fn parsed(mem: &Memory) -> Xresult1<&[u8]> {
    mem.cstr(PARSE_BUF as Xint)
}

/// Step the source cursor back by `n` bytes.
pub fn rewind(mem: &mut Memory, n: usize) -> Xresult {
    let s = mem.fetch(SOURCE_VAR as Xint)?;
    mem.store(SOURCE_VAR as Xint, s - n as Xint)
}

fn escape(c: u8) -> Option<u8> {
    match c {
        b'n' => Some(b'\n'),
        b'r' => Some(b'\r'),
        b't' => Some(b'\t'),
        b'e' => Some(0x1b),
        b'a' => Some(0x07),
        b'\\' => Some(b'\\'),
        b'"' => Some(b'"'),
        _ => None,
    }
}

/// Parse a quote delimited string literal starting at the source cursor
/// (which points at the opening quote) into scratch buffer `slot`.
/// Returns the buffer address.
pub fn sparse(mem: &mut Memory, slot: usize) -> Xresult1<Xint> {
    let (s, text) = source_text(mem)?;
    let mut buf = Vec::with_capacity(64);
    let mut i = 1;
    while i < text.len() && buf.len() < SPARSE_MAX {
        let c = text[i];
        i += 1;
        if c == b'"' {
            break;
        }
        if c == b'\\' && i < text.len() {
            if let Some(e) = escape(text[i]) {
                buf.push(e);
                i += 1;
                continue;
            }
        }
        buf.push(c);
    }
    let i = i.min(text.len());
    let addr = (SPARSE_BUF + (slot % SPARSE_BUFS) * SPARSE_SIZE) as Xint;
    mem.put_cstr(addr, &buf)?;
    advance_source(mem, s, i)?;
    Ok(addr)
}

/// Move the source cursor past the next `delim`, or to the end of input.
pub fn skip_past(mem: &mut Memory, delim: u8) -> Xresult {
    let (s, text) = source_text(mem)?;
    let n = match memchr::memchr(delim, text) {
        Some(i) => i + 1,
        None => text.len(),
    };
    advance_source(mem, s, n)
}

/// Convert text to a number: decimal, `0x` prefixed or `h` suffixed hex,
/// `b` suffixed binary. Values out of range saturate.
pub fn number(word: &[u8]) -> Option<Xint> {
    let word = &word[..word.len().min(NUMBER_MAX)];
    let (digits, radix) = match word.last() {
        Some(b'h') => (&word[..word.len() - 1], 16),
        Some(b'b') => (&word[..word.len() - 1], 2),
        _ if word.starts_with(b"0x") => (word, 16),
        _ => (word, 10),
    };
    let (negative, mut digits) = match digits.first() {
        Some(b'-') => (true, &digits[1..]),
        Some(b'+') => (false, &digits[1..]),
        _ => (false, digits),
    };
    if radix == 16
        && digits.len() > 2
        && (digits.starts_with(b"0x") || digits.starts_with(b"0X"))
        && (digits[2] as char).is_digit(16)
    {
        digits = &digits[2..];
    }
    if digits.is_empty() {
        return None;
    }
    let mut n: i128 = 0;
    for c in digits {
        let d = (*c as char).to_digit(radix)?;
        n = (n * radix as i128 + d as i128).min(Xint::MAX as i128 + 1);
    }
    let n = if negative { -n } else { n };
    Some(n.max(Xint::MIN as i128).min(Xint::MAX as i128) as Xint)
}
