use crate::cell::*;
use crate::error::*;
use crate::memory::*;
use crate::state::State;

const FMT_LEFT_BIT: usize = 0b00001;
const FMT_ZERO_BIT: usize = 0b00010;
const FMT_PLUS_BIT: usize = 0b00100;
const FMT_SPACE_BIT: usize = 0b01000;
const FMT_ALT_BIT: usize = 0b10000;

// conversion characters that end a directive
const FMT_CONVERSIONS: &[u8] = b"cdieEfgGosuxX";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FmtFlags(usize);

impl FmtFlags {
    fn with(self, bit: usize) -> Self {
        FmtFlags(self.0 | bit)
    }

    /// Add the flag spelled by `c`, None when `c` is not a flag character.
    pub fn parse(self, c: u8) -> Option<Self> {
        match c {
            b'-' => Some(self.with(FMT_LEFT_BIT)),
            b'0' => Some(self.with(FMT_ZERO_BIT)),
            b'+' => Some(self.with(FMT_PLUS_BIT)),
            b' ' => Some(self.with(FMT_SPACE_BIT)),
            b'#' => Some(self.with(FMT_ALT_BIT)),
            _ => None,
        }
    }

    pub fn left(&self) -> bool {
        (self.0 & FMT_LEFT_BIT) > 0
    }

    pub fn zero(&self) -> bool {
        (self.0 & FMT_ZERO_BIT) > 0
    }

    pub fn plus(&self) -> bool {
        (self.0 & FMT_PLUS_BIT) > 0
    }

    pub fn space(&self) -> bool {
        (self.0 & FMT_SPACE_BIT) > 0
    }

    pub fn alt(&self) -> bool {
        (self.0 & FMT_ALT_BIT) > 0
    }
}

/// One `%` directive of a format pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub flags: FmtFlags,
    pub width: usize,
    pub precision: Option<usize>,
    pub conv: u8,
}

fn parse_number(s: &[u8], i: &mut usize) -> usize {
    let mut n = 0usize;
    while let Some(c) = s.get(*i).filter(|c| c.is_ascii_digit()) {
        n = n.saturating_mul(10).saturating_add((c - b'0') as usize);
        *i += 1;
    }
    n
}

/// Parse the directive following a `%`. Returns the directive and the
/// number of bytes it takes, length modifiers are skipped.
pub fn parse_directive(s: &[u8]) -> Option<(Directive, usize)> {
    let mut i = 0;
    let mut flags = FmtFlags::default();
    while let Some(f) = s.get(i).and_then(|c| flags.parse(*c)) {
        flags = f;
        i += 1;
    }
    let width = parse_number(s, &mut i);
    let precision = if s.get(i) == Some(&b'.') {
        i += 1;
        Some(parse_number(s, &mut i))
    } else {
        None
    };
    while let Some(c) = s.get(i) {
        i += 1;
        if FMT_CONVERSIONS.contains(c) {
            return Some((
                Directive {
                    flags,
                    width,
                    precision,
                    conv: *c,
                },
                i,
            ));
        }
        if !b"hlLqjzt".contains(c) {
            return None;
        }
    }
    None
}

fn pad(out: &mut Vec<u8>, d: &Directive, sign: &str, prefix: &str, body: &[u8], numeric: bool) {
    let len = sign.len() + prefix.len() + body.len();
    let fill = d.width.saturating_sub(len);
    if d.flags.left() {
        out.extend_from_slice(sign.as_bytes());
        out.extend_from_slice(prefix.as_bytes());
        out.extend_from_slice(body);
        out.extend(std::iter::repeat(b' ').take(fill));
    } else if d.flags.zero() && numeric {
        out.extend_from_slice(sign.as_bytes());
        out.extend_from_slice(prefix.as_bytes());
        out.extend(std::iter::repeat(b'0').take(fill));
        out.extend_from_slice(body);
    } else {
        out.extend(std::iter::repeat(b' ').take(fill));
        out.extend_from_slice(sign.as_bytes());
        out.extend_from_slice(prefix.as_bytes());
        out.extend_from_slice(body);
    }
}

fn sign_of(d: &Directive, negative: bool) -> &'static str {
    if negative {
        "-"
    } else if d.flags.plus() {
        "+"
    } else if d.flags.space() {
        " "
    } else {
        ""
    }
}

fn integer(out: &mut Vec<u8>, d: &Directive, sign: &str, prefix: &str, digits: String) {
    let digits = match d.precision {
        Some(0) if digits == "0" => String::new(),
        Some(p) if p > digits.len() => format!("{}{}", "0".repeat(p - digits.len()), digits),
        _ => digits,
    };
    let d0 = Directive {
        flags: if d.precision.is_some() {
            FmtFlags(d.flags.0 & !FMT_ZERO_BIT)
        } else {
            d.flags
        },
        ..d.clone()
    };
    pad(out, &d0, sign, prefix, digits.as_bytes(), true);
}

fn exponent_form(v: f64, prec: usize) -> (String, i32) {
    let s = format!("{:.*e}", prec, v);
    match s.find('e') {
        Some(i) => {
            let exp = s[i + 1..].parse().unwrap_or(0);
            (s[..i].to_string(), exp)
        }
        None => (s, 0),
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn float(d: &Directive, v: f64) -> String {
    let prec = d.precision.unwrap_or(6);
    let e = |mantissa: &str, exp: i32| {
        format!(
            "{}e{}{:02}",
            mantissa,
            if exp < 0 { '-' } else { '+' },
            exp.abs()
        )
    };
    let s = match d.conv {
        b'f' => format!("{:.*}", prec, v),
        b'e' | b'E' => {
            let (m, exp) = exponent_form(v, prec);
            e(&m, exp)
        }
        _ => {
            let p = prec.max(1);
            let (m, exp) = exponent_form(v, p - 1);
            if exp < -4 || exp >= p as i32 {
                let m = if d.flags.alt() { m.as_str() } else { strip_zeros(&m) };
                e(m, exp)
            } else {
                let s = format!("{:.*}", (p as i32 - 1 - exp) as usize, v);
                if d.flags.alt() {
                    s
                } else {
                    strip_zeros(&s).to_string()
                }
            }
        }
    };
    if d.conv.is_ascii_uppercase() {
        s.to_uppercase()
    } else {
        s
    }
}

fn render(xs: &State, out: &mut Vec<u8>, d: &Directive, arg: Xint) -> Xresult {
    match d.conv {
        b'd' | b'i' => {
            let sign = sign_of(d, arg < 0);
            integer(out, d, sign, "", arg.unsigned_abs().to_string());
        }
        b'u' => integer(out, d, "", "", (arg as u64).to_string()),
        b'x' => {
            let prefix = if d.flags.alt() && arg != 0 { "0x" } else { "" };
            integer(out, d, "", prefix, format!("{:x}", arg as u64));
        }
        b'X' => {
            let prefix = if d.flags.alt() && arg != 0 { "0X" } else { "" };
            integer(out, d, "", prefix, format!("{:X}", arg as u64));
        }
        b'o' => {
            let prefix = if d.flags.alt() && arg != 0 { "0" } else { "" };
            integer(out, d, "", prefix, format!("{:o}", arg as u64));
        }
        b'c' => pad(out, d, "", "", &[arg as u8], false),
        b's' => {
            let s: &[u8] = if arg == 0 { b"(null)" } else { xs.mem.cstr(arg)? };
            let s = &s[..d.precision.unwrap_or(s.len()).min(s.len())];
            pad(out, d, "", "", s, false);
        }
        _ => {
            let v = arg as f64;
            let s = float(d, v.abs());
            let sign = sign_of(d, v.is_sign_negative() && v != 0.0);
            pad(out, d, sign, "", s.as_bytes(), true);
        }
    }
    OK
}

/// Expand the pattern at `pattern`, each directive taking the next value
/// from the top of the data stack. The result goes into one of the rotating
/// format buffers.
pub fn format(xs: &mut State, pattern: Xint) -> Xresult1<Xint> {
    let pat = xs.mem.cstr(pattern)?.to_vec();
    let mut out = Vec::with_capacity(pat.len() + 16);
    let mut i = 0;
    while i < pat.len() {
        let c = pat[i];
        i += 1;
        if c != b'%' || i == pat.len() {
            out.push(c);
            continue;
        }
        if pat[i] == b'%' {
            out.push(b'%');
            i += 1;
            continue;
        }
        match parse_directive(&pat[i..]) {
            Some((d, n)) => {
                i += n;
                let arg = xs.pop_data()?;
                render(xs, &mut out, &d, arg)?;
            }
            None => out.push(c),
        }
    }
    out.truncate(FORMAT_SIZE - 1);
    xs.format_slot = (xs.format_slot + 1) % FORMAT_BUFS;
    let addr = (FORMAT_BUF + xs.format_slot * FORMAT_SIZE) as Xint;
    xs.mem.put_cstr(addr, &out)?;
    Ok(addr)
}

fn core_word_format(xs: &mut State) -> Xresult {
    let pattern = xs.pop_data()?;
    let a = format(xs, pattern)?;
    xs.push_data(a)
}

fn cstr_arg(xs: &State, a: Xint) -> Xresult1<Option<&[u8]>> {
    if a == 0 {
        Ok(None)
    } else {
        xs.mem.cstr(a).map(Some)
    }
}

fn core_word_count(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    let n = cstr_arg(xs, a)?.map(|s| s.len()).unwrap_or(0);
    xs.push_data(n as Xint)
}

fn core_word_compare(xs: &mut State) -> Xresult {
    let b = xs.pop_data()?;
    let a = xs.pop_data()?;
    let ord = cstr_arg(xs, a)?.cmp(&cstr_arg(xs, b)?);
    xs.push_data(ord as Xint)
}

fn core_word_place(xs: &mut State) -> Xresult {
    let dst = xs.pop_data()?;
    let src = xs.pop_data()?;
    let s = cstr_arg(xs, src)?.map(|s| s.to_vec()).unwrap_or_default();
    xs.mem.put_cstr(dst, &s)
}

fn core_word_cmove(xs: &mut State) -> Xresult {
    let n = xs.pop_data()?;
    let dst = xs.pop_data()?;
    let src = xs.pop_data()?;
    let n = to_addr(n).ok_or(Xerr::InvalidAddress(n))?;
    xs.mem.copy(src, dst, n)
}

fn core_word_move(xs: &mut State) -> Xresult {
    let n = xs.pop_data()?;
    let dst = xs.pop_data()?;
    let src = xs.pop_data()?;
    let n = to_addr(n).ok_or(Xerr::InvalidAddress(n))?;
    xs.mem.copy(src, dst, n.saturating_mul(CELL))
}

pub(crate) fn load(xs: &mut State) -> Xresult {
    xs.t.format = xs.defword("format", core_word_format)?;
    xs.defword("count", core_word_count)?;
    xs.defword("compare", core_word_compare)?;
    xs.defword("place", core_word_place)?;
    xs.defword("cmove", core_word_cmove)?;
    xs.defword("move", core_word_move)?;
    OK
}
