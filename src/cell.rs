use crate::error::Xresult;
use crate::state::State;

use std::fmt;

pub type Xstr = arcstr::ArcStr;
pub type Xint = i64;
pub type Xtok = u16;
pub type XfnType = fn(&mut State) -> Xresult;

// size of a data cell and of a code space token, in bytes
pub const CELL: usize = std::mem::size_of::<Xint>();
pub const TOK: usize = std::mem::size_of::<Xtok>();

pub const TRUE: Xint = -1;
pub const FALSE: Xint = 0;

pub fn flag(t: bool) -> Xint {
    if t {
        TRUE
    } else {
        FALSE
    }
}

#[derive(Clone, Copy)]
pub struct XfnPtr(pub XfnType);

impl PartialEq for XfnPtr {
    fn eq(&self, other: &Self) -> bool {
        (self.0 as usize) == (other.0 as usize)
    }
}

impl fmt::Debug for XfnPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0 as usize)
    }
}

/// Convert a cell into a memory address, rejecting negative values.
pub fn to_addr(n: Xint) -> Option<usize> {
    if n < 0 {
        None
    } else {
        Some(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        assert_eq!(-1, flag(true));
        assert_eq!(0, flag(false));
        assert_eq!(TRUE, !FALSE);
    }

    #[test]
    fn test_to_addr() {
        assert_eq!(Some(16), to_addr(16));
        assert_eq!(None, to_addr(-8));
    }
}
