use crate::cell::{Xint, Xstr};

use std::fmt;

#[derive(PartialEq, Clone)]
pub enum Xerr {
    UnknownWord(Xstr),
    ExpectingName,
    ControlFlowError,
    DivisionByZero,
    StackUnderflow,
    StackOverflow,
    ReturnStackUnderflow,
    ReturnStackOverflow,
    LoopStackUnderflow,
    LoopStackOverflow,
    AuxStackUnderflow,
    AuxStackOverflow,
    InvalidAddress(Xint),
    InvalidToken(Xint),
    BranchTooFar(usize),
    CodeSpaceExhausted,
    TokenSpaceExhausted,
    OutOfMemory,
    IOError { filename: Xstr, reason: Xstr },
    InternalError,
    // Stop interpreter execution
    Exit(isize),
}

impl Xerr {
    /// Errors after which the dictionary or code space can't grow anymore.
    pub fn is_fatal(&self) -> bool {
        match self {
            Xerr::CodeSpaceExhausted | Xerr::TokenSpaceExhausted => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Xerr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Xerr::UnknownWord(s) => write!(f, "unknown word {}", s),
            Xerr::ExpectingName => f.write_str("expecting a name"),
            Xerr::ControlFlowError => f.write_str("unbalanced control structure"),
            Xerr::DivisionByZero => f.write_str("division by zero"),
            Xerr::StackUnderflow => f.write_str("stack underflow"),
            Xerr::StackOverflow => f.write_str("stack overflow"),
            Xerr::ReturnStackUnderflow => f.write_str("return stack underflow"),
            Xerr::ReturnStackOverflow => f.write_str("return stack overflow"),
            Xerr::LoopStackUnderflow => f.write_str("no active loop"),
            Xerr::LoopStackOverflow => f.write_str("loop stack overflow"),
            Xerr::AuxStackUnderflow => f.write_str("aux stack underflow"),
            Xerr::AuxStackOverflow => f.write_str("aux stack overflow"),
            Xerr::InvalidAddress(a) => write!(f, "invalid address {:#x}", a),
            Xerr::InvalidToken(xt) => write!(f, "invalid token {}", xt),
            Xerr::BranchTooFar(n) => write!(f, "branch distance {} doesn't fit a token", n),
            Xerr::CodeSpaceExhausted => f.write_str("out of code space"),
            Xerr::TokenSpaceExhausted => f.write_str("out of tokens"),
            Xerr::OutOfMemory => f.write_str("out of heap memory"),
            Xerr::IOError { filename, reason } => write!(f, "{}: {}", filename, reason),
            Xerr::InternalError => f.write_str("internal error"),
            Xerr::Exit(code) => write!(f, "exit {}", code),
        }
    }
}

pub type Xresult = Xresult1<()>;

pub type Xresult1<T> = Result<T, Xerr>;

pub const OK: Xresult = Ok(());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(Xerr::CodeSpaceExhausted.is_fatal());
        assert!(Xerr::TokenSpaceExhausted.is_fatal());
        assert!(!Xerr::StackUnderflow.is_fatal());
        assert_eq!("unknown word foo", format!("{:?}", Xerr::UnknownWord(Xstr::from("foo"))));
    }
}
