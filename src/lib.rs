pub mod cell;
pub mod config;
pub mod error;
pub mod lex;
mod memory;
mod dict;
mod code;
mod flow;
pub mod state;
mod interp;
mod arith;
mod format;
pub mod file;
pub mod debug;
#[cfg(feature = "stdio")]
pub mod repl;

pub mod prelude {
    pub type Xstate = crate::state::State;
    pub use crate::cell::Xint;
    pub use crate::config::Config;
    pub use crate::error::{Xerr, Xresult};
}
