use crate::error::*;

/// Capacities of one interpreter instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// code space size in bytes
    pub code_size: usize,
    /// dictionary capacity, including primitives
    pub max_tokens: usize,
    pub data_depth: usize,
    pub return_depth: usize,
    pub aux_depth: usize,
    pub loop_depth: usize,
    /// upper bound of the memory used by allocate/resize
    pub heap_limit: usize,
    /// emit a trace event for every dispatched token
    pub trace: bool,
    /// compile the embedded base library at boot
    pub base_library: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            code_size: 1024 * 1024,
            max_tokens: 4096,
            data_depth: 1024,
            return_depth: 1024,
            aux_depth: 256,
            loop_depth: 256,
            heap_limit: 64 * 1024 * 1024,
            trace: false,
            base_library: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Xresult {
        // tokens travel as signed 16 bit inline literals
        if self.max_tokens > i16::MAX as usize {
            return Err(Xerr::TokenSpaceExhausted);
        }
        if self.data_depth == 0
            || self.return_depth < 2
            || self.aux_depth == 0
            || self.loop_depth == 0
        {
            return Err(Xerr::StackOverflow);
        }
        if self.code_size == 0 {
            return Err(Xerr::CodeSpaceExhausted);
        }
        OK
    }
}
