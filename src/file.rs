use crate::cell::*;
use crate::error::*;
use crate::state::State;

#[cfg(not(feature = "stdio"))]
pub fn write_to_stdout(_buf: &[u8]) -> Xresult {
    Err(Xerr::InternalError)
}

#[cfg(feature = "stdio")]
pub fn write_to_stdout(buf: &[u8]) -> Xresult {
    use std::io::*;
    let stdout = std::io::stdout();
    let mut h = stdout.lock();
    h.write_all(buf).map_err(|e| Xerr::IOError {
        filename: Xstr::from("stdout"),
        reason: e.to_string().into(),
    })
}

#[cfg(not(feature = "stdio"))]
pub fn write_to_stderr(_buf: &[u8]) -> Xresult {
    Err(Xerr::InternalError)
}

#[cfg(feature = "stdio")]
pub fn write_to_stderr(buf: &[u8]) -> Xresult {
    use std::io::*;
    let stderr = std::io::stderr();
    let mut h = stderr.lock();
    h.write_all(buf).map_err(|e| Xerr::IOError {
        filename: Xstr::from("stderr"),
        reason: e.to_string().into(),
    })
}

#[cfg(feature = "stdio")]
pub fn flush_stdout() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

#[cfg(not(feature = "stdio"))]
pub fn flush_stdout() {}

/// Next byte of standard input, None at the end of input.
#[cfg(feature = "stdio")]
pub fn read_key() -> Option<u8> {
    use std::io::Read;
    flush_stdout();
    let mut c = [0u8; 1];
    match std::io::stdin().read(&mut c) {
        Ok(1) => Some(c[0]),
        _ => None,
    }
}

#[cfg(not(feature = "stdio"))]
pub fn read_key() -> Option<u8> {
    None
}

#[cfg(not(target_arch = "wasm32"))]
pub mod fs_overlay {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::*;

    fn ioerror_with_path(filename: Xstr, e: &std::io::Error) -> Xerr {
        Xerr::IOError {
            filename,
            reason: Xstr::from(e.to_string()),
        }
    }

    pub fn read_all(path: &str) -> Xresult1<Vec<u8>> {
        let mut file =
            std::fs::File::open(path).map_err(|e| ioerror_with_path(Xstr::from(path), &e))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| ioerror_with_path(Xstr::from(path), &e))?;
        Ok(buf)
    }

    pub fn read_source_file(path: &str) -> Xresult1<String> {
        std::fs::read_to_string(path).map_err(|e| ioerror_with_path(Xstr::from(path), &e))
    }

    pub fn write_all(path: &str, data: &[u8]) -> Xresult {
        let open = || {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
        };
        let mut file = open().map_err(|e| ioerror_with_path(Xstr::from(path), &e))?;
        file.write_all(data)
            .map_err(|e| ioerror_with_path(Xstr::from(path), &e))
    }
}

#[cfg(target_arch = "wasm32")]
pub mod fs_overlay {
    use super::*;

    macro_rules! no_filesystem_error {
        ($path:ident) => {
            Err(Xerr::IOError {
                filename: $path.into(),
                reason: "Target arch has no filesystem".into(),
            })
        };
    }

    pub fn read_all(path: &str) -> Xresult1<Vec<u8>> {
        no_filesystem_error!(path)
    }

    pub fn write_all(path: &str, _data: &[u8]) -> Xresult {
        no_filesystem_error!(path)
    }

    pub fn read_source_file(path: &str) -> Xresult1<String> {
        no_filesystem_error!(path)
    }
}

impl State {
    /// Evaluate a source file.
    pub fn load_file(&mut self, path: &str) -> Xresult {
        tracing::info!(path, "loading");
        let src = fs_overlay::read_source_file(path)?;
        self.eval(&src)
    }
}

fn core_word_slurp(xs: &mut State) -> Xresult {
    let name = xs.pop_data()?;
    let path = xs.mem.cstring(name)?;
    let a = match fs_overlay::read_all(&path) {
        Ok(data) => xs.mem.alloc_cstr(&data),
        Err(e) => {
            tracing::warn!(error = ?e, "slurp failed");
            0
        }
    };
    xs.push_data(a)
}

fn core_word_blurt(xs: &mut State) -> Xresult {
    let name = xs.pop_data()?;
    let a = xs.pop_data()?;
    let path = xs.mem.cstring(name)?;
    let data = xs.mem.cstr(a)?.to_vec();
    let t = match fs_overlay::write_all(&path, &data) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = ?e, "blurt failed");
            false
        }
    };
    xs.push_data(flag(t))
}

fn core_word_getenv(xs: &mut State) -> Xresult {
    let name = xs.pop_data()?;
    let key = xs.mem.cstring(name)?;
    let a = match std::env::var_os(&key) {
        Some(val) => xs.mem.alloc_cstr(val.to_string_lossy().as_bytes()),
        None => 0,
    };
    xs.push_data(a)
}

// NAME=VALUE sets a variable, a bare NAME removes it
fn core_word_putenv(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    let s = xs.mem.cstring(a)?;
    match s.find('=') {
        Some(0) => OK,
        Some(i) => {
            std::env::set_var(&s[..i], &s[i + 1..]);
            OK
        }
        None if !s.is_empty() => {
            std::env::remove_var(&s);
            OK
        }
        None => OK,
    }
}

pub(crate) fn load(xs: &mut State) -> Xresult {
    xs.defword("slurp", core_word_slurp)?;
    xs.defword("blurt", core_word_blurt)?;
    xs.defword("getenv", core_word_getenv)?;
    xs.defword("putenv", core_word_putenv)?;
    OK
}
