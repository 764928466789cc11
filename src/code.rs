use crate::cell::*;
use crate::dict::*;
use crate::error::*;
use crate::lex;
use crate::state::State;

/// Last instruction written to code space, candidate for fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Emitted {
    Nothing,
    Token { at: usize, xt: usize },
}

impl Default for Emitted {
    fn default() -> Self {
        Emitted::Nothing
    }
}

pub(crate) fn tok(xt: usize) -> Xresult1<Xtok> {
    if xt > i16::MAX as usize {
        Err(Xerr::InvalidToken(xt as Xint))
    } else {
        Ok(xt as Xtok)
    }
}

impl State {
    pub fn here(&self) -> usize {
        self.here
    }

    fn reserve(&mut self, n: usize) -> Xresult1<usize> {
        let at = self.here;
        if at + n > self.mem.code_end() {
            tracing::error!(here = at, size = n, "code space exhausted");
            return Err(Xerr::CodeSpaceExhausted);
        }
        self.here += n;
        Ok(at)
    }

    /// Append a raw token without fusion.
    pub(crate) fn emit_tok(&mut self, t: Xtok) -> Xresult {
        let at = self.reserve(TOK)?;
        self.mem.set_tok(at, t)
    }

    /// Append a call to `xt`, merging it with the previous instruction
    /// when the pair has a fused form.
    pub fn compile(&mut self, xt: usize) -> Xresult {
        self.dict.word(xt)?;
        if let Emitted::Token { at, xt: prev } = self.last {
            // a token compiled right after lit_tok is its operand
            if prev == self.t.lit_tok && at + TOK == self.here {
                self.emit_tok(tok(xt)?)?;
                self.last = Emitted::Nothing;
                return OK;
            }
            if at + TOK + self.operand_len(prev) == self.here {
                if let Some(fused) = self.fuse(prev, xt) {
                    self.mem.set_tok(at, tok(fused)?)?;
                    self.last = Emitted::Token { at, xt: fused };
                    return OK;
                }
            }
        }
        let at = self.here;
        self.emit_tok(tok(xt)?)?;
        self.last = Emitted::Token { at, xt };
        OK
    }

    fn operand_len(&self, xt: usize) -> usize {
        if xt == self.t.lit_num || xt == self.t.lit_add {
            CELL
        } else {
            0
        }
    }

    fn fuse(&self, prev: usize, next: usize) -> Option<usize> {
        let t = &self.t;
        if prev == t.dup && next == t.set_at {
            Some(t.dup_set_at)
        } else if prev == t.dup && next == t.set_my {
            Some(t.dup_set_my)
        } else if prev == t.dup && next == t.branch {
            Some(t.dup_branch)
        } else if prev == t.idx && next == t.add {
            Some(t.idx_add)
        } else if prev == t.lit_num && next == t.add {
            Some(t.lit_add)
        } else {
            None
        }
    }

    /// Append a raw cell.
    pub fn ncompile(&mut self, n: Xint) -> Xresult {
        let at = self.reserve(CELL)?;
        self.mem.store(at as Xint, n)
    }

    pub fn compile_literal(&mut self, n: Xint) -> Xresult {
        self.compile(self.t.lit_num)?;
        self.ncompile(n)
    }

    /// Append `lit_tok xt`, pushing the token itself at runtime.
    pub(crate) fn compile_token_literal(&mut self, xt: usize) -> Xresult {
        self.compile(self.t.lit_tok)?;
        self.emit_tok(tok(xt)?)
    }

    /// Append an inline string: a token sized length prefix covering the
    /// whole record, the bytes, a NUL and padding to token alignment.
    pub fn scompile(&mut self, s: &[u8]) -> Xresult {
        let len = TOK + s.len() + 1;
        let len = (len + TOK - 1) / TOK * TOK;
        if len > Xtok::MAX as usize {
            return Err(Xerr::BranchTooFar(len));
        }
        let at = self.reserve(len)?;
        self.mem.set_tok(at, len as Xtok)?;
        let buf = self.mem.slice_mut((at + TOK) as Xint, len - TOK)?;
        buf[..s.len()].copy_from_slice(s);
        for b in &mut buf[s.len()..] {
            *b = 0;
        }
        OK
    }

    /// Reserve a branch operand to be filled by `patch`.
    pub fn mark(&mut self) -> Xresult1<usize> {
        let at = self.here;
        self.emit_tok(0)?;
        self.last = Emitted::Nothing;
        Ok(at)
    }

    /// Point the operand at `at` to the current end of code.
    pub fn patch(&mut self, at: usize) -> Xresult {
        let delta = self.here.checked_sub(at).ok_or(Xerr::InvalidAddress(at as Xint))?;
        if delta > Xtok::MAX as usize {
            return Err(Xerr::BranchTooFar(delta));
        }
        self.mem.set_tok(at, delta as Xtok)?;
        self.last = Emitted::Nothing;
        OK
    }

    /// Close a definition body. A trailing call to a colon word turns into
    /// a tail call.
    pub(crate) fn compile_return(&mut self) -> Xresult {
        if let Emitted::Token { at, xt } = self.last {
            if at + TOK == self.here && self.dict.word(xt)?.behavior == Behavior::Enter {
                self.mem.set_tok(at, tok(self.t.tail)?)?;
                self.emit_tok(tok(xt)?)?;
                self.last = Emitted::Nothing;
                return OK;
            }
        }
        self.compile(self.t.exit)?;
        self.last = Emitted::Nothing;
        OK
    }

    pub(crate) fn parse_name(&mut self) -> Xresult1<Vec<u8>> {
        let len = lex::parse(&mut self.mem)?;
        if len == 0 {
            return Err(Xerr::ExpectingName);
        }
        Ok(lex::parsed(&self.mem)?.to_vec())
    }

    /// Create a word named by the next source word, its body starting at
    /// the end of code.
    pub(crate) fn label(&mut self, behavior: Behavior) -> Xresult1<usize> {
        let name = self.parse_name()?;
        let name_addr = self.mem.alloc_cstr(&name);
        let list = self.dict.current();
        let xt = self.dict.insert(
            list,
            Xstr::from(String::from_utf8_lossy(&name)),
            name_addr,
            behavior,
            self.here as Xint,
        )?;
        tok(xt)?;
        self.last = Emitted::Nothing;
        Ok(xt)
    }
}

fn core_word_compile(xs: &mut State) -> Xresult {
    let xt = xs.pop_data()?;
    let xt = to_addr(xt).ok_or(Xerr::InvalidToken(xt))?;
    xs.compile(xt)
}

fn core_word_ncompile(xs: &mut State) -> Xresult {
    let n = xs.pop_data()?;
    xs.ncompile(n)
}

fn core_word_scompile(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    let s = xs.mem.cstr(a)?.to_vec();
    xs.scompile(&s)
}

fn core_word_here(xs: &mut State) -> Xresult {
    let a = xs.here as Xint;
    xs.push_data(a)
}

fn core_word_allot(xs: &mut State) -> Xresult {
    let n = xs.pop_data()?;
    let n = to_addr(n).ok_or(Xerr::InvalidAddress(n))?;
    let at = xs.reserve(n)?;
    xs.mem.fill(at as Xint, n, 0)
}

fn core_word_ccompile(xs: &mut State) -> Xresult {
    let c = xs.pop_data()?;
    let at = xs.reserve(1)?;
    xs.mem.cstore(at as Xint, c as u8)
}

fn core_word_mark(xs: &mut State) -> Xresult {
    let at = xs.mark()?;
    xs.push_data(at as Xint)
}

fn core_word_patch(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    let at = to_addr(a).ok_or(Xerr::InvalidAddress(a))?;
    xs.patch(at)
}

fn core_word_label(xs: &mut State) -> Xresult {
    let xt = xs.label(Behavior::Enter)?;
    xs.push_data(xt as Xint)
}

fn core_word_create(xs: &mut State) -> Xresult {
    xs.label(Behavior::DoVar)?;
    OK
}

fn core_word_value(xs: &mut State) -> Xresult {
    let n = xs.pop_data()?;
    xs.label(Behavior::DoVal)?;
    xs.ncompile(n)
}

fn core_word_adder(xs: &mut State) -> Xresult {
    let n = xs.pop_data()?;
    xs.label(Behavior::DoAdd)?;
    xs.ncompile(n)
}

fn core_word_vary(xs: &mut State) -> Xresult {
    let xt = xs.pop_data()?;
    let n = xs.pop_data()?;
    let xt = match to_addr(xt) {
        Some(xt) if xt != 0 => xt,
        _ => return Err(Xerr::InvalidToken(xt)),
    };
    let body = xs.dict.word(xt)?.body;
    xs.mem.store(body, n)
}

// the target word runs like the source word from now on
fn core_word_rebind(xs: &mut State) -> Xresult {
    let dst = xs.pop_data()?;
    let src = xs.pop_data()?;
    let dst = to_addr(dst).ok_or(Xerr::InvalidToken(dst))?;
    let src = to_addr(src).ok_or(Xerr::InvalidToken(src))?;
    let w = xs.dict.word(src)?;
    let (behavior, body) = (w.behavior, w.body);
    let w = xs.dict.word_mut(dst)?;
    w.behavior = behavior;
    w.body = body;
    OK
}

fn core_word_redoes(xs: &mut State) -> Xresult {
    let xt = xs.pop_data()?;
    let subs = to_addr(xt).ok_or(Xerr::InvalidToken(xt))?;
    let created = xs.dict.head(xs.dict.current());
    let code = xs.ip;
    let w = xs.dict.word_mut(created)?;
    w.subs = subs;
    w.behavior = Behavior::DoDoes { code };
    xs.ret()
}

pub(crate) fn load(xs: &mut State) -> Xresult {
    xs.defword("here", core_word_here)?;
    xs.defword("allot", core_word_allot)?;
    xs.defword(",", core_word_ncompile)?;
    xs.defword("c,", core_word_ccompile)?;
    xs.defword("create", core_word_create)?;
    xs.defword("value", core_word_value)?;
    xs.defword("vary", core_word_vary)?;
    xs.def_hidden("compile", core_word_compile)?;
    xs.def_hidden("ncompile", core_word_ncompile)?;
    xs.def_hidden("scompile", core_word_scompile)?;
    xs.def_hidden("mark", core_word_mark)?;
    xs.def_hidden("patch", core_word_patch)?;
    xs.def_hidden("label", core_word_label)?;
    xs.def_hidden("adder", core_word_adder)?;
    xs.def_hidden("rebind", core_word_rebind)?;
    xs.t.redoes = xs.def_hidden("redoes", core_word_redoes)?;
    OK
}
