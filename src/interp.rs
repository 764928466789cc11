use crate::cell::*;
use crate::dict::*;
use crate::error::*;
use crate::lex;
use crate::memory::*;
use crate::state::State;

// Interpreter depths to return to when a pass is aborted.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    return_depth: usize,
    loop_depth: usize,
    flow_depth: usize,
    ip: usize,
}

impl State {
    /// Evaluate source text.
    pub fn eval(&mut self, source: &str) -> Xresult {
        self.eval_flag(source).map(|_| ())
    }

    /// Evaluate source text, returning the flag of the pass.
    pub fn eval_flag(&mut self, source: &str) -> Xresult1<Xint> {
        let text = self.mem.alloc_cstr(source.as_bytes());
        if text == 0 {
            return Err(Xerr::OutOfMemory);
        }
        let result = self.evaluate(text);
        self.mem.release(text)?;
        result
    }

    /// Interpret the NUL terminated text at `text` until it runs out or a
    /// hook ends the pass.
    pub fn evaluate(&mut self, text: Xint) -> Xresult1<Xint> {
        let cp = self.checkpoint();
        let saved = self.mem.fetch(SOURCE_VAR as Xint)?;
        self.mem.store(SOURCE_VAR as Xint, text)?;
        let result = self.interpret(cp);
        self.mem.store(SOURCE_VAR as Xint, saved)?;
        match result {
            Ok(f) => {
                if f != FALSE {
                    self.on_ok()?;
                }
                Ok(f)
            }
            Err(e) => {
                tracing::debug!(error = ?e, "evaluation aborted");
                self.recover(cp);
                self.set_mode(0)?;
                Err(e)
            }
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            return_depth: self.return_depth(),
            loop_depth: self.loop_depth(),
            flow_depth: self.flow_stack.len(),
            ip: self.ip,
        }
    }

    fn recover(&mut self, cp: Checkpoint) {
        crate::flow::unwind(self, cp.flow_depth);
        self.truncate_return(cp.return_depth);
        self.truncate_loops(cp.loop_depth);
        self.ip = cp.ip;
    }

    fn interpret(&mut self, cp: Checkpoint) -> Xresult1<Xint> {
        loop {
            let len = lex::parse(&mut self.mem)?;
            if len == 0 {
                return Ok(TRUE);
            }
            let word = lex::parsed(&self.mem)?.to_vec();
            match self.interpret_word(&word) {
                Ok(true) => (),
                Ok(false) => {
                    if !self.on_what(&word)? {
                        self.recover(cp);
                        self.set_mode(0)?;
                        return Ok(FALSE);
                    }
                }
                Err(Xerr::StackUnderflow) => {
                    self.clear_data();
                    self.recover(cp);
                    self.set_mode(0)?;
                    return self.on_error();
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn interpret_word(&mut self, word: &[u8]) -> Xresult1<bool> {
        let mode = self.mode()?;
        if word[0] == b'"' || word.starts_with(b".\"") {
            let printed = word[0] == b'.';
            lex::rewind(&mut self.mem, word.len() - printed as usize)?;
            self.sparse_slot = self.sparse_slot.wrapping_add(1);
            let s = lex::sparse(&mut self.mem, self.sparse_slot)?;
            if mode != 0 {
                self.compile(self.t.lit_str)?;
                let bytes = self.mem.cstr(s)?.to_vec();
                self.scompile(&bytes)?;
                if printed {
                    self.compile(self.t.format)?;
                    self.compile(self.t.type_)?;
                }
            } else {
                self.push_data(s)?;
                if printed {
                    self.execute(self.t.format)?;
                    self.execute(self.t.type_)?;
                }
            }
            return Ok(true);
        }
        let xt = self.dict.find(self.dict.head(WordList::Macro), word);
        if xt != 0 {
            self.execute(xt)?;
            return Ok(true);
        }
        let xt = self.dict.find(self.dict.head(WordList::Normal), word);
        if xt != 0 {
            if mode != 0 {
                self.compile(xt)?;
            } else {
                self.execute(xt)?;
            }
            return Ok(true);
        }
        if let Some(n) = lex::number(word) {
            if mode != 0 {
                self.compile_literal(n)?;
            } else {
                self.push_data(n)?;
            }
            return Ok(true);
        }
        if word[0] == b'\'' && word.len() > 1 {
            let xt = match self.dict.find(self.dict.head(WordList::Macro), &word[1..]) {
                0 => self.dict.find(self.dict.head(WordList::Normal), &word[1..]),
                xt => xt,
            };
            if xt != 0 {
                if mode != 0 {
                    self.compile_token_literal(xt)?;
                } else {
                    self.push_data(xt as Xint)?;
                }
                return Ok(true);
            }
        }
        if word[0] == b'`' && word.len() > 1 {
            let c = word[1] as Xint;
            if mode != 0 {
                self.compile_literal(c)?;
            } else {
                self.push_data(c)?;
            }
            return Ok(true);
        }
        match self.dict.findpair(self.dict.head(WordList::Normal), word) {
            (0, _) => Ok(false),
            (outer, inner) => {
                if mode != 0 {
                    self.compile(outer)?;
                    self.compile(inner)?;
                } else {
                    self.execute(outer)?;
                    self.execute(inner)?;
                }
                Ok(true)
            }
        }
    }

    fn on_ok(&mut self) -> Xresult {
        let hook = self.mem.fetch(ON_OK_VAR as Xint)?;
        if hook != 0 {
            tracing::debug!(hook, "on-ok");
            self.execute_cell(hook)?;
        }
        OK
    }

    fn on_error(&mut self) -> Xresult1<Xint> {
        let hook = self.mem.fetch(ON_ERROR_VAR as Xint)?;
        if hook == 0 {
            return Err(Xerr::StackUnderflow);
        }
        tracing::debug!(hook, "on-error");
        self.push_data(1)?;
        self.execute_cell(hook)?;
        Ok(FALSE)
    }

    // true when the hook resolved the word and the pass goes on
    fn on_what(&mut self, word: &[u8]) -> Xresult1<bool> {
        let hook = self.mem.fetch(ON_WHAT_VAR as Xint)?;
        if hook == 0 {
            return Err(Xerr::UnknownWord(Xstr::from(String::from_utf8_lossy(word))));
        }
        tracing::debug!(hook, word = %String::from_utf8_lossy(word), "on-what");
        self.push_data(PARSE_BUF as Xint)?;
        self.execute_cell(hook)?;
        Ok(self.pop_data()? != FALSE)
    }
}

fn core_word_evaluate(xs: &mut State) -> Xresult {
    let text = xs.pop_data()?;
    let f = xs.evaluate(text)?;
    xs.push_data(f)
}

fn core_word_parse(xs: &mut State) -> Xresult {
    let a = match lex::parse(&mut xs.mem)? {
        0 => 0,
        _ => PARSE_BUF as Xint,
    };
    xs.push_data(a)
}

fn core_word_sparse(xs: &mut State) -> Xresult {
    xs.sparse_slot = xs.sparse_slot.wrapping_add(1);
    let a = lex::sparse(&mut xs.mem, xs.sparse_slot)?;
    xs.push_data(a)
}

fn name_arg(xs: &mut State, a: Xint) -> Xresult1<Vec<u8>> {
    if a == 0 {
        Ok(Vec::new())
    } else {
        Ok(xs.mem.cstr(a)?.to_vec())
    }
}

fn list_arg(xt: Xint) -> usize {
    to_addr(xt).unwrap_or(0)
}

fn core_word_find(xs: &mut State) -> Xresult {
    let list = list_arg(xs.pop_data()?);
    let a = xs.pop_data()?;
    let name = name_arg(xs, a)?;
    let xt = xs.dict.find(list, &name);
    xs.push_data(xt as Xint)
}

fn core_word_findpair(xs: &mut State) -> Xresult {
    let list = list_arg(xs.pop_data()?);
    let a = xs.pop_data()?;
    let name = name_arg(xs, a)?;
    let (outer, inner) = xs.dict.findpair(list, &name);
    xs.push_data(inner as Xint)?;
    xs.push_data(outer as Xint)
}

fn core_word_number(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    let text = name_arg(xs, a)?;
    match lex::number(&text) {
        Some(n) => {
            xs.push_data(n)?;
            xs.push_data(TRUE)
        }
        None => {
            xs.push_data(0)?;
            xs.push_data(FALSE)
        }
    }
}

fn core_word_macros(xs: &mut State) -> Xresult {
    let xt = xs.dict.head(WordList::Macro);
    xs.push_data(xt as Xint)
}

fn core_word_normals(xs: &mut State) -> Xresult {
    let xt = xs.dict.head(WordList::Normal);
    xs.push_data(xt as Xint)
}

fn core_word_latest(xs: &mut State) -> Xresult {
    let xt = xs.dict.head(xs.dict.current());
    xs.push_data(xt as Xint)
}

fn core_word_macro(xs: &mut State) -> Xresult {
    xs.dict.set_current(WordList::Macro);
    OK
}

fn core_word_normal(xs: &mut State) -> Xresult {
    xs.dict.set_current(WordList::Normal);
    OK
}

fn core_word_mode(xs: &mut State) -> Xresult {
    xs.push_data(MODE_VAR as Xint)
}

fn core_word_source(xs: &mut State) -> Xresult {
    xs.push_data(SOURCE_VAR as Xint)
}

fn core_word_on_ok(xs: &mut State) -> Xresult {
    xs.push_data(ON_OK_VAR as Xint)
}

fn core_word_on_error(xs: &mut State) -> Xresult {
    xs.push_data(ON_ERROR_VAR as Xint)
}

fn core_word_on_what(xs: &mut State) -> Xresult {
    xs.push_data(ON_WHAT_VAR as Xint)
}

fn word_arg(xs: &mut State) -> Xresult1<&Word> {
    let xt = xs.pop_data()?;
    let xt = to_addr(xt).ok_or(Xerr::InvalidToken(xt))?;
    xs.dict.word(xt)
}

fn core_word_xt_name(xs: &mut State) -> Xresult {
    let a = word_arg(xs)?.name_addr;
    xs.push_data(a)
}

fn core_word_xt_body(xs: &mut State) -> Xresult {
    let a = word_arg(xs)?.body;
    xs.push_data(a)
}

fn core_word_xt_list(xs: &mut State) -> Xresult {
    let xt = word_arg(xs)?.subs;
    xs.push_data(xt as Xint)
}

fn core_word_xt_link(xs: &mut State) -> Xresult {
    let xt = word_arg(xs)?.prev;
    xs.push_data(xt as Xint)
}

fn core_word_xt_code(xs: &mut State) -> Xresult {
    let kind = word_arg(xs)?.behavior.kind();
    xs.push_data(kind)
}

pub(crate) fn load(xs: &mut State) -> Xresult {
    xs.defword("evaluate", core_word_evaluate)?;
    xs.defword("number", core_word_number)?;
    xs.defword("macro", core_word_macro)?;
    xs.defword("normal", core_word_normal)?;
    xs.def_hidden("parse", core_word_parse)?;
    xs.def_hidden("sparse", core_word_sparse)?;
    xs.def_hidden("find", core_word_find)?;
    xs.def_hidden("findpair", core_word_findpair)?;
    xs.def_hidden("macros", core_word_macros)?;
    xs.def_hidden("normals", core_word_normals)?;
    xs.def_hidden("latest", core_word_latest)?;
    xs.def_hidden("mode", core_word_mode)?;
    xs.def_hidden("source", core_word_source)?;
    xs.def_hidden("on-ok", core_word_on_ok)?;
    xs.def_hidden("on-error", core_word_on_error)?;
    xs.def_hidden("on-what", core_word_on_what)?;
    xs.def_hidden("xt-name", core_word_xt_name)?;
    xs.def_hidden("xt-body", core_word_xt_body)?;
    xs.def_hidden("xt-list", core_word_xt_list)?;
    xs.def_hidden("xt-link", core_word_xt_link)?;
    xs.def_hidden("xt-code", core_word_xt_code)?;
    OK
}
