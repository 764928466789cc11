use crate::cell::*;
use crate::code::Emitted;
use crate::config::Config;
use crate::dict::*;
use crate::error::*;
use crate::flow::Flow;
use crate::memory::*;

/// Return stack frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frame {
    pub(crate) ip: usize,
    // loop stack depth of the caller
    pub(crate) lsp: usize,
    pub(crate) at: Xint,
    pub(crate) my: Xint,
}

/// Counted or unbounded loop, a negative limit never ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Loop {
    pub(crate) index: Xint,
    pub(crate) limit: Xint,
    // address of the loop operand, the body follows it
    pub(crate) resume: usize,
}

/// Tokens the compiler and the engine refer to directly.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CoreTokens {
    pub exit: usize,
    pub tail: usize,
    pub lit_tok: usize,
    pub lit_num: usize,
    pub lit_str: usize,
    pub branch: usize,
    pub jump: usize,
    pub loop_: usize,
    pub eloop: usize,
    pub redoes: usize,
    pub dup: usize,
    pub add: usize,
    pub idx: usize,
    pub set_at: usize,
    pub set_my: usize,
    pub dup_set_at: usize,
    pub dup_set_my: usize,
    pub dup_branch: usize,
    pub idx_add: usize,
    pub lit_add: usize,
    pub format: usize,
    pub type_: usize,
}

#[derive(Clone, Default)]
pub struct State {
    pub(crate) mem: Memory,
    pub(crate) dict: Dictionary,
    // code space cursor
    pub(crate) here: usize,
    pub(crate) last: Emitted,
    pub(crate) flow_stack: Vec<Flow>,
    data_stack: Vec<Xint>,
    aux_stack: Vec<Xint>,
    return_stack: Vec<Frame>,
    loops: Vec<Loop>,
    pub(crate) ip: usize,
    pub(crate) t: CoreTokens,
    pub(crate) config: Config,
    pub(crate) sparse_slot: usize,
    pub(crate) format_slot: usize,
    console: Option<String>,
    stdin_eof: bool,
}

impl State {
    pub fn boot() -> Xresult1<State> {
        State::boot_with(Config::default())
    }

    pub fn boot_with(config: Config) -> Xresult1<State> {
        config.validate()?;
        let mut xs = State {
            mem: Memory::new(config.code_size, config.heap_limit),
            dict: Dictionary::new(config.max_tokens),
            here: CODE_BASE,
            ip: HALT,
            return_stack: vec![Frame {
                ip: HALT,
                ..Default::default()
            }],
            config,
            ..Default::default()
        };
        #[cfg(not(feature = "stdio"))]
        {
            xs.console = Some(String::new());
        }
        xs.load_core()?;
        if xs.config.base_library {
            xs.eval(include_str!("base.fs"))?;
        }
        tracing::info!(
            words = xs.dict.len(),
            code = xs.here - CODE_BASE,
            "interpreter ready"
        );
        Ok(xs)
    }

    fn def(&mut self, list: WordList, name: &str, f: XfnType) -> Xresult1<usize> {
        let name_addr = self.mem.alloc_cstr(name.as_bytes());
        self.dict.insert(
            list,
            Xstr::from(name),
            name_addr,
            Behavior::Native(XfnPtr(f)),
            0,
        )
    }

    pub fn defword(&mut self, name: &str, f: XfnType) -> Xresult1<usize> {
        self.def(WordList::Normal, name, f)
    }

    pub fn def_macro(&mut self, name: &str, f: XfnType) -> Xresult1<usize> {
        self.def(WordList::Macro, name, f)
    }

    pub(crate) fn def_hidden(&mut self, name: &str, f: XfnType) -> Xresult1<usize> {
        self.def(WordList::Hidden, name, f)
    }

    fn load_core(&mut self) -> Xresult {
        self.defword("bye", core_word_bye)?;
        self.t.exit = self.defword("exit", |xs| xs.ret())?;
        self.t.idx = self.defword("i", core_word_i)?;
        self.defword("leave", core_word_leave)?;
        self.defword("next", core_word_next)?;
        self.defword("while", core_word_while)?;
        self.defword("until", core_word_until)?;
        self.t.dup = self.defword("dup", |xs| xs.dup_data())?;
        self.defword("drop", |xs| xs.drop_data())?;
        self.defword("over", |xs| xs.over_data())?;
        self.defword("swap", |xs| xs.swap_data())?;
        self.defword("nip", core_word_nip)?;
        self.defword("rot", |xs| xs.rot_data())?;
        self.defword("tuck", core_word_tuck)?;
        self.defword("push", core_word_push)?;
        self.defword("pop", core_word_pop)?;
        self.defword("top", core_word_top)?;
        self.t.set_my = self.defword("my!", core_word_set_my)?;
        self.defword("my", core_word_my)?;
        self.t.set_at = self.defword("at!", core_word_set_at)?;
        self.defword("at", core_word_at)?;
        self.defword("!+", core_word_store_at_inc)?;
        self.defword("@+", core_word_fetch_at_inc)?;
        self.defword("c!+", core_word_cstore_at_inc)?;
        self.defword("c@+", core_word_cfetch_at_inc)?;
        self.defword("@", core_word_fetch)?;
        self.defword("!", core_word_store)?;
        self.defword("+!", core_word_plus_store)?;
        self.defword("c@", core_word_cfetch)?;
        self.defword("c!", core_word_cstore)?;
        self.defword("cell", |xs| xs.push_data(CELL as Xint))?;
        self.defword("cells", core_word_cells)?;
        self.defword("bytes", core_word_nop)?;
        self.defword("execute", core_word_execute)?;
        self.defword("depth", core_word_depth)?;
        self.defword("pick", core_word_pick)?;
        self.defword("emit", core_word_emit)?;
        self.defword("key", core_word_key)?;
        self.defword("key?", core_word_key_ready)?;
        self.t.type_ = self.defword("type", core_word_type)?;
        self.defword("error", core_word_error)?;
        self.defword("allocate", core_word_allocate)?;
        self.defword("resize", core_word_resize)?;
        self.defword("free", core_word_free)?;
        self.defword("nop", core_word_nop)?;
        self.t.lit_tok = self.def_hidden("lit_tok", core_word_lit_tok)?;
        self.t.lit_num = self.def_hidden("lit_num", core_word_lit_num)?;
        self.t.lit_str = self.def_hidden("lit_str", core_word_lit_str)?;
        self.t.branch = self.def_hidden("branch", core_word_branch)?;
        self.t.jump = self.def_hidden("jump", core_word_jump)?;
        self.t.loop_ = self.def_hidden("loop", core_word_loop)?;
        self.t.eloop = self.def_hidden("eloop", core_word_eloop)?;
        self.t.tail = self.def_hidden("tail", core_word_tail)?;
        self.t.dup_set_at = self.def_hidden("dup-at!", core_word_dup_set_at)?;
        self.t.dup_set_my = self.def_hidden("dup-my!", core_word_dup_set_my)?;
        self.t.dup_branch = self.def_hidden("dup-branch", core_word_dup_branch)?;
        self.t.idx_add = self.def_hidden("i+", core_word_i_add)?;
        self.t.lit_add = self.def_hidden("lit+", core_word_lit_add)?;
        crate::arith::load(self)?;
        crate::code::load(self)?;
        crate::flow::load(self)?;
        crate::interp::load(self)?;
        crate::format::load(self)?;
        crate::file::load(self)?;
        let sys = self.defword("sys", core_word_nop)?;
        let hidden = self.dict.head(WordList::Hidden);
        self.dict.word_mut(sys)?.subs = hidden;
        OK
    }

    pub(crate) fn dispatch(&mut self, xt: usize) -> Xresult {
        let w = self.dict.word(xt)?;
        let body = w.body;
        match w.behavior {
            Behavior::Native(f) => (f.0)(self),
            Behavior::Enter => self.call(body as usize),
            Behavior::DoVar => self.push_data(body),
            Behavior::DoVal => {
                let val = self.mem.fetch(body)?;
                self.push_data(val)
            }
            Behavior::DoAdd => {
                let n = self.mem.fetch(body)?;
                let a = self.pop_data()?;
                self.push_data(a.wrapping_add(n))
            }
            Behavior::DoDoes { code } => {
                self.call(code)?;
                self.push_data(body)
            }
        }
    }

    pub fn run(&mut self) -> Xresult {
        while self.ip != HALT {
            let xt = self.mem.tok(self.ip)?;
            if self.config.trace {
                crate::debug::trace_step(self, xt as usize);
            }
            self.ip += TOK;
            self.dispatch(xt as usize)?;
        }
        OK
    }

    /// Run a word to completion and come back to the caller.
    pub fn execute(&mut self, xt: usize) -> Xresult {
        let saved = self.ip;
        self.ip = HALT;
        let result = self.dispatch(xt).and_then(|_| self.run());
        self.ip = saved;
        result
    }

    pub(crate) fn execute_cell(&mut self, xt: Xint) -> Xresult {
        let xt = to_addr(xt).ok_or(Xerr::InvalidToken(xt))?;
        self.execute(xt)
    }

    pub(crate) fn call(&mut self, target: usize) -> Xresult {
        if self.return_stack.len() >= self.config.return_depth {
            return Err(Xerr::ReturnStackOverflow);
        }
        self.return_stack.push(Frame {
            ip: self.ip,
            lsp: self.loops.len(),
            at: 0,
            my: 0,
        });
        self.ip = target;
        OK
    }

    pub(crate) fn ret(&mut self) -> Xresult {
        // the base frame belongs to the host
        if self.return_stack.len() < 2 {
            return Err(Xerr::ReturnStackUnderflow);
        }
        let frame = self.return_stack.pop().ok_or(Xerr::ReturnStackUnderflow)?;
        self.ip = frame.ip;
        self.loops.truncate(frame.lsp);
        OK
    }

    fn frame(&mut self) -> Xresult1<&mut Frame> {
        self.return_stack.last_mut().ok_or(Xerr::ReturnStackUnderflow)
    }

    pub fn return_depth(&self) -> usize {
        self.return_stack.len()
    }

    pub(crate) fn truncate_return(&mut self, depth: usize) {
        self.return_stack.truncate(depth.max(1));
    }

    pub(crate) fn loop_depth(&self) -> usize {
        self.loops.len()
    }

    pub(crate) fn truncate_loops(&mut self, depth: usize) {
        self.loops.truncate(depth);
    }

    fn push_loop(&mut self, l: Loop) -> Xresult {
        if self.loops.len() >= self.config.loop_depth {
            return Err(Xerr::LoopStackOverflow);
        }
        self.loops.push(l);
        OK
    }

    // loops opened by the current frame only
    fn frame_loops(&self) -> usize {
        self.return_stack.last().map(|f| f.lsp).unwrap_or(0)
    }

    fn top_loop(&mut self) -> Xresult1<&mut Loop> {
        if self.loops.len() > self.frame_loops() {
            self.loops.last_mut().ok_or(Xerr::LoopStackUnderflow)
        } else {
            Err(Xerr::LoopStackUnderflow)
        }
    }

    fn pop_loop(&mut self) -> Xresult1<Loop> {
        if self.loops.len() > self.frame_loops() {
            self.loops.pop().ok_or(Xerr::LoopStackUnderflow)
        } else {
            Err(Xerr::LoopStackUnderflow)
        }
    }

    /// Destination of the branch operand at `at`.
    pub(crate) fn branch_target(&self, at: usize) -> Xresult1<usize> {
        Ok(at + self.mem.tok(at)? as usize)
    }

    pub fn push_data(&mut self, data: Xint) -> Xresult {
        if self.data_stack.len() >= self.config.data_depth {
            return Err(Xerr::StackOverflow);
        }
        self.data_stack.push(data);
        OK
    }

    pub fn pop_data(&mut self) -> Xresult1<Xint> {
        self.data_stack.pop().ok_or(Xerr::StackUnderflow)
    }

    pub fn top_data(&self) -> Xresult1<Xint> {
        self.data_stack.last().cloned().ok_or(Xerr::StackUnderflow)
    }

    /// Stack item `idx` counting from the top.
    pub fn get_data(&self, idx: usize) -> Option<Xint> {
        self.data_stack.iter().rev().nth(idx).cloned()
    }

    pub fn data_depth(&self) -> usize {
        self.data_stack.len()
    }

    pub(crate) fn clear_data(&mut self) {
        self.data_stack.clear();
    }

    fn drop_data(&mut self) -> Xresult {
        self.pop_data()?;
        OK
    }

    fn dup_data(&mut self) -> Xresult {
        let val = self.top_data()?;
        self.push_data(val)
    }

    fn swap_data(&mut self) -> Xresult {
        let len = self.data_stack.len();
        if len >= 2 {
            self.data_stack.swap(len - 1, len - 2);
            OK
        } else {
            Err(Xerr::StackUnderflow)
        }
    }

    fn rot_data(&mut self) -> Xresult {
        let len = self.data_stack.len();
        if len >= 3 {
            self.data_stack[len - 3..].rotate_left(1);
            OK
        } else {
            Err(Xerr::StackUnderflow)
        }
    }

    fn over_data(&mut self) -> Xresult {
        let val = self.get_data(1).ok_or(Xerr::StackUnderflow)?;
        self.push_data(val)
    }

    pub fn push_aux(&mut self, val: Xint) -> Xresult {
        if self.aux_stack.len() >= self.config.aux_depth {
            return Err(Xerr::AuxStackOverflow);
        }
        self.aux_stack.push(val);
        OK
    }

    pub fn pop_aux(&mut self) -> Xresult1<Xint> {
        self.aux_stack.pop().ok_or(Xerr::AuxStackUnderflow)
    }

    pub fn mode(&self) -> Xresult1<Xint> {
        self.mem.fetch(MODE_VAR as Xint)
    }

    pub(crate) fn set_mode(&mut self, mode: Xint) -> Xresult {
        self.mem.store(MODE_VAR as Xint, mode)
    }

    /// Look up a word by name in the normal list.
    pub fn find_word(&self, name: &str) -> Option<usize> {
        match self.dict.find(self.dict.head(WordList::Normal), name.as_bytes()) {
            0 => None,
            xt => Some(xt),
        }
    }

    /// Names reachable from the prompt.
    pub fn word_names(&self) -> Vec<String> {
        let mut v: Vec<String> = self
            .dict
            .names(WordList::Normal)
            .iter()
            .chain(self.dict.names(WordList::Macro).iter())
            .map(|s| s.to_string())
            .collect();
        v.sort();
        v.dedup();
        v
    }

    pub fn print(&mut self, msg: &str) {
        if let Err(e) = self.write_out(msg.as_bytes()) {
            tracing::warn!(error = ?e, "console write failed");
        }
    }

    pub(crate) fn write_out(&mut self, buf: &[u8]) -> Xresult {
        if let Some(out) = self.console.as_mut() {
            out.push_str(&String::from_utf8_lossy(buf));
            OK
        } else {
            crate::file::write_to_stdout(buf)
        }
    }

    pub(crate) fn write_err(&mut self, buf: &[u8]) -> Xresult {
        if let Some(out) = self.console.as_mut() {
            out.push_str(&String::from_utf8_lossy(buf));
            OK
        } else {
            crate::file::write_to_stderr(buf)
        }
    }

    pub fn console(&mut self) -> Option<&mut String> {
        self.console.as_mut()
    }

    pub fn capture_stdout(&mut self) {
        if self.console.is_none() {
            self.console = Some(String::new());
        }
    }

    pub fn print_error(&mut self, err: &Xerr) {
        let msg = format!("{:?}\n", err);
        if let Err(e) = self.write_err(msg.as_bytes()) {
            tracing::warn!(error = ?e, "console write failed");
        }
    }
}

fn core_word_nop(_xs: &mut State) -> Xresult {
    OK
}

fn core_word_bye(_xs: &mut State) -> Xresult {
    Err(Xerr::Exit(0))
}

fn core_word_i(xs: &mut State) -> Xresult {
    let index = xs.top_loop()?.index;
    xs.push_data(index)
}

fn core_word_leave(xs: &mut State) -> Xresult {
    let l = xs.pop_loop()?;
    xs.ip = xs.branch_target(l.resume)?;
    OK
}

fn core_word_next(xs: &mut State) -> Xresult {
    let resume = xs.top_loop()?.resume;
    // land on the eloop that closes the body
    xs.ip = xs.branch_target(resume)? - TOK;
    OK
}

fn core_word_while(xs: &mut State) -> Xresult {
    if xs.pop_data()? == 0 {
        core_word_leave(xs)
    } else {
        OK
    }
}

fn core_word_until(xs: &mut State) -> Xresult {
    if xs.pop_data()? != 0 {
        core_word_leave(xs)
    } else {
        OK
    }
}

fn core_word_nip(xs: &mut State) -> Xresult {
    let b = xs.pop_data()?;
    xs.pop_data()?;
    xs.push_data(b)
}

fn core_word_tuck(xs: &mut State) -> Xresult {
    let b = xs.pop_data()?;
    let a = xs.pop_data()?;
    xs.push_data(b)?;
    xs.push_data(a)?;
    xs.push_data(b)
}

fn core_word_push(xs: &mut State) -> Xresult {
    let val = xs.pop_data()?;
    xs.push_aux(val)
}

fn core_word_pop(xs: &mut State) -> Xresult {
    let val = xs.pop_aux()?;
    xs.push_data(val)
}

fn core_word_top(xs: &mut State) -> Xresult {
    let val = xs.aux_stack.last().cloned().ok_or(Xerr::AuxStackUnderflow)?;
    xs.push_data(val)
}

fn core_word_set_my(xs: &mut State) -> Xresult {
    let val = xs.pop_data()?;
    xs.frame()?.my = val;
    OK
}

fn core_word_my(xs: &mut State) -> Xresult {
    let val = xs.frame()?.my;
    xs.push_data(val)
}

fn core_word_set_at(xs: &mut State) -> Xresult {
    let val = xs.pop_data()?;
    xs.frame()?.at = val;
    OK
}

fn core_word_at(xs: &mut State) -> Xresult {
    let val = xs.frame()?.at;
    xs.push_data(val)
}

fn core_word_store_at_inc(xs: &mut State) -> Xresult {
    let val = xs.pop_data()?;
    let a = xs.frame()?.at;
    xs.mem.store(a, val)?;
    xs.frame()?.at = a.wrapping_add(CELL as Xint);
    OK
}

fn core_word_fetch_at_inc(xs: &mut State) -> Xresult {
    let a = xs.frame()?.at;
    let val = xs.mem.fetch(a)?;
    xs.frame()?.at = a.wrapping_add(CELL as Xint);
    xs.push_data(val)
}

fn core_word_cstore_at_inc(xs: &mut State) -> Xresult {
    let c = xs.pop_data()?;
    let a = xs.frame()?.at;
    xs.mem.cstore(a, c as u8)?;
    xs.frame()?.at = a.wrapping_add(1);
    OK
}

fn core_word_cfetch_at_inc(xs: &mut State) -> Xresult {
    let a = xs.frame()?.at;
    let c = xs.mem.cfetch(a)?;
    xs.frame()?.at = a.wrapping_add(1);
    xs.push_data(c as Xint)
}

fn core_word_fetch(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    let val = xs.mem.fetch(a)?;
    xs.push_data(val)
}

fn core_word_store(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    let val = xs.pop_data()?;
    xs.mem.store(a, val)
}

fn core_word_plus_store(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    let n = xs.pop_data()?;
    let val = xs.mem.fetch(a)?;
    xs.mem.store(a, val.wrapping_add(n))
}

fn core_word_cfetch(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    let c = xs.mem.cfetch(a)?;
    xs.push_data(c as Xint)
}

fn core_word_cstore(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    let c = xs.pop_data()?;
    xs.mem.cstore(a, c as u8)
}

fn core_word_cells(xs: &mut State) -> Xresult {
    let n = xs.pop_data()?;
    xs.push_data(n.wrapping_mul(CELL as Xint))
}

fn core_word_execute(xs: &mut State) -> Xresult {
    let xt = xs.pop_data()?;
    if xt == 0 {
        return OK;
    }
    let xt = to_addr(xt).ok_or(Xerr::InvalidToken(xt))?;
    xs.dispatch(xt)
}

fn core_word_depth(xs: &mut State) -> Xresult {
    let n = xs.data_depth() as Xint;
    xs.push_data(n)
}

fn core_word_pick(xs: &mut State) -> Xresult {
    let n = xs.pop_data()?;
    let idx = to_addr(n).ok_or(Xerr::StackUnderflow)?;
    let val = xs.get_data(idx).ok_or(Xerr::StackUnderflow)?;
    xs.push_data(val)
}

fn core_word_emit(xs: &mut State) -> Xresult {
    let c = xs.pop_data()?;
    xs.write_out(&[c as u8])
}

fn core_word_key(xs: &mut State) -> Xresult {
    match crate::file::read_key() {
        Some(c) => xs.push_data(c as Xint),
        None => {
            xs.stdin_eof = true;
            xs.push_data(-1)
        }
    }
}

fn core_word_key_ready(xs: &mut State) -> Xresult {
    let t = !xs.stdin_eof;
    xs.push_data(flag(t))
}

fn core_word_type(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    if a == 0 {
        return OK;
    }
    let s = xs.mem.cstr(a)?.to_vec();
    xs.write_out(&s)
}

fn core_word_error(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    if a == 0 {
        return OK;
    }
    let s = xs.mem.cstr(a)?.to_vec();
    xs.write_err(&s)
}

fn core_word_allocate(xs: &mut State) -> Xresult {
    let n = xs.pop_data()?;
    let a = xs.mem.allocate(n);
    xs.push_data(a)
}

fn core_word_resize(xs: &mut State) -> Xresult {
    let n = xs.pop_data()?;
    let a = xs.pop_data()?;
    let b = xs.mem.resize(a, n)?;
    xs.push_data(b)
}

fn core_word_free(xs: &mut State) -> Xresult {
    let a = xs.pop_data()?;
    xs.mem.release(a)
}

fn core_word_lit_tok(xs: &mut State) -> Xresult {
    // token literals are signed, begin stores -1
    let val = xs.mem.tok(xs.ip)? as i16 as Xint;
    xs.ip += TOK;
    xs.push_data(val)
}

fn core_word_lit_num(xs: &mut State) -> Xresult {
    let val = xs.mem.fetch(xs.ip as Xint)?;
    xs.ip += CELL;
    xs.push_data(val)
}

fn core_word_lit_str(xs: &mut State) -> Xresult {
    let a = xs.ip + TOK;
    xs.ip = xs.branch_target(xs.ip)?;
    xs.push_data(a as Xint)
}

fn core_word_branch(xs: &mut State) -> Xresult {
    let t = xs.pop_data()?;
    if t != 0 {
        xs.ip += TOK;
    } else {
        xs.ip = xs.branch_target(xs.ip)?;
    }
    OK
}

fn core_word_jump(xs: &mut State) -> Xresult {
    xs.ip = xs.branch_target(xs.ip)?;
    OK
}

fn core_word_loop(xs: &mut State) -> Xresult {
    let n = xs.pop_data()?;
    if n != 0 {
        xs.push_loop(Loop {
            index: 0,
            limit: n,
            resume: xs.ip,
        })?;
        xs.ip += TOK;
    } else {
        xs.ip = xs.branch_target(xs.ip)?;
    }
    OK
}

fn core_word_eloop(xs: &mut State) -> Xresult {
    let l = xs.top_loop()?;
    l.index = l.index.wrapping_add(1);
    if l.index < l.limit || l.limit < 0 {
        let resume = l.resume;
        xs.ip = resume + TOK;
    } else {
        xs.pop_loop()?;
    }
    OK
}

fn core_word_tail(xs: &mut State) -> Xresult {
    let xt = xs.mem.tok(xs.ip)?;
    xs.ret()?;
    xs.dispatch(xt as usize)
}

fn core_word_dup_set_at(xs: &mut State) -> Xresult {
    let val = xs.top_data()?;
    xs.frame()?.at = val;
    OK
}

fn core_word_dup_set_my(xs: &mut State) -> Xresult {
    let val = xs.top_data()?;
    xs.frame()?.my = val;
    OK
}

fn core_word_dup_branch(xs: &mut State) -> Xresult {
    if xs.top_data()? != 0 {
        xs.ip += TOK;
    } else {
        xs.ip = xs.branch_target(xs.ip)?;
    }
    OK
}

fn core_word_i_add(xs: &mut State) -> Xresult {
    let index = xs.top_loop()?.index;
    let a = xs.pop_data()?;
    xs.push_data(a.wrapping_add(index))
}

fn core_word_lit_add(xs: &mut State) -> Xresult {
    let n = xs.mem.fetch(xs.ip as Xint)?;
    xs.ip += CELL;
    let a = xs.pop_data()?;
    xs.push_data(a.wrapping_add(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_stack() {
        let mut xs = State::boot().unwrap();
        xs.eval("1 2").unwrap();
        xs.eval("dup").unwrap();
        assert_eq!(Ok(2), xs.pop_data());
        assert_eq!(Ok(2), xs.pop_data());
        xs.eval("drop").unwrap();
        assert_eq!(Err(Xerr::StackUnderflow), xs.eval("drop"));
        assert_eq!(Err(Xerr::StackUnderflow), xs.eval("dup"));
        xs.eval("5 6 swap").unwrap();
        assert_eq!(Ok(5), xs.pop_data());
        assert_eq!(Ok(6), xs.pop_data());
        assert_eq!(Err(Xerr::StackUnderflow), xs.eval("1 swap"));
        xs.eval("1 2 3 rot").unwrap();
        assert_eq!(Ok(1), xs.pop_data());
        assert_eq!(Ok(3), xs.pop_data());
        assert_eq!(Ok(2), xs.pop_data());
        xs.eval("1 2 over").unwrap();
        assert_eq!(Ok(1), xs.pop_data());
        assert_eq!(Ok(2), xs.pop_data());
        assert_eq!(Ok(1), xs.pop_data());
        xs.eval("1 2 nip").unwrap();
        assert_eq!(Ok(2), xs.pop_data());
        assert_eq!(0, xs.data_depth());
        xs.eval("1 2 tuck").unwrap();
        assert_eq!(Ok(2), xs.pop_data());
        assert_eq!(Ok(1), xs.pop_data());
        assert_eq!(Ok(2), xs.pop_data());
        xs.eval("10 20 30 2 pick 0 pick depth").unwrap();
        assert_eq!(Ok(5), xs.pop_data());
        assert_eq!(Ok(10), xs.pop_data());
        assert_eq!(Ok(10), xs.pop_data());
        xs.eval("drop drop drop").unwrap();
        assert_eq!(Err(Xerr::StackUnderflow), xs.eval("1 2 3 pick"));
    }

    #[test]
    fn test_underflow_clears_stack() {
        let mut xs = State::boot().unwrap();
        assert_eq!(Err(Xerr::StackUnderflow), xs.eval("1 2 3 7 pick"));
        assert_eq!(0, xs.data_depth());
    }

    #[test]
    fn test_stack_overflow() {
        let mut xs = State::boot_with(Config {
            data_depth: 4,
            ..Config::default()
        })
        .unwrap();
        xs.eval("1 2 3 4").unwrap();
        assert_eq!(Err(Xerr::StackOverflow), xs.eval("5"));
    }

    #[test]
    fn test_aux_stack() {
        let mut xs = State::boot().unwrap();
        xs.eval("1 2 push 3 top pop").unwrap();
        assert_eq!(Ok(2), xs.pop_data());
        assert_eq!(Ok(2), xs.pop_data());
        assert_eq!(Ok(3), xs.pop_data());
        assert_eq!(Ok(1), xs.pop_data());
        assert_eq!(Err(Xerr::AuxStackUnderflow), xs.eval("pop"));
        assert_eq!(Err(Xerr::AuxStackUnderflow), xs.eval("top"));
    }

    #[test]
    fn test_frame_locals() {
        let mut xs = State::boot().unwrap();
        xs.eval("7 my! 8 at! my at").unwrap();
        assert_eq!(Ok(8), xs.pop_data());
        assert_eq!(Ok(7), xs.pop_data());
        // every call gets its own at and my
        xs.eval(": f my 1 my! my ; 5 my! f my").unwrap();
        assert_eq!(Ok(5), xs.pop_data());
        assert_eq!(Ok(1), xs.pop_data());
        assert_eq!(Ok(0), xs.pop_data());
    }

    #[test]
    fn test_at_stream() {
        let mut xs = State::boot().unwrap();
        xs.eval("create buf 0 , 0 , buf at! 11 !+ 22 !+ buf at! @+ @+ at buf -").unwrap();
        assert_eq!(Ok(16), xs.pop_data());
        assert_eq!(Ok(22), xs.pop_data());
        assert_eq!(Ok(11), xs.pop_data());
        xs.eval("buf at! 65 c!+ 66 c!+ buf at! c@+ c@+").unwrap();
        assert_eq!(Ok(66), xs.pop_data());
        assert_eq!(Ok(65), xs.pop_data());
    }

    #[test]
    fn test_memory_words() {
        let mut xs = State::boot().unwrap();
        xs.eval("create x 5 , x @ 3 x +! x @ 300 x c! x c@").unwrap();
        assert_eq!(Ok(44), xs.pop_data());
        assert_eq!(Ok(8), xs.pop_data());
        assert_eq!(Ok(5), xs.pop_data());
        xs.eval("cell 3 cells").unwrap();
        assert_eq!(Ok(24), xs.pop_data());
        assert_eq!(Ok(8), xs.pop_data());
        assert_eq!(Err(Xerr::InvalidAddress(-8)), xs.eval("-8 @"));
        assert_eq!(Err(Xerr::InvalidAddress(Xint::MAX)), xs.eval("1 9223372036854775807 !"));
    }

    #[test]
    fn test_heap_words() {
        let mut xs = State::boot().unwrap();
        xs.eval("100 allocate dup 0<>").unwrap();
        assert_eq!(Ok(TRUE), xs.pop_data());
        xs.eval("dup 42 swap ! 200 resize dup @ swap free").unwrap();
        assert_eq!(Ok(42), xs.pop_data());
        assert_eq!(0, xs.data_depth());
    }

    #[test]
    fn test_execute() {
        let mut xs = State::boot().unwrap();
        xs.eval("3 'dup execute").unwrap();
        assert_eq!(Ok(3), xs.pop_data());
        assert_eq!(Ok(3), xs.pop_data());
        xs.eval(": sq dup * ; : apply execute ; 4 'sq apply").unwrap();
        assert_eq!(Ok(16), xs.pop_data());
        xs.eval("0 execute").unwrap();
        assert_eq!(0, xs.data_depth());
        assert_eq!(Err(Xerr::InvalidToken(30000)), xs.eval("30000 execute"));
    }

    #[test]
    fn test_exit_and_return_stack() {
        let mut xs = State::boot().unwrap();
        xs.eval(": f 1 exit 2 ; f").unwrap();
        assert_eq!(Ok(1), xs.pop_data());
        assert_eq!(0, xs.data_depth());
        assert_eq!(Err(Xerr::ReturnStackUnderflow), xs.eval("exit"));
        assert_eq!(1, xs.return_depth());
    }

    #[test]
    fn test_bye() {
        let mut xs = State::boot().unwrap();
        assert_eq!(Err(Xerr::Exit(0)), xs.eval("bye"));
    }

    #[test]
    fn test_console_output() {
        let mut xs = State::boot().unwrap();
        xs.capture_stdout();
        xs.eval("72 emit 105 emit \"!\" type").unwrap();
        assert_eq!(Some(&mut "Hi!".to_string()), xs.console());
    }

    #[test]
    fn test_dispatch_behaviors() {
        let mut xs = State::boot().unwrap();
        xs.eval("create v 9 ,  v @").unwrap();
        assert_eq!(Ok(9), xs.pop_data());
        xs.eval("7 value seven seven").unwrap();
        assert_eq!(Ok(7), xs.pop_data());
        xs.eval("100 sys:adder plus100 5 plus100").unwrap();
        assert_eq!(Ok(105), xs.pop_data());
    }

    #[test]
    fn test_base_values() {
        let mut xs = State::boot().unwrap();
        xs.eval("5 value v 10 to v v").unwrap();
        assert_eq!(Ok(10), xs.pop_data());
        xs.eval(": set-v to v ; 42 set-v v").unwrap();
        assert_eq!(Ok(42), xs.pop_data());
        assert_eq!(Err(Xerr::InvalidToken(0)), xs.eval("3 to nosuch"));
        xs.eval("defer greet 'dup is greet 4 greet").unwrap();
        assert_eq!(Ok(4), xs.pop_data());
        assert_eq!(Ok(4), xs.pop_data());
        xs.eval("0 enum red enum green enum blue drop red green blue true false null")
            .unwrap();
        for n in [0, 0, -1, 2, 1, 0].iter() {
            assert_eq!(Ok(*n), xs.pop_data());
        }
    }

    #[test]
    fn test_base_is() {
        let mut xs = State::boot().unwrap();
        xs.eval(": g 1 ; : h 2 ; 'h is g g").unwrap();
        assert_eq!(Ok(2), xs.pop_data());
        // callers compiled before the rebinding follow it too
        xs.eval(": k 3 ; : call-g g ; 'k is g call-g").unwrap();
        assert_eq!(Ok(3), xs.pop_data());
        xs.eval(": use-h 'h is g ; use-h g").unwrap();
        assert_eq!(Ok(2), xs.pop_data());
        xs.eval("'+ is g 4 5 g").unwrap();
        assert_eq!(Ok(9), xs.pop_data());
        assert_eq!(Err(Xerr::InvalidToken(0)), xs.eval("'h is nosuch"));
        assert_eq!(Err(Xerr::InvalidToken(0)), xs.eval("0 is g"));
        xs.eval(": inc 1+ ; 0 'inc 5 times").unwrap();
        assert_eq!(Ok(5), xs.pop_data());
        xs.eval("7 constant seven seven").unwrap();
        assert_eq!(Ok(7), xs.pop_data());
    }

    #[test]
    fn test_base_print() {
        let mut xs = State::boot().unwrap();
        xs.capture_stdout();
        xs.eval("variable x 5 x ! x ? 255 .x cr").unwrap();
        xs.eval("1 2 3 .s").unwrap();
        assert_eq!(Some(&mut "5 ff \n<3> 1 2 3 ".to_string()), xs.console());
        assert_eq!(3, xs.data_depth());
    }

    #[test]
    fn test_base_predicates() {
        let mut xs = State::boot().unwrap();
        xs.eval("`5 digit? `a digit? 32 space? 3 1 5 within 5 1 5 within").unwrap();
        assert_eq!(Ok(FALSE), xs.pop_data());
        assert_eq!(Ok(TRUE), xs.pop_data());
        assert_eq!(Ok(TRUE), xs.pop_data());
        assert_eq!(Ok(FALSE), xs.pop_data());
        assert_eq!(Ok(TRUE), xs.pop_data());
        xs.eval("`F hex? `g hex? `Q alpha? `1 alpha? 3 4 2dup 2drop 2drop").unwrap();
        assert_eq!(Ok(FALSE), xs.pop_data());
        assert_eq!(Ok(TRUE), xs.pop_data());
        assert_eq!(Ok(FALSE), xs.pop_data());
        assert_eq!(Ok(TRUE), xs.pop_data());
        xs.eval("9 space? 10 space? 65 space?").unwrap();
        assert_eq!(Ok(FALSE), xs.pop_data());
        assert_eq!(Ok(TRUE), xs.pop_data());
        assert_eq!(Ok(TRUE), xs.pop_data());
        xs.eval("2 2 <= 3 2 >= 4 even? 4 odd? 16 cell+ 16 cell-").unwrap();
        assert_eq!(Ok(8), xs.pop_data());
        assert_eq!(Ok(24), xs.pop_data());
        assert_eq!(Ok(FALSE), xs.pop_data());
        assert_eq!(Ok(TRUE), xs.pop_data());
        assert_eq!(Ok(TRUE), xs.pop_data());
        assert_eq!(Ok(TRUE), xs.pop_data());
    }

    #[test]
    fn test_base_strings() {
        let mut xs = State::boot().unwrap();
        xs.eval("\"abc\" \"abc\" s= \"abc\" \"abd\" s=").unwrap();
        assert_eq!(Ok(FALSE), xs.pop_data());
        assert_eq!(Ok(TRUE), xs.pop_data());
        xs.eval("create buf 32 allot \"foo\" buf place \"bar\" buf append").unwrap();
        xs.eval("\"foobar\" s=").unwrap();
        assert_eq!(Ok(TRUE), xs.pop_data());
        xs.eval("\"xyz\" copy dup \"xyz\" s= swap free").unwrap();
        assert_eq!(Ok(TRUE), xs.pop_data());
        xs.eval("\"hello\" string greeting greeting count greeting \"hello\" s=").unwrap();
        assert_eq!(Ok(TRUE), xs.pop_data());
        assert_eq!(Ok(5), xs.pop_data());
    }

    #[test]
    fn test_base_compile_helpers() {
        let mut xs = State::boot().unwrap();
        xs.eval("macro : answer 42 number, ; : hi \"hi\" string, ; : dup-xt 'dup token, ; normal")
            .unwrap();
        xs.eval(": f answer 1 + hi count dup-xt ; f").unwrap();
        assert_eq!(Some(xs.pop_data().unwrap() as usize), xs.find_word("dup"));
        assert_eq!(Ok(2), xs.pop_data());
        assert_eq!(Ok(43), xs.pop_data());
    }

    #[test]
    fn test_base_array() {
        let mut xs = State::boot().unwrap();
        xs.eval("3 array a 7 2 a ! 4 0 a ! 9 a @ -3 a @ 1 a @").unwrap();
        assert_eq!(Ok(0), xs.pop_data());
        assert_eq!(Ok(4), xs.pop_data());
        assert_eq!(Ok(7), xs.pop_data());
    }

    #[test]
    fn test_base_stack() {
        let mut xs = State::boot().unwrap();
        xs.eval("stack s 5 s.push 7 s.push s.depth s.top s.pop s.pop s.pop s.depth")
            .unwrap();
        assert_eq!(Ok(0), xs.pop_data());
        assert_eq!(Ok(0), xs.pop_data());
        assert_eq!(Ok(5), xs.pop_data());
        assert_eq!(Ok(7), xs.pop_data());
        assert_eq!(Ok(7), xs.pop_data());
        assert_eq!(Ok(2), xs.pop_data());
        // instances keep separate storage
        xs.eval("stack t 1 t.push 2 s.push 3 s.push t.depth s.depth").unwrap();
        assert_eq!(Ok(2), xs.pop_data());
        assert_eq!(Ok(1), xs.pop_data());
        assert_eq!(0, xs.data_depth());
    }

    #[test]
    fn test_base_words_dump() {
        let mut xs = State::boot().unwrap();
        xs.capture_stdout();
        xs.eval("words").unwrap();
        let out = xs.console().unwrap().clone();
        assert!(out.starts_with("what dump words include "));
        assert!(out.ends_with(" words)\n"));
        xs.console().unwrap().clear();
        xs.eval("\"AB\" 2 dump").unwrap();
        let out = xs.console().unwrap().clone();
        assert!(out.ends_with(&format!("  41 42 {}AB\n", " ".repeat(42))));
        xs.console().unwrap().clear();
        xs.eval("create zeros 20 allot zeros 20 dump").unwrap();
        assert_eq!(2, xs.console().unwrap().lines().count());
        assert_eq!(0, xs.data_depth());
    }

    #[test]
    fn test_base_what_hook() {
        let mut xs = State::boot().unwrap();
        xs.capture_stdout();
        xs.eval("'what sys:on-what !").unwrap();
        assert_eq!(OK, xs.eval("1 frob 2"));
        assert_eq!(Some(&mut "what? frob\n".to_string()), xs.console());
        assert_eq!(Ok(1), xs.pop_data());
        assert_eq!(0, xs.data_depth());
    }
}
