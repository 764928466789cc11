use crate::cell::*;
use crate::code::Emitted;
use crate::dict::*;
use crate::error::*;
use crate::lex;
use crate::state::State;

/// Open control structure, closed by `;` or `end`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Flow {
    Colon {
        xt: usize,
        list: WordList,
        jump: usize,
        normal_mark: usize,
        macro_mark: usize,
    },
    If {
        mark: usize,
        start: Option<usize>,
    },
    Loop {
        mark: usize,
        start: Option<usize>,
    },
    Record {
        xt: usize,
        jump: usize,
        size: Xint,
        mode: Xint,
    },
}

fn pop_flow(xs: &mut State) -> Xresult1<Flow> {
    xs.flow_stack.pop().ok_or(Xerr::ControlFlowError)
}

// Structures opened at mode 0 compile into a fragment that runs as soon
// as the outermost one is closed.
fn open_block(xs: &mut State) -> Xresult1<Option<usize>> {
    let mode = xs.mode()?;
    xs.set_mode(mode + 1)?;
    if mode == 0 {
        xs.last = Emitted::Nothing;
        Ok(Some(xs.here))
    } else {
        Ok(None)
    }
}

fn close_block(xs: &mut State, start: Option<usize>) -> Xresult {
    let mode = xs.mode()? - 1;
    xs.set_mode(mode)?;
    match (mode, start) {
        (0, Some(start)) => {
            xs.compile(xs.t.exit)?;
            xs.last = Emitted::Nothing;
            tracing::trace!(start, "running top level fragment");
            xs.call(start)
        }
        _ => OK,
    }
}

fn core_word_colon(xs: &mut State) -> Xresult {
    let list = xs.dict.current();
    let normal_mark = xs.dict.head(WordList::Normal);
    let macro_mark = xs.dict.head(WordList::Macro);
    xs.compile(xs.t.jump)?;
    let jump = xs.mark()?;
    let xt = xs.label(Behavior::Enter)?;
    xs.dict.set_current(WordList::Normal);
    let mode = xs.mode()?;
    xs.set_mode(mode + 1)?;
    xs.flow_stack.push(Flow::Colon {
        xt,
        list,
        jump,
        normal_mark,
        macro_mark,
    });
    OK
}

fn core_word_semicolon(xs: &mut State) -> Xresult {
    match pop_flow(xs)? {
        Flow::Colon {
            xt,
            list,
            jump,
            normal_mark,
            macro_mark,
        } => {
            xs.compile_return()?;
            let mode = xs.mode()?;
            xs.set_mode(mode - 1)?;
            xs.dict.close_definition(xt, list, normal_mark, macro_mark);
            xs.patch(jump)?;
            tracing::debug!(name = %xs.dict.word(xt)?.name, "defined");
            OK
        }
        _ => Err(Xerr::ControlFlowError),
    }
}

fn core_word_if(xs: &mut State) -> Xresult {
    let start = open_block(xs)?;
    xs.compile(xs.t.branch)?;
    let mark = xs.mark()?;
    xs.flow_stack.push(Flow::If { mark, start });
    OK
}

fn core_word_else(xs: &mut State) -> Xresult {
    match pop_flow(xs)? {
        Flow::If { mark, start } => {
            xs.compile(xs.t.jump)?;
            let jump = xs.mark()?;
            xs.patch(mark)?;
            xs.flow_stack.push(Flow::If { mark: jump, start });
            OK
        }
        _ => Err(Xerr::ControlFlowError),
    }
}

fn core_word_for(xs: &mut State) -> Xresult {
    let start = open_block(xs)?;
    xs.compile(xs.t.loop_)?;
    let mark = xs.mark()?;
    xs.flow_stack.push(Flow::Loop { mark, start });
    OK
}

fn core_word_begin(xs: &mut State) -> Xresult {
    let start = open_block(xs)?;
    // a negative count never runs out
    xs.compile(xs.t.lit_tok)?;
    xs.emit_tok(-1i16 as Xtok)?;
    xs.compile(xs.t.loop_)?;
    let mark = xs.mark()?;
    xs.flow_stack.push(Flow::Loop { mark, start });
    OK
}

fn core_word_end(xs: &mut State) -> Xresult {
    match pop_flow(xs)? {
        Flow::If { mark, start } => {
            xs.patch(mark)?;
            close_block(xs, start)
        }
        Flow::Loop { mark, start } => {
            xs.compile(xs.t.eloop)?;
            xs.patch(mark)?;
            close_block(xs, start)
        }
        Flow::Record {
            xt,
            jump,
            size,
            mode,
        } => {
            xs.patch(jump)?;
            let body = xs.dict.word(xt)?.body;
            xs.mem.store(body, size)?;
            xs.set_mode(mode)?;
            let list = xs.dict.current();
            xs.dict.adopt(list, xt);
            OK
        }
        Flow::Colon { .. } => Err(Xerr::ControlFlowError),
    }
}

fn core_word_record(xs: &mut State) -> Xresult {
    let mode = xs.mode()?;
    xs.set_mode(0)?;
    xs.compile(xs.t.jump)?;
    let jump = xs.mark()?;
    let xt = xs.label(Behavior::DoVal)?;
    xs.ncompile(0)?;
    xs.flow_stack.push(Flow::Record {
        xt,
        jump,
        size: 0,
        mode,
    });
    OK
}

fn core_word_field(xs: &mut State) -> Xresult {
    let n = xs.pop_data()?;
    let offset = match xs.flow_stack.last_mut() {
        Some(Flow::Record { size, .. }) => {
            let offset = *size;
            *size = size.wrapping_add(n);
            offset
        }
        _ => return Err(Xerr::ControlFlowError),
    };
    xs.label(Behavior::DoAdd)?;
    xs.ncompile(offset)
}

fn core_word_does(xs: &mut State) -> Xresult {
    let definer = xs.dict.head(xs.dict.current());
    xs.compile_token_literal(definer)?;
    xs.compile(xs.t.redoes)
}

fn core_word_line_comment(xs: &mut State) -> Xresult {
    lex::skip_past(&mut xs.mem, b'\n')
}

fn core_word_comment(xs: &mut State) -> Xresult {
    lex::skip_past(&mut xs.mem, b')')
}

/// Drop structures opened after `depth`, forgetting unfinished definitions.
pub(crate) fn unwind(xs: &mut State, depth: usize) {
    while xs.flow_stack.len() > depth {
        if let Some(Flow::Colon {
            xt,
            list,
            normal_mark,
            macro_mark,
            ..
        }) = xs.flow_stack.pop()
        {
            tracing::debug!(xt, "dropping unfinished definition");
            xs.dict.unlink(list, normal_mark, macro_mark);
        }
    }
    xs.last = Emitted::Nothing;
}

pub(crate) fn load(xs: &mut State) -> Xresult {
    xs.def_macro(":", core_word_colon)?;
    xs.def_macro(";", core_word_semicolon)?;
    xs.def_macro("if", core_word_if)?;
    xs.def_macro("else", core_word_else)?;
    xs.def_macro("for", core_word_for)?;
    xs.def_macro("begin", core_word_begin)?;
    xs.def_macro("end", core_word_end)?;
    xs.def_macro("record", core_word_record)?;
    xs.def_macro("field", core_word_field)?;
    xs.def_macro("does>", core_word_does)?;
    xs.def_macro("\\", core_word_line_comment)?;
    xs.def_macro("(", core_word_comment)?;
    OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if_else() {
        let mut xs = State::boot().unwrap();
        xs.eval(": sign dup 0< if drop -1 else 0> if 1 else 0 end end ;")
            .unwrap();
        xs.eval("-5 sign 0 sign 7 sign").unwrap();
        assert_eq!(Ok(1), xs.pop_data());
        assert_eq!(Ok(0), xs.pop_data());
        assert_eq!(Ok(-1), xs.pop_data());
        xs.eval("1 if 10 end 0 if 20 end").unwrap();
        assert_eq!(Ok(10), xs.pop_data());
        assert_eq!(0, xs.data_depth());
    }

    #[test]
    fn test_branch_counter() {
        let mut xs = State::boot().unwrap();
        xs.eval(": count-up 0 swap for 1+ end ; 10 count-up 0 count-up").unwrap();
        assert_eq!(Ok(0), xs.pop_data());
        assert_eq!(Ok(10), xs.pop_data());
    }

    #[test]
    fn test_for_loop_output() {
        let mut xs = State::boot().unwrap();
        xs.capture_stdout();
        xs.eval("5 for i . end").unwrap();
        assert_eq!(Some(&mut "0 1 2 3 4 ".to_string()), xs.console());
        assert_eq!(0, xs.data_depth());
        assert_eq!(1, xs.return_depth());
        assert_eq!(0, xs.mode().unwrap());
    }

    #[test]
    fn test_nested_loops() {
        let mut xs = State::boot().unwrap();
        xs.eval("0 3 for 4 for 1+ end end").unwrap();
        assert_eq!(Ok(12), xs.pop_data());
        xs.eval(": sum 0 swap for i + end ; 5 sum").unwrap();
        assert_eq!(Ok(10), xs.pop_data());
    }

    #[test]
    fn test_begin_until() {
        let mut xs = State::boot().unwrap();
        xs.eval("0 begin 1+ dup 5 = until end").unwrap();
        assert_eq!(Ok(5), xs.pop_data());
        xs.eval("0 begin 1+ -1 until end").unwrap();
        assert_eq!(Ok(1), xs.pop_data());
        xs.eval("5 begin dup while 1- end").unwrap();
        assert_eq!(Ok(0), xs.pop_data());
    }

    #[test]
    fn test_leave_and_next() {
        let mut xs = State::boot().unwrap();
        xs.eval("0 10 for i 5 = if leave end 1+ end").unwrap();
        assert_eq!(Ok(5), xs.pop_data());
        xs.eval("0 10 for i 1 and if next end 1+ end").unwrap();
        assert_eq!(Ok(5), xs.pop_data());
        assert_eq!(Err(Xerr::LoopStackUnderflow), xs.eval("i"));
        // loop index doesn't leak into callees
        xs.eval(": peek i ;").unwrap();
        assert_eq!(Err(Xerr::LoopStackUnderflow), xs.eval("3 for peek end"));
    }

    #[test]
    fn test_exit_inside_loop() {
        let mut xs = State::boot().unwrap();
        xs.eval(": find5 10 for i 5 = if i exit end end -1 ; find5").unwrap();
        assert_eq!(Ok(5), xs.pop_data());
        xs.eval("2 for find5 drop end").unwrap();
        assert_eq!(0, xs.data_depth());
    }

    #[test]
    fn test_unbalanced() {
        let mut xs = State::boot().unwrap();
        assert_eq!(Err(Xerr::ControlFlowError), xs.eval("end"));
        assert_eq!(Err(Xerr::ControlFlowError), xs.eval(";"));
        assert_eq!(Err(Xerr::ControlFlowError), xs.eval(": f if ;"));
        assert_eq!(0, xs.mode().unwrap());
        assert_eq!(None, xs.find_word("f"));
        assert_eq!(Err(Xerr::ControlFlowError), xs.eval("else"));
        assert_eq!(Err(Xerr::ControlFlowError), xs.eval("4 field x"));
        // the interpreter is usable after a failed definition
        xs.eval(": g 1 ; g").unwrap();
        assert_eq!(Ok(1), xs.pop_data());
    }

    #[test]
    fn test_unknown_word_unwinds_definition() {
        let mut xs = State::boot().unwrap();
        let r = xs.eval(": broken 1 nosuchword ;");
        assert_eq!(Err(Xerr::UnknownWord(Xstr::from("nosuchword"))), r);
        assert_eq!(None, xs.find_word("broken"));
        assert_eq!(0, xs.mode().unwrap());
        xs.eval(": ok 2 ; ok").unwrap();
        assert_eq!(Ok(2), xs.pop_data());
    }

    #[test]
    fn test_namespaces() {
        let mut xs = State::boot().unwrap();
        xs.eval(": outer : inner 42 ; inner 1+ ;").unwrap();
        xs.eval("outer").unwrap();
        assert_eq!(Ok(43), xs.pop_data());
        assert_eq!(
            Err(Xerr::UnknownWord(Xstr::from("inner"))),
            xs.eval("inner")
        );
        xs.eval("outer:inner").unwrap();
        assert_eq!(Ok(42), xs.pop_data());
        xs.eval(": user outer:inner ; user").unwrap();
        assert_eq!(Ok(42), xs.pop_data());
    }

    #[test]
    fn test_macros() {
        let mut xs = State::boot().unwrap();
        xs.eval("macro : 3times sys:mode @ if 'dup sys:compile 'dup sys:compile else dup dup end ; normal")
            .unwrap();
        xs.eval("5 3times").unwrap();
        assert_eq!(3, xs.data_depth());
        xs.eval(": f 3times + + ; 2 f").unwrap();
        assert_eq!(Ok(6), xs.pop_data());
    }

    #[test]
    fn test_records() {
        let mut xs = State::boot().unwrap();
        xs.eval("record point cell field x cell field y end").unwrap();
        xs.eval("point").unwrap();
        assert_eq!(Ok(16), xs.pop_data());
        xs.eval("100 point:x 100 point:y").unwrap();
        assert_eq!(Ok(108), xs.pop_data());
        assert_eq!(Ok(100), xs.pop_data());
        xs.eval("create p point allot 3 p point:y ! p point:y @").unwrap();
        assert_eq!(Ok(3), xs.pop_data());
        // record.field runs both words
        xs.eval("point.y").unwrap();
        assert_eq!(Ok(24), xs.pop_data());
        xs.eval(": make-rec record r 1 field a 4 field b end r ; make-rec").unwrap();
        assert_eq!(Ok(5), xs.pop_data());
    }

    #[test]
    fn test_instance_methods() {
        let mut xs = State::boot().unwrap();
        xs.eval(": cls : get @ ; : bump 1 swap +! ; create , does> ; 5 cls o o.bump o.get")
            .unwrap();
        assert_eq!(Ok(6), xs.pop_data());
        xs.eval("10 cls p p.bump p.bump p.get o.get").unwrap();
        assert_eq!(Ok(6), xs.pop_data());
        assert_eq!(Ok(12), xs.pop_data());
        // methods stay out of the outer list
        assert_eq!(None, xs.find_word("bump"));
    }

    #[test]
    fn test_does() {
        let mut xs = State::boot().unwrap();
        xs.eval(": counter create , does> dup @ 1+ dup rot ! ; 10 counter c c c")
            .unwrap();
        assert_eq!(Ok(12), xs.pop_data());
        assert_eq!(Ok(11), xs.pop_data());
        xs.eval(": konst create , does> @ ; 99 konst k k").unwrap();
        assert_eq!(Ok(99), xs.pop_data());
    }

    #[test]
    fn test_comments() {
        let mut xs = State::boot().unwrap();
        xs.eval("1 ( 2 3 ) 4 \\ 5 6\n7").unwrap();
        assert_eq!(Ok(7), xs.pop_data());
        assert_eq!(Ok(4), xs.pop_data());
        assert_eq!(Ok(1), xs.pop_data());
        assert_eq!(0, xs.data_depth());
        xs.eval(": f ( n -- n ) 1+ \\ increment\n ; 1 f").unwrap();
        assert_eq!(Ok(2), xs.pop_data());
    }
}
