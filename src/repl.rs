use crate::error::*;
use crate::state::*;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::{Context, Editor};
use rustyline_derive::{Helper, Highlighter, Hinter, Validator};

#[derive(Helper, Hinter, Highlighter, Validator)]
struct WordHelper {
    words: Vec<String>,
}

impl Completer for WordHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);
        let prefix = &line[start..pos];
        let found = self
            .words
            .iter()
            .filter(|w| w.starts_with(prefix))
            .map(|w| Pair {
                display: w.clone(),
                replacement: w.clone(),
            })
            .collect();
        Ok((start, found))
    }
}

/// Evaluate one console line. Ordinary errors are printed here, `bye` and
/// fatal errors are returned unprinted for the caller to report.
fn eval_line(xs: &mut State, line: &str) -> Xresult {
    let result = match xs.eval(line) {
        Ok(()) => OK,
        Err(e @ Xerr::Exit(_)) => Err(e),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            xs.print_error(&e);
            OK
        }
    };
    crate::file::flush_stdout();
    result
}

/// Interactive console. Returns when input ends, on `bye` with
/// `Xerr::Exit`, or with a fatal error.
pub fn console_repl(xs: &mut State, load_history: bool) -> Xresult {
    let mut rl = Editor::<WordHelper>::new();
    rl.set_helper(Some(WordHelper {
        words: xs.word_names(),
    }));
    if load_history {
        let _ = rl.load_history("history.txt");
    }
    let result = loop {
        let readline = rl.readline(">");
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str());
                if let Err(e) = eval_line(xs, &line) {
                    break Err(e);
                }
                if let Some(h) = rl.helper_mut() {
                    h.words = xs.word_names();
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break OK;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break OK;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break OK;
            }
        }
    };
    if load_history {
        if let Err(e) = rl.save_history("history.txt") {
            println!("history save failed: {:}", e);
        }
    }
    result
}
