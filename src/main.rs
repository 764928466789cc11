use reforth::prelude::*;

use getopts::Options;

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options] [FILE]", program);
    print!("{}", opts.usage(&brief));
}

fn exit_with(xs: &mut Xstate, e: Xerr) -> ! {
    match e {
        Xerr::Exit(code) => std::process::exit(code as i32),
        e => {
            xs.print_error(&e);
            reforth::file::flush_stdout();
            std::process::exit(1);
        }
    }
}

fn parse_size(matches: &getopts::Matches, name: &str, default: usize) -> usize {
    match matches.opt_str(name) {
        Some(s) => match s.parse() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("invalid --{} value: {}", name, s);
                std::process::exit(2);
            }
        },
        None => default,
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args[0].clone();
    let mut opts = Options::new();
    opts.optopt("s", "", "run script file", "FILE");
    opts.optmulti("e", "", "evaluate expression", "EXPR");
    opts.optflag("t", "trace", "log every executed word");
    opts.optopt("", "code-size", "code space size in bytes", "BYTES");
    opts.optopt("", "max-tokens", "dictionary capacity", "N");
    opts.optopt("", "stack-depth", "data and return stack depth", "N");
    opts.optflag("", "no-base", "skip the base library");
    opts.optflag("h", "help", "print this help");
    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e);
            print_usage(&program, &opts);
            std::process::exit(2);
        }
    };
    if matches.opt_present("h") {
        print_usage(&program, &opts);
        return;
    }

    let trace = matches.opt_present("t");
    reforth::debug::init_logging(trace);

    let defaults = Config::default();
    let depth = parse_size(&matches, "stack-depth", defaults.data_depth);
    let config = Config {
        code_size: parse_size(&matches, "code-size", defaults.code_size),
        max_tokens: parse_size(&matches, "max-tokens", defaults.max_tokens),
        data_depth: depth,
        return_depth: depth,
        trace,
        base_library: !matches.opt_present("no-base"),
        ..defaults
    };
    let mut xs = match Xstate::boot_with(config) {
        Ok(xs) => xs,
        Err(e) => {
            eprintln!("{:?}", e);
            std::process::exit(1);
        }
    };

    let script = matches.opt_str("s").or_else(|| matches.free.last().cloned());
    let exprs = matches.opt_strs("e");
    if let Some(filename) = &script {
        if let Err(e) = xs.load_file(filename) {
            exit_with(&mut xs, e);
        }
    }
    for expr in &exprs {
        if let Err(e) = xs.eval(expr) {
            exit_with(&mut xs, e);
        }
    }
    reforth::file::flush_stdout();
    if script.is_none() && exprs.is_empty() {
        if let Err(e) = reforth::repl::console_repl(&mut xs, true) {
            exit_with(&mut xs, e);
        }
    }
}
