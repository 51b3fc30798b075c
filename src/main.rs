use std::{
    fs::File,
    io::{self, BufRead, BufReader},
};

use anyhow::{anyhow, bail, Context};
use clap::{App, Arg};
use kscope::{
    driver::{ReadChars, Session, SessionConfig, DEFAULT_PROMPT},
    eval::DEFAULT_MAX_CALL_DEPTH,
    lexer::Lexer,
    parser::Parser,
};

fn main() -> anyhow::Result<()> {
    let matches = App::new("kscope")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("FILE")
                .help("program to run, reads stdin when omitted")
                .index(1),
        )
        .arg(
            Arg::with_name("emit-ast")
                .long("emit-ast")
                .help("print each parsed item as an S-expression"),
        )
        .arg(
            Arg::with_name("parse-only")
                .long("parse-only")
                .help("parse items without evaluating them"),
        )
        .arg(
            Arg::with_name("no-prompt")
                .long("no-prompt")
                .help("do not print a prompt when reading stdin"),
        )
        .arg(
            Arg::with_name("max-depth")
                .long("max-depth")
                .takes_value(true)
                .value_name("N")
                .help("maximum call depth while evaluating"),
        )
        .get_matches();

    let max_call_depth = match matches.value_of("max-depth") {
        Some(depth) => depth
            .parse()
            .with_context(|| format!("invalid --max-depth value {}", depth))?,
        None => DEFAULT_MAX_CALL_DEPTH,
    };

    let path = matches.value_of("FILE");
    let interactive = path.is_none() && !matches.is_present("no-prompt");

    let config = SessionConfig {
        prompt: if interactive {
            Some(DEFAULT_PROMPT.to_string())
        } else {
            None
        },
        emit_ast: matches.is_present("emit-ast"),
        evaluate: !matches.is_present("parse-only"),
        max_call_depth,
    };

    let reader: Box<dyn BufRead> = match path {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut parser = Parser::new(Lexer::new(ReadChars::new(reader)));

    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut session = Session::new(config, stdout.lock(), stderr.lock());
    let summary = session.run(&mut parser)?;

    if let Some(error) = parser.lexer().input().error() {
        return Err(anyhow!("failed to read input: {}", error));
    }

    if !interactive && summary.has_errors() {
        bail!(
            "finished with {} syntax error(s) and {} evaluation error(s)",
            summary.syntax_errors,
            summary.eval_errors
        );
    }

    Ok(())
}
