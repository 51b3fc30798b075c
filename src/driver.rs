//! The read-parse-evaluate loop.
//!
//! This is the only part of the crate that prints: syntax and evaluation
//! errors go to the error writer as `error: ...` lines, everything else to the
//! output writer.

use std::{
    collections::VecDeque,
    io::{self, BufRead, Write},
};

use crate::{
    ast::Function,
    eval::{Interpreter, Outcome, DEFAULT_MAX_CALL_DEPTH},
    parser::Parser,
    printer::AstPrinter,
};

pub const DEFAULT_PROMPT: &str = "kscope> ";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Printed before each top-level item is read; `None` disables it.
    pub prompt: Option<String>,
    pub emit_ast: bool,
    pub evaluate: bool,
    pub max_call_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prompt: Some(DEFAULT_PROMPT.to_string()),
            emit_ast: false,
            evaluate: true,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub items: usize,
    pub syntax_errors: usize,
    pub eval_errors: usize,
}

impl SessionSummary {
    pub fn has_errors(&self) -> bool {
        self.syntax_errors + self.eval_errors > 0
    }
}

pub struct Session<W, E> {
    config: SessionConfig,
    interpreter: Interpreter,
    out: W,
    err: E,
}

impl<W: Write, E: Write> Session<W, E> {
    pub fn new(config: SessionConfig, out: W, err: E) -> Self {
        let interpreter = Interpreter::new(config.max_call_depth);
        Self {
            config,
            interpreter,
            out,
            err,
        }
    }

    pub fn into_writers(self) -> (W, E) {
        (self.out, self.err)
    }

    /// Pulls items from `parser` until end of input. Errors in the input are
    /// reported and skipped; only a failing writer stops the session early.
    pub fn run<I: Iterator<Item = char>>(
        &mut self,
        parser: &mut Parser<I>,
    ) -> io::Result<SessionSummary> {
        let mut summary = SessionSummary::default();

        loop {
            self.prompt()?;
            match parser.next() {
                None => break,
                Some(Ok(function)) => {
                    summary.items += 1;
                    if !self.handle(&function)? {
                        summary.eval_errors += 1;
                    }
                }
                Some(Err(error)) => {
                    summary.syntax_errors += 1;
                    writeln!(self.err, "error: line {}: {}", parser.error_line(), error)?;
                }
            }
        }

        if self.config.prompt.is_some() {
            writeln!(self.out)?;
        }
        self.out.flush()?;
        Ok(summary)
    }

    fn prompt(&mut self) -> io::Result<()> {
        if let Some(prompt) = &self.config.prompt {
            write!(self.out, "{}", prompt)?;
            self.out.flush()?;
        }
        Ok(())
    }

    /// Returns false when the interpreter rejected the item.
    fn handle(&mut self, function: &Function) -> io::Result<bool> {
        if function.is_anonymous() {
            writeln!(self.out, "Parsed a lambda expression")?;
        } else {
            writeln!(self.out, "Parsed a function")?;
        }

        if self.config.emit_ast {
            writeln!(self.out, "{}", AstPrinter::print(function))?;
        }

        if !self.config.evaluate {
            return Ok(true);
        }

        let outcome = self.interpreter.run(function);
        write!(self.out, "{}", self.interpreter.take_output())?;
        match outcome {
            Ok(Outcome::Defined(name)) => writeln!(self.out, "Read function definition: {}", name)?,
            Ok(Outcome::Declared(name)) => writeln!(self.out, "Read extern: {}", name)?,
            Ok(Outcome::Evaluated(value)) => writeln!(self.out, "Evaluated to {}", value)?,
            Err(error) => {
                writeln!(self.err, "error: {}", error)?;
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Feeds a lexer from a buffered reader one line at a time, so an
/// interactive session only blocks when a token needs more input.
///
/// A read error ends the input; it is kept for the caller to inspect.
pub struct ReadChars<R> {
    reader: R,
    pending: VecDeque<char>,
    error: Option<io::Error>,
}

impl<R: BufRead> ReadChars<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
            error: None,
        }
    }

    pub fn error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }
}

impl<R: BufRead> Iterator for ReadChars<R> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        loop {
            if let Some(c) = self.pending.pop_front() {
                return Some(c);
            }
            if self.error.is_some() {
                return None;
            }

            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => self.pending.extend(line.chars()),
                Err(error) => {
                    self.error = Some(error);
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use pretty_assertions::assert_eq;

    fn run(config: SessionConfig, source: &str) -> (SessionSummary, String, String) {
        let mut parser = Parser::from(source);
        let mut session = Session::new(config, Vec::new(), Vec::new());
        let summary = session.run(&mut parser).unwrap();
        let (out, err) = session.into_writers();
        (
            summary,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn quiet() -> SessionConfig {
        SessionConfig {
            prompt: None,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn reports_each_item() {
        let (summary, out, err) = run(quiet(), "extern sqrt(x); def sq(x) x * x; sq(sqrt(9))");
        assert_eq!(
            out,
            "Parsed a function\nRead extern: sqrt\n\
             Parsed a function\nRead function definition: sq\n\
             Parsed a lambda expression\nEvaluated to 9\n"
        );
        assert_eq!(err, "");
        assert_eq!(
            summary,
            SessionSummary {
                items: 3,
                syntax_errors: 0,
                eval_errors: 0
            }
        );
        assert!(!summary.has_errors());
    }

    #[test]
    fn syntax_errors_are_reported_and_skipped() {
        let (summary, out, err) = run(quiet(), "def (1 2");
        assert_eq!(err, "error: line 1: expected function name\n");
        assert_eq!(
            out,
            "Parsed a lambda expression\nEvaluated to 1\n\
             Parsed a lambda expression\nEvaluated to 2\n"
        );
        assert_eq!(summary.syntax_errors, 1);
        assert_eq!(summary.items, 2);
    }

    #[test]
    fn error_lines_point_at_the_bad_token() {
        let (_, _, err) = run(quiet(), "1;\n2;\nif 1 then 2;\n");
        assert_eq!(err, "error: line 3: expected 'else'\n");
    }

    #[test]
    fn evaluation_errors_do_not_stop_the_session() {
        let (summary, out, err) = run(quiet(), "def f(x) x; def f(x) 2; f(7)");
        assert_eq!(err, "error: function f cannot be redefined\n");
        assert!(out.ends_with("Evaluated to 7\n"));
        assert_eq!(summary.eval_errors, 1);
        assert_eq!(summary.items, 3);
    }

    #[test]
    fn emits_ast_without_evaluating() {
        let config = SessionConfig {
            prompt: None,
            emit_ast: true,
            evaluate: false,
            ..SessionConfig::default()
        };
        let (_, out, err) = run(config, "missing(1) - 2");
        assert_eq!(out, "Parsed a lambda expression\n(lambda (- (call missing 1) 2))\n");
        assert_eq!(err, "");
    }

    #[test]
    fn native_output_goes_to_the_output_writer() {
        let (_, out, err) = run(quiet(), "extern printd(x); printd(42)");
        assert_eq!(
            out,
            "Parsed a function\nRead extern: printd\n\
             Parsed a lambda expression\n42\nEvaluated to 0\n"
        );
        assert_eq!(err, "");
    }

    #[test]
    fn native_output_is_kept_when_evaluation_fails() {
        let (_, out, err) = run(quiet(), "extern putchard(c); putchard(33) + missing");
        assert_eq!(err, "error: unknown variable referenced missing\n");
        assert!(!out.contains('!'));
        let (_, out, _) = run(quiet(), "extern putchard(c); extern g(); putchard(33) + g()");
        assert!(out.ends_with("Parsed a lambda expression\n!"));
    }

    #[test]
    fn prompts_before_each_item() {
        let (_, out, _) = run(SessionConfig::default(), "1;");
        assert_eq!(out, "kscope> Parsed a lambda expression\nEvaluated to 1\nkscope> \n");
    }

    #[test]
    fn reads_chars_line_by_line() {
        let input: &[u8] = b"def f(x)\n  x + 1\nf(1)\n";
        let mut parser = Parser::new(Lexer::new(ReadChars::new(input)));
        let mut session = Session::new(quiet(), Vec::new(), Vec::new());
        let summary = session.run(&mut parser).unwrap();
        assert_eq!(summary.items, 2);
        assert!(parser.lexer().input().error().is_none());
        let (out, _) = session.into_writers();
        assert!(String::from_utf8(out).unwrap().ends_with("Evaluated to 2\n"));
    }

    #[test]
    fn read_errors_end_input() {
        let input: &[u8] = &[b'1', b'\n', 0xff, b'\n'];
        let chars: Vec<char> = ReadChars::new(input).collect();
        assert_eq!(chars, vec!['1', '\n']);

        let mut reader = ReadChars::new(input);
        reader.by_ref().for_each(drop);
        assert!(reader.error().is_some());
    }
}
