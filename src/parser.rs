use std::{collections::HashMap, str::Chars};

use lazy_static::lazy_static;

use crate::{
    ast::{BinaryOperator, Expression, Function},
    lexer::{LexError, Lexer, Token},
};

/*
primary    -> NUMBER | identexpr | '(' expr ')' | ifexpr
identexpr  -> IDENT [ '(' ( expr ( ',' expr )* )? ')' ]
ifexpr     -> 'if' expr 'then' expr 'else' expr
expr       -> primary binoprhs
binoprhs   -> ( ( '+' | '-' | '*' | '/' | '%' ) primary )*
function   -> 'def' IDENT '(' IDENT* ')' expr
            | 'extern' IDENT '(' IDENT* ')'
toplevel   -> function | expr | ';'
*/

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ParserError {
    #[error("expected ')'")]
    ExpectedCloseParen,
    #[error("expected ')' or ',' in argument list")]
    ExpectedArgumentSeparator,
    #[error("expected 'then'")]
    ExpectedThen,
    #[error("expected 'else'")]
    ExpectedElse,
    #[error("unknown token {0} while parsing expression")]
    UnknownToken(Token),
    #[error("expected function name")]
    ExpectedFunctionName,
    #[error("expected '(' in function declaration")]
    ExpectedParamsOpen,
    #[error("expected ')' in function declaration")]
    ExpectedParamsClose,
    #[error("duplicate parameter '{0}' in function declaration")]
    DuplicateParameter(String),
    #[error(transparent)]
    Lex(#[from] LexError),
}

pub type PartialParseResult = Result<Expression, ParserError>;

/// Binding strength of each binary operator; higher binds tighter.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecedenceTable(HashMap<BinaryOperator, u32>);

impl PrecedenceTable {
    pub fn new(entries: impl IntoIterator<Item = (BinaryOperator, u32)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn get(&self, operator: BinaryOperator) -> Option<u32> {
        self.0.get(&operator).copied()
    }
}

lazy_static! {
    /// Subtraction binds looser than addition in this language.
    pub static ref DEFAULT_PRECEDENCE: PrecedenceTable = PrecedenceTable::new(vec![
        (BinaryOperator::Sub, 10),
        (BinaryOperator::Add, 20),
        (BinaryOperator::Mul, 30),
        (BinaryOperator::Div, 40),
        (BinaryOperator::Mod, 50),
    ]);
}

impl Default for PrecedenceTable {
    fn default() -> Self {
        DEFAULT_PRECEDENCE.clone()
    }
}

/// Single-lookahead recursive descent parser.
///
/// The `parse_*` methods expect `current_token` to already hold the first
/// token of their production; iterating the parser takes care of that and
/// runs the top-level loop with one-token error recovery.
#[derive(Debug, Clone)]
pub struct Parser<I> {
    lexer: Lexer<I>,
    current: Token,
    precedence: PrecedenceTable,
    primed: bool,
    deferred: Option<ParserError>,
    error_line: usize,
}

impl<I: Iterator<Item = char>> Parser<I> {
    pub fn new(lexer: Lexer<I>) -> Self {
        Self::with_precedence(lexer, PrecedenceTable::default())
    }

    pub fn with_precedence(lexer: Lexer<I>, precedence: PrecedenceTable) -> Self {
        Self {
            lexer,
            current: Token::Eof,
            precedence,
            primed: false,
            deferred: None,
            error_line: 0,
        }
    }

    pub fn current_token(&self) -> &Token {
        &self.current
    }

    pub fn lexer(&self) -> &Lexer<I> {
        &self.lexer
    }

    /// Line the most recently reported error was raised on.
    pub fn error_line(&self) -> usize {
        self.error_line
    }

    /// Consumes the next token from the lexer and makes it current.
    ///
    /// On a lexical error the current token is left as it was.
    pub fn advance(&mut self) -> Result<&Token, ParserError> {
        self.current = self.lexer.next_token()?;
        self.primed = true;
        Ok(&self.current)
    }

    fn current_operator(&self) -> Option<(BinaryOperator, u32)> {
        match self.current {
            Token::Char(c) => {
                let operator = BinaryOperator::from_char(c)?;
                Some((operator, self.precedence.get(operator)?))
            }
            _ => None,
        }
    }

    pub fn parse_number(&mut self) -> PartialParseResult {
        match self.current {
            Token::Number(value) => {
                self.advance()?;
                Ok(Expression::number(value))
            }
            _ => Err(ParserError::UnknownToken(self.current.clone())),
        }
    }

    pub fn parse_nested(&mut self) -> PartialParseResult {
        self.advance()?;
        let expr = self.parse_expr()?;
        if self.current != Token::Char(')') {
            return Err(ParserError::ExpectedCloseParen);
        }
        self.advance()?;
        Ok(expr)
    }

    pub fn parse_identifier(&mut self) -> PartialParseResult {
        let name = match &self.current {
            Token::Ident(name) => name.clone(),
            other => return Err(ParserError::UnknownToken(other.clone())),
        };
        self.advance()?;

        if self.current != Token::Char('(') {
            return Ok(Expression::variable(name));
        }
        self.advance()?;

        let mut args = Vec::new();
        if self.current != Token::Char(')') {
            loop {
                args.push(self.parse_expr()?);

                if self.current == Token::Char(')') {
                    break;
                }
                if self.current != Token::Char(',') {
                    return Err(ParserError::ExpectedArgumentSeparator);
                }
                self.advance()?;
            }
        }
        self.advance()?;

        Ok(Expression::call(name, args))
    }

    pub fn parse_conditional(&mut self) -> PartialParseResult {
        self.advance()?;
        let condition = self.parse_expr()?;

        if self.current != Token::Then {
            return Err(ParserError::ExpectedThen);
        }
        self.advance()?;
        let then_branch = self.parse_expr()?;

        if self.current != Token::Else {
            return Err(ParserError::ExpectedElse);
        }
        self.advance()?;
        let else_branch = self.parse_expr()?;

        Ok(Expression::conditional(condition, then_branch, else_branch))
    }

    pub fn parse_primary(&mut self) -> PartialParseResult {
        match self.current {
            Token::Number(_) => self.parse_number(),
            Token::Ident(_) => self.parse_identifier(),
            Token::Char('(') => self.parse_nested(),
            Token::If => self.parse_conditional(),
            _ => Err(ParserError::UnknownToken(self.current.clone())),
        }
    }

    /// Precedence climbing: folds `(op primary)*` onto `lhs`, taking only
    /// operators that bind at least as tightly as `min_precedence`.
    pub fn parse_rhs(&mut self, min_precedence: u32, lhs: Expression) -> PartialParseResult {
        let mut result = lhs;

        loop {
            let (operator, precedence) = match self.current_operator() {
                Some((operator, precedence)) if precedence >= min_precedence => {
                    (operator, precedence)
                }
                _ => return Ok(result),
            };
            self.advance()?;

            let mut rhs = self.parse_primary()?;

            if let Some((_, next_precedence)) = self.current_operator() {
                if precedence < next_precedence {
                    rhs = self.parse_rhs(precedence + 1, rhs)?;
                }
            }

            result = Expression::binary(operator, result, rhs);
        }
    }

    pub fn parse_expr(&mut self) -> PartialParseResult {
        let lhs = self.parse_primary()?;
        self.parse_rhs(0, lhs)
    }

    /// Parses a `def` or `extern`. Anything other than `extern` in the
    /// current position is treated as `def`.
    pub fn parse_function(&mut self) -> Result<Function, ParserError> {
        let declaration_only = self.current == Token::Extern;
        self.advance()?;

        let name = match &self.current {
            Token::Ident(name) => name.clone(),
            _ => return Err(ParserError::ExpectedFunctionName),
        };
        self.advance()?;

        if self.current != Token::Char('(') {
            return Err(ParserError::ExpectedParamsOpen);
        }

        let mut params: Vec<String> = Vec::new();
        while let Token::Ident(param) = self.advance()? {
            if params.contains(param) {
                return Err(ParserError::DuplicateParameter(param.clone()));
            }
            params.push(param.clone());
        }

        if self.current != Token::Char(')') {
            return Err(ParserError::ExpectedParamsClose);
        }
        self.advance()?;

        if declaration_only {
            return Ok(Function::declaration(name, params));
        }
        let body = self.parse_expr()?;
        Ok(Function::definition(name, params, body))
    }

    pub fn parse_anonymous(&mut self) -> Result<Function, ParserError> {
        self.parse_expr().map(Function::anonymous)
    }

    /// Skips one token after a failed production. A lexical error hit while
    /// skipping is reported on the following step.
    fn recover(&mut self, error: ParserError) -> ParserError {
        self.error_line = self.lexer.line();
        if let Err(next) = self.advance() {
            self.deferred = Some(next);
        }
        error
    }
}

/// One top-level step per item: `;` is skipped, `def`/`extern` parse a
/// function, anything else an anonymous function. After an error exactly one
/// token is discarded, so a run of bad tokens yields one error each.
impl<I: Iterator<Item = char>> Iterator for Parser<I> {
    type Item = Result<Function, ParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.deferred.take() {
            return Some(Err(self.recover(error)));
        }
        if !self.primed {
            if let Err(error) = self.advance() {
                self.primed = true;
                return Some(Err(self.recover(error)));
            }
        }

        loop {
            let result = match self.current {
                Token::Eof => return None,
                Token::Char(';') => match self.advance() {
                    Ok(_) => continue,
                    Err(error) => Err(error),
                },
                Token::Def | Token::Extern => self.parse_function(),
                _ => self.parse_anonymous(),
            };
            return Some(result.map_err(|error| self.recover(error)));
        }
    }
}

impl<'a> From<&'a str> for Parser<Chars<'a>> {
    fn from(source: &'a str) -> Self {
        Parser::new(Lexer::from(source))
    }
}

/// Parses all of `source`, returning the items that parsed and the errors
/// that were recovered from, each in source order.
pub fn parse_str(source: &str) -> (Vec<Function>, Vec<ParserError>) {
    let mut functions = Vec::new();
    let mut errors = Vec::new();
    for item in Parser::from(source) {
        match item {
            Ok(function) => functions.push(function),
            Err(error) => errors.push(error),
        }
    }
    (functions, errors)
}
