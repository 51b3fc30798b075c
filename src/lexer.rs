use std::{collections::HashMap, fmt, num::ParseFloatError, str::Chars};

use lazy_static::lazy_static;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Eof,
    Def,
    Extern,
    If,
    Then,
    Else,
    Ident(String),
    Number(f64),
    /// Any other single character: punctuation and operators.
    Char(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => write!(f, "end of input"),
            Token::Def => write!(f, "'def'"),
            Token::Extern => write!(f, "'extern'"),
            Token::If => write!(f, "'if'"),
            Token::Then => write!(f, "'then'"),
            Token::Else => write!(f, "'else'"),
            Token::Ident(name) => write!(f, "identifier '{}'", name),
            Token::Number(value) => write!(f, "number {}", value),
            Token::Char(c) => write!(f, "'{}'", c),
        }
    }
}

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, Token> = {
        let mut map = HashMap::new();
        map.insert("def", Token::Def);
        map.insert("extern", Token::Extern);
        map.insert("if", Token::If);
        map.insert("then", Token::Then);
        map.insert("else", Token::Else);
        map
    };
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum LexError {
    #[error("invalid number literal '{text}': {source}")]
    InvalidNumber {
        text: String,
        source: ParseFloatError,
    },
}

/// Pull-based tokenizer: hands out one token per `next_token` call and only
/// reads as many characters from `input` as that token needs.
#[derive(Debug, Clone)]
pub struct Lexer<I> {
    input: I,
    current: Option<char>,
    identifier: String,
    number: f64,
    line: usize,
    token_line: usize,
}

impl<I: Iterator<Item = char>> Lexer<I> {
    pub fn new(input: I) -> Self {
        Self {
            input,
            // a blank lookahead means nothing is read until the first token is requested
            current: Some(' '),
            identifier: String::new(),
            number: 0.0,
            line: 1,
            token_line: 1,
        }
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    /// Text of the most recent identifier or keyword.
    pub fn last_identifier(&self) -> &str {
        &self.identifier
    }

    /// Value of the most recent number token.
    pub fn last_number(&self) -> f64 {
        self.number
    }

    /// Line on which the most recently returned token started (1-based).
    pub fn line(&self) -> usize {
        self.token_line
    }

    fn bump(&mut self) -> Option<char> {
        if self.current == Some('\n') {
            self.line += 1;
        }
        self.current = self.input.next();
        self.current
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            while self.current.map_or(false, char::is_whitespace) {
                self.bump();
            }
            self.token_line = self.line;

            let c = match self.current {
                Some(c) => c,
                None => return Ok(Token::Eof),
            };

            if c.is_alphabetic() {
                self.identifier.clear();
                while let Some(c) = self.current.filter(|c| c.is_alphanumeric()) {
                    self.identifier.push(c);
                    self.bump();
                }
                return Ok(KEYWORDS
                    .get(self.identifier.as_str())
                    .cloned()
                    .unwrap_or_else(|| Token::Ident(self.identifier.clone())));
            }

            if c.is_ascii_digit() || c == '.' {
                let mut text = String::new();
                while let Some(c) = self.current.filter(|c| c.is_ascii_digit() || *c == '.') {
                    text.push(c);
                    self.bump();
                }
                self.number = match text.parse() {
                    Ok(value) => value,
                    Err(source) => return Err(LexError::InvalidNumber { text, source }),
                };
                return Ok(Token::Number(self.number));
            }

            if c == '#' {
                loop {
                    match self.bump() {
                        Some('\n') => break,
                        None => return Ok(Token::Eof),
                        Some(_) => (),
                    }
                }
                continue;
            }

            self.bump();
            return Ok(Token::Char(c));
        }
    }
}

impl<'a> From<&'a str> for Lexer<Chars<'a>> {
    fn from(source: &'a str) -> Self {
        Lexer::new(source.chars())
    }
}
