//! Loader for the plain-text history format.
//!
//! Each line records one event as `r(key,value,session,txn)` or
//! `w(key,value,session,txn)`, all four fields unsigned integers. Sessions
//! and transactions are created on first mention, in appearance order. The
//! first mention of each key prepends `w(key, 0)` to a synthetic
//! initialisation session that is ordered before every client session, so
//! every read has a producing write even when the log starts mid-workload.
//!
//! # Example input
//!
//! ```text
//! w(1,10,1,1)
//! r(1,10,2,2)
//! w(1,11,2,2)
//! ```

use core::fmt::{self, Display, Formatter};
use core::ops::Range;

use hashbrown::{HashMap, HashSet};
use logos::Logos;

use super::types::{Event, Session, Transaction};

/// Token kinds of the text history format.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Read marker `r`.
    #[token("r")]
    Read,

    /// Write marker `w`.
    #[token("w")]
    Write,

    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token(",")]
    Comma,

    /// An unsigned integer literal.
    #[regex(r"[0-9]+")]
    Integer,

    /// A line comment starting with `#` and running to end of line.
    #[regex(r"#[^\n]*")]
    Comment,

    #[regex(r"\r?\n")]
    Newline,

    #[regex(r"[ \t]+")]
    Whitespace,
}

/// A token with its byte span in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    kind: TokenKind,
    span: Range<usize>,
}

/// A parse error with the 1-based source line it occurred on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "parse error at line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

fn line_of(input: &str, offset: usize) -> usize {
    input[..offset.min(input.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

/// Cursor over the token stream, skipping whitespace and comments.
struct Cursor<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut tokens = Vec::new();
        for (result, span) in TokenKind::lexer(input).spanned() {
            match result {
                Ok(kind) => tokens.push(Token { kind, span }),
                Err(()) => {
                    return Err(ParseError {
                        message: format!("unexpected character {:?}", &input[span.clone()]),
                        line: line_of(input, span.start),
                    })
                }
            }
        }
        Ok(Self {
            input,
            tokens,
            pos: 0,
        })
    }

    fn peek(&mut self) -> Option<&Token> {
        while let Some(token) = self.tokens.get(self.pos) {
            match token.kind {
                TokenKind::Whitespace | TokenKind::Comment => self.pos += 1,
                _ => return self.tokens.get(self.pos),
            }
        }
        None
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        match self.peek().cloned() {
            Some(token) if token.kind == kind => {
                self.pos += 1;
                Ok(token)
            }
            Some(token) => Err(ParseError {
                message: format!("expected {kind:?}, found {:?}", token.kind),
                line: line_of(self.input, token.span.start),
            }),
            None => Err(ParseError {
                message: format!("expected {kind:?}, found end of input"),
                line: line_of(self.input, self.input.len()),
            }),
        }
    }

    fn integer(&mut self) -> Result<u64, ParseError> {
        let token = self.expect(TokenKind::Integer)?;
        let text = &self.input[token.span.clone()];
        text.parse().map_err(|_| ParseError {
            message: format!("integer out of range: {text}"),
            line: line_of(self.input, token.span.start),
        })
    }
}

/// One `op(key,value,session,txn)` record.
struct Record {
    is_write: bool,
    key: u64,
    value: u64,
    session: u64,
    transaction: u64,
}

fn parse_records(input: &str) -> Result<Vec<Record>, ParseError> {
    let mut cursor = Cursor::new(input)?;
    let mut records = Vec::new();

    while let Some(token) = cursor.peek().cloned() {
        let is_write = match token.kind {
            TokenKind::Newline => {
                cursor.pos += 1;
                continue;
            }
            TokenKind::Read => false,
            TokenKind::Write => true,
            other => {
                return Err(ParseError {
                    message: format!("expected `r` or `w`, found {other:?}"),
                    line: line_of(input, token.span.start),
                })
            }
        };
        cursor.pos += 1;

        cursor.expect(TokenKind::ParenOpen)?;
        let key = cursor.integer()?;
        cursor.expect(TokenKind::Comma)?;
        let value = cursor.integer()?;
        cursor.expect(TokenKind::Comma)?;
        let session = cursor.integer()?;
        cursor.expect(TokenKind::Comma)?;
        let transaction = cursor.integer()?;
        cursor.expect(TokenKind::ParenClose)?;

        records.push(Record {
            is_write,
            key,
            value,
            session,
            transaction,
        });
    }

    Ok(records)
}

/// Parse a text history into sessions.
///
/// Session 0 of the result is the synthetic initialisation session; client
/// sessions follow in first-appearance order.
///
/// # Errors
///
/// Returns a [`ParseError`] with line information when the input does not
/// conform to the format.
pub fn parse_history(input: &str) -> Result<Vec<Session<u64, u64>>, ParseError> {
    let records = parse_records(input)?;

    // Session 0 holds the single init transaction.
    let mut sessions: Vec<Session<u64, u64>> =
        vec![vec![Transaction::committed(Vec::new())]];

    let mut session_index: HashMap<u64, usize> = HashMap::new();
    // Transactions keep the session of their first mention.
    let mut transaction_index: HashMap<u64, (usize, usize)> = HashMap::new();
    let mut seen_keys: HashSet<u64> = HashSet::new();

    for record in records {
        if seen_keys.insert(record.key) {
            sessions[0][0].events.push(Event::write(record.key, 0));
        }

        let (i_session, i_txn) = match transaction_index.get(&record.transaction) {
            Some(&position) => position,
            None => {
                let i_session = *session_index.entry(record.session).or_insert_with(|| {
                    sessions.push(Vec::new());
                    sessions.len() - 1
                });
                sessions[i_session].push(Transaction::committed(Vec::new()));
                let position = (i_session, sessions[i_session].len() - 1);
                transaction_index.insert(record.transaction, position);
                position
            }
        };

        let event = if record.is_write {
            Event::write(record.key, record.value)
        } else {
            Event::read(record.key, record.value)
        };
        sessions[i_session][i_txn].events.push(event);
    }

    Ok(sessions)
}
