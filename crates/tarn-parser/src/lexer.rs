//! Source-to-token pipeline.
//!
//! Wraps the logos-generated state machine in [`token`](crate::token)
//! and attaches a 1-based line number to every token.

use logos::Logos;
use thiserror::Error;

use crate::token::Token;

/// A lexing failure: some character the grammar does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected character '{fragment}' on line {line}")]
pub struct LexError {
    pub fragment: String,
    pub line: u32,
}

/// Strips a leading `;;;tarn` header line if present.
///
/// Returns the remaining source and the number of lines removed, so
/// callers can keep reported line numbers aligned with the file on
/// disk.
pub fn strip_header(source: &str) -> (&str, u32) {
    let trimmed = source.trim_start_matches('\u{feff}');
    if let Some(rest) = trimmed.strip_prefix(";;;tarn") {
        match rest.find('\n') {
            Some(idx) => (&rest[idx + 1..], 1),
            None => ("", 1),
        }
    } else {
        (trimmed, 0)
    }
}

/// Tokenizes `source`, pairing each token with its 1-based line.
///
/// `line_offset` shifts all reported lines; pass the count returned by
/// [`strip_header`] when lexing a file whose header was removed.
pub fn lex(source: &str, line_offset: u32) -> Result<Vec<(Token, u32)>, LexError> {
    let line_starts = line_start_table(source);
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        let line = line_of(&line_starts, lexer.span().start) + line_offset;
        match result {
            Ok(token) => tokens.push((token, line)),
            Err(()) => {
                return Err(LexError {
                    fragment: lexer.slice().to_string(),
                    line,
                })
            }
        }
    }
    Ok(tokens)
}

/// Byte offsets where each line begins. Line 1 starts at offset 0.
fn line_start_table(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (idx, byte) in source.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(idx + 1);
        }
    }
    starts
}

fn line_of(starts: &[usize], offset: usize) -> u32 {
    match starts.binary_search(&offset) {
        Ok(idx) => idx as u32 + 1,
        Err(idx) => idx as u32,
    }
}
