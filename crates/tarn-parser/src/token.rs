//! Token definitions for the Tarn lexer.
//!
//! The enum doubles as the logos state machine: keywords before
//! identifiers, multi-character operators before their prefixes.
//! Newlines are significant (statement terminators) and surface as
//! tokens; spaces, `#` comments, and `/** ... */` doc blocks are
//! skipped.

use logos::{Lexer, Logos, Skip};

/// A single lexical token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    /// Statement terminator; tracked so line numbers stay accurate.
    #[token("\n")]
    Newline,

    // Doc blocks may span lines; consumed in a callback.
    #[token("/**", lex_doc_block)]
    DocBlock,

    // Keywords
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("loop")]
    Loop,
    #[token("break")]
    Break,
    #[token("emit")]
    Emit,
    #[token("import")]
    Import,
    #[token("as")]
    As,
    #[token("facts")]
    Facts,
    #[token("proc")]
    Proc,
    #[token("return")]
    Return,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("alloc")]
    Alloc,
    #[token("try")]
    Try,
    #[token("except")]
    Except,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Literals
    #[regex(r"0b[01]+", parse_binary_int)]
    #[regex(r"[0-9]+", parse_int)]
    Int(i64),

    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    Str(String),

    // Identifiers (after keywords)
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Operators, longest first
    #[token(":=")]
    Assign,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("<<")]
    ShiftLeft,
    #[token(">>")]
    ShiftRight,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,

    // Delimiters
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
}

impl Token {
    /// Short description used in parse error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Newline => "newline".to_string(),
            Token::Int(v) => format!("integer {}", v),
            Token::Str(s) => format!("string \"{}\"", s),
            Token::Ident(name) => format!("identifier '{}'", name),
            other => format!("'{}'", other.literal()),
        }
    }

    fn literal(&self) -> &'static str {
        match self {
            Token::If => "if",
            Token::Elif => "elif",
            Token::Else => "else",
            Token::Loop => "loop",
            Token::Break => "break",
            Token::Emit => "emit",
            Token::Import => "import",
            Token::As => "as",
            Token::Facts => "facts",
            Token::Proc => "proc",
            Token::Return => "return",
            Token::And => "and",
            Token::Or => "or",
            Token::Alloc => "alloc",
            Token::Try => "try",
            Token::Except => "except",
            Token::True => "true",
            Token::False => "false",
            Token::Assign => ":=",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::LessEq => "<=",
            Token::GreaterEq => ">=",
            Token::ShiftLeft => "<<",
            Token::ShiftRight => ">>",
            Token::Less => "<",
            Token::Greater => ">",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Dot => ".",
            _ => "?",
        }
    }
}

fn lex_doc_block(lex: &mut Lexer<Token>) -> Skip {
    // "/**" is consumed; find the closing "*/".
    let remainder = lex.remainder();
    if let Some(end) = remainder.find("*/") {
        lex.bump(end + 2);
    } else {
        lex.bump(remainder.len());
    }
    Skip
}

fn parse_binary_int(lex: &mut Lexer<Token>) -> Option<i64> {
    i64::from_str_radix(&lex.slice()[2..], 2).ok()
}

fn parse_int(lex: &mut Lexer<Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut Lexer<Token>) -> Option<String> {
    let slice = lex.slice();
    Some(unescape(&slice[1..slice.len() - 1]))
}

fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(other) => result.push(other),
                None => break,
            }
        } else {
            result.push(c);
        }
    }
    result
}
