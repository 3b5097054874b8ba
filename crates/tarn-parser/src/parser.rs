//! Recursive-descent parser for Tarn.
//!
//! One statement per newline-terminated line; `{ ... }` blocks.
//! Expression precedence, loosest first: `or`, `and`, comparisons,
//! `|`, `^`, `&`, shifts, additive, multiplicative, unary, postfix.

use thiserror::Error;

use crate::ast::{BinOp, Expr, Stmt, UnOp};
use crate::lexer::{self, LexError};
use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected {found} on line {line}, expected {expected}")]
    Unexpected {
        expected: String,
        found: String,
        line: u32,
    },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: String },
    #[error("invalid assignment target on line {line}")]
    InvalidAssignTarget { line: u32 },
}

/// Parses a token stream into a statement list.
pub fn parse(tokens: Vec<(Token, u32)>) -> Result<Vec<Stmt>, ParseError> {
    Parser::new(tokens).program()
}

/// Lexes and parses source text, stripping a `;;;tarn` header if present.
pub fn parse_source(source: &str) -> Result<Vec<Stmt>, ParseError> {
    let (body, offset) = lexer::strip_header(source);
    let tokens = lexer::lex(body, offset)?;
    parse(tokens)
}

pub struct Parser {
    tokens: Vec<(Token, u32)>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<(Token, u32)>) -> Self {
        Parser { tokens, position: 0 }
    }

    fn program(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek().is_none() {
                return Ok(statements);
            }
            statements.push(self.statement()?);
        }
    }

    // --- token plumbing -------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.position + offset).map(|(t, _)| t)
    }

    fn line(&self) -> u32 {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|&(_, line)| line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).map(|(t, _)| t.clone());
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Token::Newline)) {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(token) if token == expected => {
                self.position += 1;
                Ok(())
            }
            Some(token) => Err(ParseError::Unexpected {
                expected: what.to_string(),
                found: token.describe(),
                line: self.line(),
            }),
            None => Err(ParseError::UnexpectedEnd {
                expected: what.to_string(),
            }),
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.position += 1;
                Ok(name)
            }
            Some(token) => Err(ParseError::Unexpected {
                expected: what.to_string(),
                found: token.describe(),
                line: self.line(),
            }),
            None => Err(ParseError::UnexpectedEnd {
                expected: what.to_string(),
            }),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::Unexpected {
                expected: expected.to_string(),
                found: token.describe(),
                line: self.line(),
            },
            None => ParseError::UnexpectedEnd {
                expected: expected.to_string(),
            },
        }
    }

    // --- statements -----------------------------------------------------

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        match self.peek() {
            Some(Token::Alloc) => self.declaration(line),
            Some(Token::Emit) => {
                self.advance();
                let value = self.expr()?;
                Ok(Stmt::Emit { value, line })
            }
            Some(Token::Facts) => {
                self.advance();
                let condition = self.expr()?;
                Ok(Stmt::Facts { condition, line })
            }
            Some(Token::Import) => self.import(line),
            Some(Token::If) => self.if_statement(line),
            Some(Token::Loop) => {
                self.advance();
                let condition = self.expr()?;
                let body = self.block()?;
                Ok(Stmt::Loop {
                    condition,
                    body,
                    line,
                })
            }
            Some(Token::Break) => {
                self.advance();
                Ok(Stmt::Break { line })
            }
            Some(Token::Try) => self.try_statement(line),
            Some(Token::Proc) => self.func_def(line),
            Some(Token::Return) => {
                self.advance();
                let value = match self.peek() {
                    None | Some(Token::Newline) | Some(Token::RightBrace) => None,
                    _ => Some(self.expr()?),
                };
                Ok(Stmt::Return { value, line })
            }
            Some(_) => self.expr_or_assignment(line),
            None => Err(ParseError::UnexpectedEnd {
                expected: "a statement".to_string(),
            }),
        }
    }

    fn declaration(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect(&Token::Alloc, "'alloc'")?;
        let name = self.expect_ident("identifier after 'alloc'")?;
        self.expect(&Token::Assign, "':=' after variable name")?;
        let value = self.expr()?;
        Ok(Stmt::Decl { name, value, line })
    }

    fn import(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect(&Token::Import, "'import'")?;
        let path = match self.peek() {
            Some(Token::Str(path)) => {
                let path = path.clone();
                self.position += 1;
                path
            }
            _ => return Err(self.unexpected("string literal after 'import'")),
        };
        self.expect(&Token::As, "'as' in import")?;
        let alias = self.expect_ident("identifier after 'as'")?;
        Ok(Stmt::Import { path, alias, line })
    }

    fn if_statement(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect(&Token::If, "'if'")?;
        let condition = self.expr()?;
        let then_block = self.block()?;

        let mut elif_cases = Vec::new();
        while matches!(self.peek(), Some(Token::Elif)) {
            let elif_line = self.line();
            self.advance();
            let cond = self.expr()?;
            let block = self.block()?;
            elif_cases.push((cond, block, elif_line));
        }

        let mut tail = if matches!(self.peek(), Some(Token::Else)) {
            let else_line = self.line();
            self.advance();
            let body = self.block()?;
            Some(Box::new(Stmt::Block {
                body,
                line: else_line,
            }))
        } else {
            None
        };

        // Fold the elif chain into nested if statements, innermost first.
        for (cond, block, elif_line) in elif_cases.into_iter().rev() {
            tail = Some(Box::new(Stmt::If {
                condition: cond,
                then_block: block,
                else_tail: tail,
                line: elif_line,
            }));
        }

        Ok(Stmt::If {
            condition,
            then_block,
            else_tail: tail,
            line,
        })
    }

    fn try_statement(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect(&Token::Try, "'try'")?;
        let body = self.block()?;
        self.skip_newlines();
        self.expect(&Token::Except, "'except' after try block")?;
        self.expect(&Token::LeftParen, "'(' after 'except'")?;
        let binding = self.expect_ident("exception binding name")?;
        self.expect(&Token::RightParen, "')' after exception binding")?;
        let handler = self.block()?;
        Ok(Stmt::Try {
            body,
            binding,
            handler,
            line,
        })
    }

    fn func_def(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect(&Token::Proc, "'proc'")?;
        let name = self.expect_ident("function name")?;
        self.expect(&Token::LeftParen, "'(' after function name")?;
        let mut params = Vec::new();
        if !matches!(self.peek(), Some(Token::RightParen)) {
            params.push(self.expect_ident("parameter name")?);
            while matches!(self.peek(), Some(Token::Comma)) {
                self.advance();
                params.push(self.expect_ident("parameter name")?);
            }
        }
        self.expect(&Token::RightParen, "')' after parameters")?;
        let body = self.block()?;
        Ok(Stmt::FuncDef {
            name,
            params,
            body,
            line,
        })
    }

    /// An expression statement, or an assignment if `:=` follows. The
    /// expression already parsed is the assignment target; only plain
    /// identifiers, attribute access, and index access qualify.
    fn expr_or_assignment(&mut self, line: u32) -> Result<Stmt, ParseError> {
        // Fast path: `name := value`.
        if let (Some(Token::Ident(_)), Some(Token::Assign)) = (self.peek(), self.peek_at(1)) {
            let name = self.expect_ident("identifier")?;
            self.advance(); // :=
            let value = self.expr()?;
            return Ok(Stmt::Assign { name, value, line });
        }

        let expr = self.expr()?;
        if matches!(self.peek(), Some(Token::Assign)) {
            self.advance();
            let value = self.expr()?;
            return match expr {
                Expr::Ident(name) => Ok(Stmt::Assign { name, value, line }),
                Expr::Attr { target, name } => Ok(Stmt::AttrAssign {
                    target: *target,
                    name,
                    value,
                    line,
                }),
                Expr::Index { target, index } => Ok(Stmt::IndexAssign {
                    target: *target,
                    index: *index,
                    value,
                    line,
                }),
                _ => Err(ParseError::InvalidAssignTarget { line }),
            };
        }
        Ok(Stmt::ExprStmt { expr, line })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.skip_newlines();
        self.expect(&Token::LeftBrace, "'{'")?;
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                Some(Token::RightBrace) => {
                    self.position += 1;
                    return Ok(statements);
                }
                Some(_) => statements.push(self.statement()?),
                None => {
                    return Err(ParseError::UnexpectedEnd {
                        expected: "'}'".to_string(),
                    })
                }
            }
        }
    }

    // --- expressions ----------------------------------------------------

    pub fn expr(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and_expr()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let right = self.and_expr()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.comparison()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let right = self.comparison()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.bit_or()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                Some(Token::Less) => BinOp::Lt,
                Some(Token::LessEq) => BinOp::Le,
                Some(Token::Greater) => BinOp::Gt,
                Some(Token::GreaterEq) => BinOp::Ge,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.bit_or()?;
            left = binary(op, left, right);
        }
    }

    fn bit_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.bit_xor()?;
        while matches!(self.peek(), Some(Token::Pipe)) {
            self.advance();
            let right = self.bit_xor()?;
            left = binary(BinOp::BitOr, left, right);
        }
        Ok(left)
    }

    fn bit_xor(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.bit_and()?;
        while matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            let right = self.bit_and()?;
            left = binary(BinOp::BitXor, left, right);
        }
        Ok(left)
    }

    fn bit_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.shift()?;
        while matches!(self.peek(), Some(Token::Amp)) {
            self.advance();
            let right = self.shift()?;
            left = binary(BinOp::BitAnd, left, right);
        }
        Ok(left)
    }

    fn shift(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::ShiftLeft) => BinOp::Shl,
                Some(Token::ShiftRight) => BinOp::Shr,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = binary(op, left, right);
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Minus) => Some(UnOp::Neg),
            Some(Token::Tilde) => Some(UnOp::BitNot),
            Some(Token::Plus) => Some(UnOp::Plus),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::LeftParen) => {
                    self.advance();
                    let args = self.call_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                Some(Token::LeftBracket) => {
                    self.advance();
                    self.skip_newlines();
                    let start = self.expr()?;
                    if matches!(self.peek(), Some(Token::Colon)) {
                        self.advance();
                        let end = if matches!(self.peek(), Some(Token::RightBracket)) {
                            None
                        } else {
                            Some(Box::new(self.expr()?))
                        };
                        self.expect(&Token::RightBracket, "']' after slice")?;
                        expr = Expr::Slice {
                            target: Box::new(expr),
                            start: Box::new(start),
                            end,
                        };
                    } else {
                        self.expect(&Token::RightBracket, "']' after index")?;
                        expr = Expr::Index {
                            target: Box::new(expr),
                            index: Box::new(start),
                        };
                    }
                }
                Some(Token::Dot) => {
                    self.advance();
                    let name = self.expect_ident("attribute name after '.'")?;
                    expr = Expr::Attr {
                        target: Box::new(expr),
                        name,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        self.skip_newlines();
        if matches!(self.peek(), Some(Token::RightParen)) {
            self.position += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            self.skip_newlines();
            match self.peek() {
                Some(Token::Comma) => {
                    self.position += 1;
                    self.skip_newlines();
                }
                Some(Token::RightParen) => {
                    self.position += 1;
                    return Ok(args);
                }
                _ => return Err(self.unexpected("',' or ')' in argument list")),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Int(value)) => {
                let value = *value;
                self.position += 1;
                Ok(Expr::Int(value))
            }
            Some(Token::Str(value)) => {
                let value = value.clone();
                self.position += 1;
                Ok(Expr::Str(value))
            }
            Some(Token::True) => {
                self.position += 1;
                Ok(Expr::Bool(true))
            }
            Some(Token::False) => {
                self.position += 1;
                Ok(Expr::Bool(false))
            }
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.position += 1;
                Ok(Expr::Ident(name))
            }
            Some(Token::LeftParen) => {
                self.position += 1;
                self.skip_newlines();
                let expr = self.expr()?;
                self.skip_newlines();
                self.expect(&Token::RightParen, "')'")?;
                Ok(expr)
            }
            Some(Token::LeftBracket) => self.list_literal(),
            Some(Token::LeftBrace) => self.dict_literal(),
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn list_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect(&Token::LeftBracket, "'['")?;
        let mut elements = Vec::new();
        self.skip_newlines();
        if matches!(self.peek(), Some(Token::RightBracket)) {
            self.position += 1;
            return Ok(Expr::List(elements));
        }
        loop {
            elements.push(self.expr()?);
            self.skip_newlines();
            match self.peek() {
                Some(Token::Comma) => {
                    self.position += 1;
                    self.skip_newlines();
                    // Trailing comma before the closing bracket.
                    if matches!(self.peek(), Some(Token::RightBracket)) {
                        self.position += 1;
                        return Ok(Expr::List(elements));
                    }
                }
                Some(Token::RightBracket) => {
                    self.position += 1;
                    return Ok(Expr::List(elements));
                }
                _ => return Err(self.unexpected("',' or ']' in list")),
            }
        }
    }

    fn dict_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect(&Token::LeftBrace, "'{'")?;
        let mut pairs = Vec::new();
        self.skip_newlines();
        if matches!(self.peek(), Some(Token::RightBrace)) {
            self.position += 1;
            return Ok(Expr::Dict(pairs));
        }
        loop {
            let key = match self.peek() {
                Some(Token::Str(key)) => {
                    let key = key.clone();
                    self.position += 1;
                    key
                }
                Some(Token::Ident(key)) => {
                    let key = key.clone();
                    self.position += 1;
                    key
                }
                _ => return Err(self.unexpected("dictionary key")),
            };
            self.expect(&Token::Colon, "':' after dictionary key")?;
            self.skip_newlines();
            let value = self.expr()?;
            pairs.push((key, value));
            self.skip_newlines();
            match self.peek() {
                Some(Token::Comma) => {
                    self.position += 1;
                    self.skip_newlines();
                    if matches!(self.peek(), Some(Token::RightBrace)) {
                        self.position += 1;
                        return Ok(Expr::Dict(pairs));
                    }
                }
                Some(Token::RightBrace) => {
                    self.position += 1;
                    return Ok(Expr::Dict(pairs));
                }
                _ => return Err(self.unexpected("',' or '}' in dictionary")),
            }
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
