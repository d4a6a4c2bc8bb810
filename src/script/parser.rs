//! Script parser.
//!
//! A recursive-descent parser producing the [`crate::script::ast`] types
//! from the token stream. Parse errors carry the source line so a broken
//! script's failing assertion points at the offending statement.

use super::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use super::lexer::{tokenize, LexError, SpannedToken, Token};
use std::fmt;

/// Parse error with its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            message: err.message,
            line: err.line,
        }
    }
}

/// Parses a script into a statement list.
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();

    while !parser.at_end() {
        if parser.eat(&Token::Semicolon) {
            continue;
        }
        statements.push(parser.parse_stmt()?);
    }

    Ok(statements)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, context: &str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {} {}",
                token,
                context
            )))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.line(),
        }
    }

    // ---- statements ----

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Some(Token::Var) | Some(Token::Let) | Some(Token::Const) => self.parse_var_decl(),
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => self.parse_while(),
            Some(Token::For) => self.parse_for(),
            Some(Token::Return) => {
                self.advance();
                let value = match self.peek() {
                    None | Some(Token::Semicolon) | Some(Token::RBrace) => None,
                    _ => Some(self.parse_expr()?),
                };
                self.eat(&Token::Semicolon);
                Ok(Stmt::Return(value))
            }
            Some(Token::Break) => {
                self.advance();
                self.eat(&Token::Semicolon);
                Ok(Stmt::Break)
            }
            Some(Token::Continue) => {
                self.advance();
                self.eat(&Token::Semicolon);
                Ok(Stmt::Continue)
            }
            None => Err(self.error("unexpected end of script")),
            _ => {
                let expr = self.parse_expr()?;
                self.eat(&Token::Semicolon);
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let name = match self.advance() {
            Some(Token::Ident(name)) => name,
            _ => return Err(self.error("expected variable name")),
        };
        let init = if self.eat(&Token::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.eat(&Token::Semicolon);
        Ok(Stmt::VarDecl { name, init })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(&Token::LParen, "after if")?;
        let cond = self.parse_expr()?;
        self.expect(&Token::RParen, "after if condition")?;
        let then_branch = self.parse_block_or_stmt()?;

        let else_branch = if self.eat(&Token::Else) {
            if self.peek() == Some(&Token::If) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block_or_stmt()?)
            }
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(&Token::LParen, "after while")?;
        let cond = self.parse_expr()?;
        self.expect(&Token::RParen, "after while condition")?;
        let body = self.parse_block_or_stmt()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(&Token::LParen, "after for")?;

        let init = if self.peek() == Some(&Token::Semicolon) {
            self.advance();
            None
        } else {
            let stmt = match self.peek() {
                Some(Token::Var) | Some(Token::Let) | Some(Token::Const) => {
                    self.parse_var_decl()?
                }
                _ => {
                    let expr = self.parse_expr()?;
                    self.eat(&Token::Semicolon);
                    Stmt::Expr(expr)
                }
            };
            Some(Box::new(stmt))
        };

        let cond = if self.peek() == Some(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&Token::Semicolon, "after for condition")?;

        let update = if self.peek() == Some(&Token::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&Token::RParen, "after for clauses")?;

        let body = self.parse_block_or_stmt()?;
        Ok(Stmt::For {
            init,
            cond,
            update,
            body,
        })
    }

    fn parse_block_or_stmt(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if self.eat(&Token::LBrace) {
            self.parse_block_body()
        } else {
            Ok(vec![self.parse_stmt()?])
        }
    }

    /// Parses statements until the closing brace, consuming it.
    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while self.peek() != Some(&Token::RBrace) {
            if self.at_end() {
                return Err(self.error("unterminated block"));
            }
            if self.eat(&Token::Semicolon) {
                continue;
            }
            statements.push(self.parse_stmt()?);
        }
        self.advance();
        Ok(statements)
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_or()?;

        if self.eat(&Token::Assign) {
            match left {
                Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. } => {
                    let value = self.parse_assignment()?;
                    Ok(Expr::Assign {
                        target: Box::new(left),
                        value: Box::new(value),
                    })
                }
                _ => Err(self.error("invalid assignment target")),
            }
        } else {
            Ok(left)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_equality()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Bang) {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        if self.eat(&Token::Minus) {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.eat(&Token::Dot) {
                let property = self.parse_property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_expr()?;
                self.expect(&Token::RBracket, "after index expression")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(&Token::LParen) {
                let args = self.parse_args()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Property names after `.` may be identifiers or keywords: the expect
    /// chain ends in properties like `.true` and `.null`.
    fn parse_property_name(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            Some(Token::True) => Ok("true".to_string()),
            Some(Token::False) => Ok("false".to_string()),
            Some(Token::Null) => Ok("null".to_string()),
            Some(Token::Undefined) => Ok("undefined".to_string()),
            _ => Err(self.error("expected property name after '.'")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen, "after call arguments")?;
            break;
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        // Single-parameter arrow: `x => ...`
        if let (Some(Token::Ident(_)), Some(Token::Arrow)) = (self.peek(), self.peek_at(1)) {
            let param = match self.advance() {
                Some(Token::Ident(name)) => name,
                _ => unreachable!(),
            };
            self.advance();
            let body = self.parse_arrow_body()?;
            return Ok(Expr::Function {
                params: vec![param],
                body,
            });
        }

        match self.peek().cloned() {
            Some(Token::Num(n)) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Some(Token::Str(s)) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Some(Token::True) => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Some(Token::False) => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Some(Token::Null) | Some(Token::Undefined) => {
                self.advance();
                Ok(Expr::Null)
            }
            Some(Token::Ident(name)) => {
                self.advance();
                Ok(Expr::Ident(name))
            }
            Some(Token::Function) => self.parse_function_expr(),
            Some(Token::LParen) => {
                if self.is_arrow_ahead() {
                    self.parse_arrow_expr()
                } else {
                    self.advance();
                    let expr = self.parse_expr()?;
                    self.expect(&Token::RParen, "after parenthesized expression")?;
                    Ok(expr)
                }
            }
            Some(Token::LBracket) => {
                self.advance();
                let mut elements = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        elements.push(self.parse_expr()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(&Token::RBracket, "after array elements")?;
                        break;
                    }
                }
                Ok(Expr::Array(elements))
            }
            Some(Token::LBrace) => self.parse_object_literal(),
            Some(other) => Err(self.error(format!("unexpected token: {}", other))),
            None => Err(self.error("unexpected end of script")),
        }
    }

    fn parse_function_expr(&mut self) -> Result<Expr, ParseError> {
        self.advance();
        // Optional function name, ignored: only function expressions exist
        // in the subset.
        if let Some(Token::Ident(_)) = self.peek() {
            self.advance();
        }
        self.expect(&Token::LParen, "after function")?;
        let params = self.parse_params()?;
        self.expect(&Token::LBrace, "before function body")?;
        let body = self.parse_block_body()?;
        Ok(Expr::Function { params, body })
    }

    /// Checks whether the upcoming `( ... )` is an arrow parameter list.
    fn is_arrow_ahead(&self) -> bool {
        let mut depth = 0;
        let mut offset = 0;
        loop {
            match self.peek_at(offset) {
                Some(Token::LParen) => depth += 1,
                Some(Token::RParen) => {
                    depth -= 1;
                    if depth == 0 {
                        return self.peek_at(offset + 1) == Some(&Token::Arrow);
                    }
                }
                None => return false,
                _ => {}
            }
            offset += 1;
        }
    }

    fn parse_arrow_expr(&mut self) -> Result<Expr, ParseError> {
        self.expect(&Token::LParen, "before arrow parameters")?;
        let params = self.parse_params()?;
        self.expect(&Token::Arrow, "after arrow parameters")?;
        let body = self.parse_arrow_body()?;
        Ok(Expr::Function { params, body })
    }

    fn parse_arrow_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if self.eat(&Token::LBrace) {
            self.parse_block_body()
        } else {
            let expr = self.parse_expr()?;
            Ok(vec![Stmt::Return(Some(expr))])
        }
    }

    /// Parses a parameter list, consuming the closing parenthesis.
    fn parse_params(&mut self) -> Result<Vec<String>, ParseError> {
        let mut params = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(params);
        }
        loop {
            match self.advance() {
                Some(Token::Ident(name)) => params.push(name),
                _ => return Err(self.error("expected parameter name")),
            }
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen, "after parameters")?;
            break;
        }
        Ok(params)
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        self.advance();
        let mut properties = Vec::new();

        if self.eat(&Token::RBrace) {
            return Ok(Expr::Object(properties));
        }

        loop {
            let key = match self.advance() {
                Some(Token::Ident(name)) => name,
                Some(Token::Str(s)) => s,
                Some(Token::Num(n)) => format_number_key(n),
                _ => return Err(self.error("expected object key")),
            };
            self.expect(&Token::Colon, "after object key")?;
            let value = self.parse_expr()?;
            properties.push((key, value));

            if self.eat(&Token::Comma) {
                // Trailing comma before the closing brace.
                if self.eat(&Token::RBrace) {
                    break;
                }
                continue;
            }
            self.expect(&Token::RBrace, "after object properties")?;
            break;
        }

        Ok(Expr::Object(properties))
    }
}

fn format_number_key(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
