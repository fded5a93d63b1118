//! Statement AST and script-level parser.
//!
//! A script is a sequence of statements separated by newlines or `;`.
//! Blocks are delimited by `{` … `}` and may span lines.

use std::rc::Rc;

use crate::error::Result;

use super::expr::{describe, tokenize, Expr, Parser, Token};
use super::value::ScriptFn;

/// A parsed statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// `var name [= expr]`
    Var { name: String, init: Option<Expr> },
    /// `name = expr`
    Assign { name: String, value: Expr },
    /// `foreign var name`
    ForeignVar { name: String },
    /// `foreign fn name`
    ForeignFn { name: String },
    /// `print expr`
    Print { value: Expr },
    /// `fn name(params) { body }`
    FnDef(Rc<ScriptFn>),
    /// `return [expr]`
    Return { value: Option<Expr> },
    /// `if cond { … } [else { … } | else if …]`
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        else_block: Vec<Stmt>,
    },
    /// `while cond { … }`
    While { cond: Expr, body: Vec<Stmt> },
    /// Bare expression, evaluated for its side effects.
    Expr(Expr),
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Parse a whole script into a list of statements.
pub fn parse_script(src: &str) -> Result<Vec<Stmt>> {
    let mut parser = Parser::new(tokenize(src)?);
    let mut stmts = Vec::new();
    loop {
        parser.skip_separators();
        if *parser.peek() == Token::Eof {
            return Ok(stmts);
        }
        stmts.push(parser.parse_stmt()?);
        parser.end_of_stmt()?;
    }
}

impl Parser {
    fn skip_separators(&mut self) {
        while matches!(self.peek(), Token::Newline | Token::Semicolon) {
            self.pos += 1;
        }
    }

    /// A statement must be followed by a separator, a closing brace, or EOF.
    fn end_of_stmt(&mut self) -> Result<()> {
        match self.peek() {
            Token::Newline | Token::Semicolon => {
                self.pos += 1;
                Ok(())
            }
            Token::RBrace | Token::Eof => Ok(()),
            other => Err(self.error(format!("unexpected {} after statement", describe(other)))),
        }
    }

    fn at_stmt_end(&self) -> bool {
        matches!(
            self.peek(),
            Token::Newline | Token::Semicolon | Token::RBrace | Token::Eof
        )
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&Token::LBrace, "'{'")?;
        self.enter()?;
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            match self.peek() {
                Token::RBrace => {
                    self.pos += 1;
                    self.leave(1);
                    return Ok(stmts);
                }
                Token::Eof => return Err(self.error("missing '}' before end of input")),
                _ => {}
            }
            stmts.push(self.parse_stmt()?);
            self.end_of_stmt()?;
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let keyword = match self.peek() {
            Token::Ident(word) => word.clone(),
            _ => return Ok(Stmt::Expr(self.parse_expr()?)),
        };

        match keyword.as_str() {
            "var" => {
                self.pos += 1;
                let name = self.expect_ident("variable name")?;
                let init = if self.eat(&Token::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(Stmt::Var { name, init })
            }
            "foreign" => {
                self.pos += 1;
                let what = self.advance();
                let name = self.expect_ident("foreign symbol name")?;
                match what {
                    Token::Ident(w) if w == "var" => Ok(Stmt::ForeignVar { name }),
                    Token::Ident(w) if w == "fn" => Ok(Stmt::ForeignFn { name }),
                    other => Err(self.error(format!(
                        "expected 'var' or 'fn' after 'foreign', found {}",
                        describe(&other)
                    ))),
                }
            }
            "print" => {
                self.pos += 1;
                Ok(Stmt::Print { value: self.parse_expr()? })
            }
            "fn" => {
                self.pos += 1;
                self.parse_fn_def()
            }
            "return" => {
                self.pos += 1;
                let value = if self.at_stmt_end() {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                Ok(Stmt::Return { value })
            }
            "if" => {
                self.pos += 1;
                self.parse_if()
            }
            "while" => {
                self.pos += 1;
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::While { cond, body })
            }
            "else" => Err(self.error("'else' without 'if'")),
            _ if *self.peek_at(1) == Token::Assign => {
                let name = self.expect_ident("assignment target")?;
                self.pos += 1; // '='
                Ok(Stmt::Assign { name, value: self.parse_expr()? })
            }
            _ => Ok(Stmt::Expr(self.parse_expr()?)),
        }
    }

    fn parse_fn_def(&mut self) -> Result<Stmt> {
        let name = self.expect_ident("function name")?;
        self.expect(&Token::LParen, "'('")?;
        let mut params: Vec<String> = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                let p = self.expect_ident("parameter name")?;
                if params.contains(&p) {
                    return Err(self.error(format!("duplicate parameter '{p}'")));
                }
                params.push(p);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma, "',' or ')'")?;
            }
        }
        let body = self.parse_block()?;
        Ok(Stmt::FnDef(Rc::new(ScriptFn { name, params, body })))
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;

        // `else` may follow on the same line as `}` or on a later one.
        let save = self.pos;
        self.skip_newlines();
        let else_block = if self.is_keyword("else") {
            self.pos += 1;
            if self.is_keyword("if") {
                self.pos += 1;
                self.enter()?;
                let nested = self.parse_if()?;
                self.leave(1);
                vec![nested]
            } else {
                self.parse_block()?
            }
        } else {
            self.pos = save;
            Vec::new()
        };
        Ok(Stmt::If { cond, then_block, else_block })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
