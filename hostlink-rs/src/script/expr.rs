//! Lexer, expression AST, expression parser, and evaluator.
//!
//! Operator precedence (lowest → highest):
//!   or  →  and  →  equality  →  relational  →  additive  →
//!   multiplicative  →  unary  →  call  →  primary

use crate::error::{BridgeError, Result};

use super::value::Value;

/// Deepest nesting of sub-expressions and blocks a script may use.
pub const MAX_NESTING: usize = 200;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Interface the evaluator uses to reach interpreter state.
///
/// [`Interpreter`](super::interp::Interpreter) implements this; tests use a
/// small map-backed context.
pub trait EvalContext {
    /// Look up a variable (locals, then globals, then foreign bindings).
    fn get_var(&mut self, name: &str) -> Result<Value>;

    /// Call whatever `name` refers to (variable holding a callable, or builtin).
    fn call_named(&mut self, name: &str, args: Vec<Value>) -> Result<Value>;

    /// Call a callable value.
    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Result<Value>;
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Magnitude only; a leading `-` is a separate token.
    Int(u64),
    Str(String),
    Ident(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,
    Assign,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Newline,
    Eof,
}

/// A token plus the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub tok: Token,
    pub line: usize,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer {
    src: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer { src: src.chars().collect(), pos: 0, line: 1 }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => self.pos += 1,
                Some('#') => self.skip_line(),
                Some('/') if self.peek2() == Some('/') => self.skip_line(),
                _ => break,
            }
        }
    }

    fn skip_line(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.pos += 1;
        }
    }

    fn read_number(&mut self, first: char) -> Result<Token> {
        let mut s = String::from(first);
        while let Some(c @ '0'..='9') = self.peek() {
            s.push(c);
            self.pos += 1;
        }
        if matches!(self.peek(), Some(c) if c.is_alphabetic() || c == '_' || c == '.') {
            return Err(BridgeError::parse(self.line, format!("malformed number '{s}…'")));
        }
        s.parse()
            .map(Token::Int)
            .map_err(|_| BridgeError::parse(self.line, format!("integer literal {s} out of range")))
    }

    fn read_string(&mut self, quote: char) -> Result<Token> {
        let start = self.line;
        let mut s = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => {
                    return Err(BridgeError::parse(start, "unterminated string literal"));
                }
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(c) => s.push(c),
                    None => return Err(BridgeError::parse(start, "unterminated string literal")),
                },
                Some(c) if c == quote => break,
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Str(s))
    }

    fn read_ident(&mut self, first: char) -> Token {
        let mut s = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                s.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        Token::Ident(s)
    }

    fn next_token(&mut self) -> Result<Spanned> {
        self.skip_ws_and_comments();
        let line = self.line;
        let Some(ch) = self.advance() else {
            return Ok(Spanned { tok: Token::Eof, line });
        };

        let tok = match ch {
            '\n' => {
                self.line += 1;
                Token::Newline
            }
            '0'..='9' => self.read_number(ch)?,
            '"' | '\'' => self.read_string(ch)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.read_ident(c),
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' => {
                if self.eat('=') {
                    Token::Ne
                } else {
                    Token::Bang
                }
            }
            '=' => {
                if self.eat('=') {
                    Token::Eq
                } else {
                    Token::Assign
                }
            }
            '<' => {
                if self.eat('=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            c => return Err(BridgeError::parse(line, format!("unexpected character {c:?}"))),
        };
        Ok(Spanned { tok, line })
    }
}

/// Split source text into tokens.  The last token is always [`Token::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    loop {
        let t = lexer.next_token()?;
        let done = t.tok == Token::Eof;
        tokens.push(t);
        if done {
            break;
        }
    }
    Ok(tokens)
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Token-stream parser shared by the expression and statement grammars.
pub struct Parser {
    pub(super) tokens: Vec<Spanned>,
    pub(super) pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser { tokens, pos: 0, depth: 0 }
    }

    /// Open one nesting level; fails once [`MAX_NESTING`] are open.
    pub(super) fn enter(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!(
                "expression too complex (more than {MAX_NESTING} nested levels)"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub(super) fn leave(&mut self, levels: usize) {
        self.depth = self.depth.saturating_sub(levels);
    }

    pub(super) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map(|t| &t.tok).unwrap_or(&Token::Eof)
    }

    pub(super) fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).map(|t| &t.tok).unwrap_or(&Token::Eof)
    }

    pub(super) fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    pub(super) fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    pub(super) fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(super) fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s == kw)
    }

    pub(super) fn expect(&mut self, expected: &Token, what: &str) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {}", describe(self.peek()))))
        }
    }

    pub(super) fn expect_ident(&mut self, what: &str) -> Result<String> {
        match self.peek().clone() {
            Token::Ident(name) if !is_reserved(&name) => {
                self.pos += 1;
                Ok(name)
            }
            other => Err(self.error(format!("expected {what}, found {}", describe(&other)))),
        }
    }

    pub(super) fn error(&self, msg: impl Into<String>) -> BridgeError {
        BridgeError::parse(self.line(), msg)
    }

    /// Skip newlines (used inside brackets and between statements).
    pub(super) fn skip_newlines(&mut self) {
        while matches!(self.peek(), Token::Newline) {
            self.pos += 1;
        }
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.enter()?;
        let expr = self.parse_or()?;
        self.leave(1);
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        let mut links = 0;
        while self.is_keyword("or") {
            self.pos += 1;
            self.enter()?;
            links += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        self.leave(links);
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        let mut links = 0;
        while self.is_keyword("and") {
            self.pos += 1;
            self.enter()?;
            links += 1;
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        self.leave(links);
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_relational()?;
        // Chains build left-deep trees, so each link counts as a level.
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Token::Eq => BinOp::Eq,
                Token::Ne => BinOp::Ne,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            links += 1;
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.leave(links);
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            links += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.leave(links);
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            links += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.leave(links);
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            links += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.leave(links);
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            Token::Ident(word) if word == "not" => UnaryOp::Not,
            _ => return self.parse_call(),
        };
        self.pos += 1;
        if op == UnaryOp::Neg {
            if let Some(n) = self.negative_literal()? {
                return Ok(Expr::Literal(Value::Int(n)));
            }
        }
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave(1);
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    /// `-<digits>` not followed by a call folds into one literal, which is
    /// the only way to write `i64::MIN`.
    fn negative_literal(&mut self) -> Result<Option<i64>> {
        let Token::Int(magnitude) = *self.peek() else {
            return Ok(None);
        };
        if *self.peek_at(1) == Token::LParen {
            return Ok(None);
        }
        let n = 0i64
            .checked_sub_unsigned(magnitude)
            .ok_or_else(|| self.error(format!("integer literal -{magnitude} out of range")))?;
        self.pos += 1;
        Ok(Some(n))
    }

    fn parse_call(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        let mut links = 0;
        while self.eat(&Token::LParen) {
            self.enter()?;
            links += 1;
            let args = self.parse_list(&Token::RParen, "')'")?;
            expr = Expr::Call(Box::new(expr), args);
        }
        self.leave(links);
        Ok(expr)
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_list(&mut self, close: &Token, what: &str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        self.skip_newlines();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            self.skip_newlines();
            items.push(self.parse_expr()?);
            self.skip_newlines();
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(&Token::Comma, &format!("',' or {what}"))?;
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let line = self.line();
        match self.advance() {
            Token::Int(n) => i64::try_from(n).map(|n| Expr::Literal(Value::Int(n))).map_err(|_| {
                BridgeError::parse(line, format!("integer literal {n} out of range"))
            }),
            Token::Str(s) => Ok(Expr::Literal(Value::str(s))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "nil" => Ok(Expr::Literal(Value::Nil)),
                kw if is_reserved(kw) => {
                    Err(BridgeError::parse(line, format!("unexpected keyword '{kw}'")))
                }
                _ => Ok(Expr::Var(name)),
            },
            Token::LParen => {
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::List(self.parse_list(&Token::RBracket, "']'")?)),
            other => Err(BridgeError::parse(
                line,
                format!("expected expression, found {}", describe(&other)),
            )),
        }
    }
}

/// Words that can never name a variable.
pub fn is_reserved(word: &str) -> bool {
    matches!(
        word,
        "var" | "foreign" | "fn" | "print" | "return" | "if" | "else" | "while" | "and"
            | "or" | "not" | "true" | "false" | "nil"
    )
}

pub(super) fn describe(tok: &Token) -> String {
    match tok {
        Token::Int(n) => format!("'{n}'"),
        Token::Str(_) => "string literal".to_owned(),
        Token::Ident(s) => format!("'{s}'"),
        Token::Newline => "end of line".to_owned(),
        Token::Eof => "end of input".to_owned(),
        other => format!("{other:?}"),
    }
}

/// Parse a standalone expression.
pub fn parse_expr(src: &str) -> Result<Expr> {
    let mut parser = Parser::new(tokenize(src)?);
    let expr = parser.parse_expr()?;
    parser.skip_newlines();
    if *parser.peek() != Token::Eof {
        return Err(parser.error(format!("unexpected {}", describe(parser.peek()))));
    }
    Ok(expr)
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate an [`Expr`] against the given context.
pub fn eval_expr(expr: &Expr, ctx: &mut dyn EvalContext) -> Result<Value> {
    eval_at(expr, ctx, 0)
}

fn eval_at(expr: &Expr, ctx: &mut dyn EvalContext, depth: usize) -> Result<Value> {
    // Parsed trees stay under the limit; hand-built ones may not.
    if depth > MAX_NESTING {
        return Err(BridgeError::fault(format!(
            "expression too complex (more than {MAX_NESTING} nested levels)"
        )));
    }
    let depth = depth + 1;

    match expr {
        Expr::Literal(v) => Ok(v.clone()),

        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_at(item, ctx, depth)?);
            }
            Ok(Value::list(values))
        }

        Expr::Var(name) => ctx.get_var(name),

        Expr::Unary(op, inner) => {
            let v = eval_at(inner, ctx, depth)?;
            match op {
                UnaryOp::Neg => v.arith_neg().map_err(BridgeError::RuntimeFault),
                UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
            }
        }

        Expr::Binary(op, lhs, rhs) => {
            // Short-circuit for and / or
            match op {
                BinOp::And => {
                    let l = eval_at(lhs, ctx, depth)?;
                    if !l.is_truthy() {
                        return Ok(l);
                    }
                    return eval_at(rhs, ctx, depth);
                }
                BinOp::Or => {
                    let l = eval_at(lhs, ctx, depth)?;
                    if l.is_truthy() {
                        return Ok(l);
                    }
                    return eval_at(rhs, ctx, depth);
                }
                _ => {}
            }
            let l = eval_at(lhs, ctx, depth)?;
            let r = eval_at(rhs, ctx, depth)?;
            eval_binop(*op, &l, &r).map_err(BridgeError::RuntimeFault)
        }

        Expr::Call(callee, arg_exprs) => eval_call(callee, arg_exprs, ctx, depth),
    }
}

/// The call arm of [`eval_at`].
#[inline(never)]
fn eval_call(
    callee: &Expr,
    arg_exprs: &[Expr],
    ctx: &mut dyn EvalContext,
    depth: usize,
) -> Result<Value> {
    let mut args = Vec::with_capacity(arg_exprs.len());
    // Callee name is resolved after the arguments are evaluated.
    for ae in arg_exprs {
        args.push(eval_at(ae, ctx, depth)?);
    }
    match callee {
        Expr::Var(name) => ctx.call_named(name, args),
        other => {
            let f = eval_at(other, ctx, depth)?;
            ctx.call_value(f, args)
        }
    }
}

fn eval_binop(op: BinOp, l: &Value, r: &Value) -> std::result::Result<Value, String> {
    use std::cmp::Ordering;
    match op {
        BinOp::Add => l.arith_add(r),
        BinOp::Sub => l.arith_sub(r),
        BinOp::Mul => l.arith_mul(r),
        BinOp::Div => l.arith_div(r),
        BinOp::Rem => l.arith_rem(r),
        BinOp::Eq => Ok(Value::Bool(l == r)),
        BinOp::Ne => Ok(Value::Bool(l != r)),
        BinOp::Lt => Ok(Value::Bool(l.cmp_value(r)? == Ordering::Less)),
        BinOp::Le => Ok(Value::Bool(l.cmp_value(r)? != Ordering::Greater)),
        BinOp::Gt => Ok(Value::Bool(l.cmp_value(r)? == Ordering::Greater)),
        BinOp::Ge => Ok(Value::Bool(l.cmp_value(r)? != Ordering::Less)),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // ── Minimal EvalContext for tests ─────────────────────────────────────────

    struct TestCtx {
        vars: HashMap<String, Value>,
    }

    impl TestCtx {
        fn new() -> Self {
            TestCtx { vars: HashMap::new() }
        }
        fn with(mut self, k: &str, v: Value) -> Self {
            self.vars.insert(k.into(), v);
            self
        }
    }

    impl EvalContext for TestCtx {
        fn get_var(&mut self, name: &str) -> Result<Value> {
            self.vars
                .get(name)
                .cloned()
                .ok_or_else(|| BridgeError::fault(format!("undefined variable '{name}'")))
        }
        fn call_named(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
            match name {
                "count" => Ok(Value::Int(args.len() as i64)),
                _ => Err(BridgeError::fault("no functions in test ctx")),
            }
        }
        fn call_value(&mut self, _callee: Value, _args: Vec<Value>) -> Result<Value> {
            Err(BridgeError::fault("no functions in test ctx"))
        }
    }

    fn eval(src: &str) -> Value {
        let expr = parse_expr(src).expect("parse failed");
        eval_expr(&expr, &mut TestCtx::new()).expect("eval failed")
    }

    fn eval_err(src: &str) -> BridgeError {
        let expr = parse_expr(src).expect("parse failed");
        eval_expr(&expr, &mut TestCtx::new()).unwrap_err()
    }

    #[test]
    fn literals() {
        assert_eq!(eval("42"), Value::Int(42));
        assert_eq!(eval("'hello'"), Value::str("hello"));
        assert_eq!(eval("\"double\""), Value::str("double"));
        assert_eq!(eval("true"), Value::Bool(true));
        assert_eq!(eval("nil"), Value::Nil);
    }

    #[test]
    fn unicode_string_literal() {
        assert_eq!(eval("'héllo 世界'"), Value::str("héllo 世界"));
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval("(2 + 3) * 4"), Value::Int(20));
        assert_eq!(eval("10 % 3"), Value::Int(1));
        assert_eq!(eval("-(3 + 2)"), Value::Int(-5));
    }

    #[test]
    fn comparison_and_logic() {
        assert_eq!(eval("3 == 3"), Value::Bool(true));
        assert_eq!(eval("2 < 3 and 3 <= 3"), Value::Bool(true));
        assert_eq!(eval("nil or 7"), Value::Int(7));
        assert_eq!(eval("not true"), Value::Bool(false));
        assert_eq!(eval("!nil"), Value::Bool(true));
        assert_eq!(eval("'a' != 'b'"), Value::Bool(true));
    }

    #[test]
    fn short_circuit_skips_rhs() {
        // rhs would fail with an undefined variable
        assert_eq!(eval("false and missing"), Value::Bool(false));
        assert_eq!(eval("1 or missing"), Value::Int(1));
    }

    #[test]
    fn list_literal() {
        assert_eq!(
            eval("[1, 'a', [true]]"),
            Value::list(vec![Value::Int(1), Value::str("a"), Value::list(vec![Value::Bool(true)])])
        );
        assert_eq!(eval("[]"), Value::list(vec![]));
    }

    #[test]
    fn variable_lookup() {
        let expr = parse_expr("x + 1").unwrap();
        let mut ctx = TestCtx::new().with("x", Value::Int(7));
        assert_eq!(eval_expr(&expr, &mut ctx).unwrap(), Value::Int(8));
    }

    #[test]
    fn named_call() {
        assert_eq!(eval("count(1, 2, 3)"), Value::Int(3));
        assert_eq!(eval("count()"), Value::Int(0));
    }

    #[test]
    fn division_by_zero_is_fault() {
        match eval_err("1 / 0") {
            BridgeError::RuntimeFault(msg) => assert_eq!(msg, "division by zero"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_errors_carry_line() {
        let err = parse_expr("\n\n1 +").unwrap_err();
        assert!(matches!(err, BridgeError::Parse { line: 3, .. }), "{err:?}");
        assert!(matches!(parse_expr("'open"), Err(BridgeError::Parse { .. })));
        assert!(matches!(parse_expr("1 $ 2"), Err(BridgeError::Parse { .. })));
        assert!(matches!(parse_expr("99999999999999999999"), Err(BridgeError::Parse { .. })));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(eval("1 + 2 // trailing"), Value::Int(3));
        assert_eq!(eval("4 # hash comment"), Value::Int(4));
    }

    #[test]
    fn keyword_is_not_an_expression() {
        assert!(parse_expr("while").is_err());
    }

    fn too_complex(src: &str) -> bool {
        matches!(
            parse_expr(src),
            Err(BridgeError::Parse { ref message, .. }) if message.contains("too complex")
        )
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        let parens = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(too_complex(&parens));
        assert!(too_complex(&"-".repeat(200_000)));
        assert!(too_complex(&format!("{}1", "not ".repeat(1_000))));
        assert!(too_complex(&format!("{}1{}", "[".repeat(1_000), "]".repeat(1_000))));
    }

    #[test]
    fn long_chains_are_bounded() {
        assert!(too_complex(&format!("1{}", " + 1".repeat(10_000))));
        assert!(too_complex(&format!("f{}", "()".repeat(10_000))));
        assert_eq!(eval(&format!("1{}", " + 1".repeat(100))), Value::Int(101));
    }

    #[test]
    fn moderate_nesting_is_fine() {
        let src = format!("{}7{}", "(".repeat(MAX_NESTING / 2), ")".repeat(MAX_NESTING / 2));
        assert_eq!(eval(&src), Value::Int(7));
        assert_eq!(eval("- - -3"), Value::Int(-3));
    }

    #[test]
    fn hand_built_deep_tree_is_a_fault() {
        let mut expr = Expr::Literal(Value::Int(1));
        for _ in 0..MAX_NESTING + 10 {
            expr = Expr::Unary(UnaryOp::Neg, Box::new(expr));
        }
        match eval_expr(&expr, &mut TestCtx::new()) {
            Err(BridgeError::RuntimeFault(msg)) => assert!(msg.contains("too complex"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn minimum_integer_literal() {
        assert_eq!(eval("-9223372036854775808"), Value::Int(i64::MIN));
        assert_eq!(eval("-9223372036854775807 - 1"), Value::Int(i64::MIN));
        assert!(matches!(parse_expr("9223372036854775808"), Err(BridgeError::Parse { .. })));
        assert!(matches!(parse_expr("-9223372036854775809"), Err(BridgeError::Parse { .. })));
    }

    #[test]
    fn negated_literal_keeps_precedence() {
        assert_eq!(eval("-2 * 3"), Value::Int(-6));
        assert_eq!(eval("1 -2"), Value::Int(-1));
        assert_eq!(eval("--5"), Value::Int(5));
    }
}
