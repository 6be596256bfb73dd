//! Lexer and recursive descent parser for policy scripts.

use super::{ErrorKind, ScriptError};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Sum,
    Pluck,
    Contains,
    Has,
    All,
    Any,
    Reject,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Builtin::Len,
            "sum" => Builtin::Sum,
            "pluck" => Builtin::Pluck,
            "contains" => Builtin::Contains,
            "has" => Builtin::Has,
            "all" => Builtin::All,
            "any" => Builtin::Any,
            "reject" => Builtin::Reject,
            _ => return None,
        })
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Pluck | Builtin::Contains | Builtin::Has => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerQuery {
    GetTransaction,
    GetAsset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// The transaction under validation.
    Tx,
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
    Ledger(LedgerQuery, Box<Expr>),
}

/// A parsed policy: every condition must hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub conditions: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Semi,
}

const TWO_CHAR_OPS: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];
const ONE_CHAR_OPS: [&str; 5] = ["<", ">", "!", "+", "-"];

fn syntax_error(message: impl Into<String>) -> ScriptError {
    ScriptError::new(ErrorKind::SyntaxError, message)
}

fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let digits: String = chars[start..i].iter().collect();
            let value = digits
                .parse::<i64>()
                .map_err(|_| syntax_error(format!("integer literal {} is out of range", digits)))?;
            tokens.push(Token::Int(value));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        if c == '"' {
            i += 1;
            let mut text = String::new();
            loop {
                match chars.get(i) {
                    None => return Err(syntax_error("unterminated string literal")),
                    Some('"') => break,
                    Some('\\') => {
                        let escaped = match chars.get(i + 1) {
                            Some('n') => '\n',
                            Some('t') => '\t',
                            Some('"') => '"',
                            Some('\\') => '\\',
                            Some(other) => {
                                return Err(syntax_error(format!("unknown escape \\{}", other)))
                            }
                            None => return Err(syntax_error("unterminated string literal")),
                        };
                        text.push(escaped);
                        i += 2;
                    }
                    Some(other) => {
                        text.push(*other);
                        i += 1;
                    }
                }
            }
            i += 1;
            tokens.push(Token::Str(text));
            continue;
        }

        let pair: String = chars[i..chars.len().min(i + 2)].iter().collect();
        if let Some(op) = TWO_CHAR_OPS.iter().find(|op| **op == pair) {
            tokens.push(Token::Op(*op));
            i += 2;
            continue;
        }

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '.' => Token::Dot,
            ',' => Token::Comma,
            ';' => Token::Semi,
            _ => match ONE_CHAR_OPS.iter().find(|op| op.starts_with(c)) {
                Some(op) => Token::Op(*op),
                None => return Err(syntax_error(format!("unexpected character `{}`", c))),
            },
        };
        tokens.push(token);
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

/// Parses `source`, refusing expressions nested deeper than `max_depth`.
pub fn parse(source: &str, max_depth: usize) -> Result<Program, ScriptError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
        depth: 0,
        max_depth,
    };

    let mut conditions = Vec::new();
    while parser.peek().is_some() {
        conditions.push(parser.expression()?);
        match parser.next() {
            None | Some(Token::Semi) => {}
            Some(other) => {
                return Err(syntax_error(format!(
                    "expected `;` between conditions, found {:?}",
                    other
                )))
            }
        }
    }

    if conditions.is_empty() {
        return Err(syntax_error("policy has no conditions"));
    }
    Ok(Program { conditions })
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ScriptError> {
        match self.next() {
            Some(ref token) if *token == expected => Ok(()),
            Some(token) => Err(syntax_error(format!(
                "expected {:?}, found {:?}",
                expected, token
            ))),
            None => Err(syntax_error(format!(
                "expected {:?}, found end of script",
                expected
            ))),
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        self.deepen()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Runs an operator or postfix chain. Every link the chain adds counts
    /// as one more level of nesting until the chain is finished.
    fn chain(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Expr, ScriptError>,
    ) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let result = parse(self);
        self.depth = base;
        result
    }

    fn deepen(&mut self) -> Result<(), ScriptError> {
        if self.depth >= self.max_depth {
            return Err(ScriptError::new(
                ErrorKind::LimitExceeded,
                format!("expressions may nest at most {} levels", self.max_depth),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        self.nested(Self::or)
    }

    fn or(&mut self) -> Result<Expr, ScriptError> {
        self.chain(|p| {
            let mut left = p.and()?;
            while p.eat_op(&["||"]).is_some() {
                p.deepen()?;
                let right = p.and()?;
                left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
            }
            Ok(left)
        })
    }

    fn and(&mut self) -> Result<Expr, ScriptError> {
        self.chain(|p| {
            let mut left = p.comparison()?;
            while p.eat_op(&["&&"]).is_some() {
                p.deepen()?;
                let right = p.comparison()?;
                left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
            }
            Ok(left)
        })
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let left = self.sum()?;
        let op = match self.eat_op(&["==", "!=", "<", "<=", ">", ">="]) {
            Some("==") => BinaryOp::Eq,
            Some("!=") => BinaryOp::Ne,
            Some("<") => BinaryOp::Lt,
            Some("<=") => BinaryOp::Le,
            Some(">") => BinaryOp::Gt,
            Some(">=") => BinaryOp::Ge,
            _ => return Ok(left),
        };
        let right = self.sum()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn sum(&mut self) -> Result<Expr, ScriptError> {
        self.chain(|p| {
            let mut left = p.unary()?;
            while let Some(op) = p.eat_op(&["+", "-"]) {
                p.deepen()?;
                let op = if op == "+" { BinaryOp::Add } else { BinaryOp::Sub };
                let right = p.unary()?;
                left = Expr::Binary(op, Box::new(left), Box::new(right));
            }
            Ok(left)
        })
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        match self.eat_op(&["!", "-"]) {
            Some("!") => self.nested(|p| Ok(Expr::Not(Box::new(p.unary()?)))),
            Some(_) => self.nested(|p| {
                Ok(Expr::Binary(
                    BinaryOp::Sub,
                    Box::new(Expr::Literal(Value::from(0))),
                    Box::new(p.unary()?),
                ))
            }),
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        self.chain(|p| {
            let mut expr = p.primary()?;
            loop {
                if p.eat(&Token::Dot) {
                    p.deepen()?;
                    match p.next() {
                        Some(Token::Ident(name)) => expr = Expr::Field(Box::new(expr), name),
                        _ => return Err(syntax_error("expected a field name after `.`")),
                    }
                } else if p.eat(&Token::LBracket) {
                    p.deepen()?;
                    let index = p.expression()?;
                    p.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                } else {
                    return Ok(expr);
                }
            }
        })
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        match self.next() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::from(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::LParen) => {
                let expr = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => self.identifier(&name),
            Some(token) => Err(syntax_error(format!("unexpected {:?}", token))),
            None => Err(syntax_error("unexpected end of script")),
        }
    }

    fn identifier(&mut self, name: &str) -> Result<Expr, ScriptError> {
        match name {
            "true" => Ok(Expr::Literal(Value::Bool(true))),
            "false" => Ok(Expr::Literal(Value::Bool(false))),
            "null" => Ok(Expr::Literal(Value::Null)),
            "tx" => Ok(Expr::Tx),
            "ledger" => {
                self.expect(Token::Dot)?;
                let query = match self.next() {
                    Some(Token::Ident(accessor)) if accessor == "get_transaction" => {
                        LedgerQuery::GetTransaction
                    }
                    Some(Token::Ident(accessor)) if accessor == "get_asset" => {
                        LedgerQuery::GetAsset
                    }
                    other => {
                        return Err(syntax_error(format!(
                            "unknown ledger accessor {:?}",
                            other
                        )))
                    }
                };
                self.expect(Token::LParen)?;
                let argument = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(Expr::Ledger(query, Box::new(argument)))
            }
            _ => {
                let builtin = Builtin::from_name(name)
                    .ok_or_else(|| syntax_error(format!("unknown name `{}`", name)))?;
                self.expect(Token::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                if args.len() != builtin.arity() {
                    return Err(syntax_error(format!(
                        "`{}` takes {} argument(s), got {}",
                        name,
                        builtin.arity(),
                        args.len()
                    )));
                }
                Ok(Expr::Call(builtin, args))
            }
        }
    }
}
