//! Recursive descent parser for sketch script

use std::rc::Rc;

use super::ast::{
    BinaryOp, CastKind, Declarator, Expr, ExprKind, FunctionDecl, Line, LogicalOp, Param,
    Program, Stmt, SwitchCase, UnaryOp,
};
use super::token::{Keyword, Punct, Token, TokenKind, tokenize};
use crate::error::ParseError;

/// Parse rewritten sketch text into a program
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(Program { body })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Binary operator levels, loosest first
const BINARY_LEVELS: [&[(Punct, BinaryOp)]; 8] = [
    &[(Punct::Pipe, BinaryOp::BitOr)],
    &[(Punct::Caret, BinaryOp::BitXor)],
    &[(Punct::Amp, BinaryOp::BitAnd)],
    &[(Punct::Eq, BinaryOp::Eq), (Punct::NotEq, BinaryOp::NotEq)],
    &[
        (Punct::Lt, BinaryOp::Lt),
        (Punct::Gt, BinaryOp::Gt),
        (Punct::Le, BinaryOp::Le),
        (Punct::Ge, BinaryOp::Ge),
    ],
    &[(Punct::Shl, BinaryOp::Shl), (Punct::Shr, BinaryOp::Shr)],
    &[(Punct::Plus, BinaryOp::Add), (Punct::Minus, BinaryOp::Sub)],
    &[
        (Punct::Star, BinaryOp::Mul),
        (Punct::Slash, BinaryOp::Div),
        (Punct::Percent, BinaryOp::Rem),
    ],
];

const fn compound_assignment(punct: Punct) -> Option<Option<BinaryOp>> {
    Some(match punct {
        Punct::Assign => None,
        Punct::PlusAssign => Some(BinaryOp::Add),
        Punct::MinusAssign => Some(BinaryOp::Sub),
        Punct::StarAssign => Some(BinaryOp::Mul),
        Punct::SlashAssign => Some(BinaryOp::Div),
        Punct::PercentAssign => Some(BinaryOp::Rem),
        Punct::AmpAssign => Some(BinaryOp::BitAnd),
        Punct::PipeAssign => Some(BinaryOp::BitOr),
        Punct::CaretAssign => Some(BinaryOp::BitXor),
        Punct::ShlAssign => Some(BinaryOp::Shl),
        Punct::ShrAssign => Some(BinaryOp::Shr),
        _ => return None,
    })
}

/// Map the words of a C type name to a conversion
fn cast_kind(words: &[&str]) -> Option<CastKind> {
    let int = |bits, signed| Some(CastKind::Int { bits, signed });
    match words {
        ["uint8_t" | "byte"] | ["unsigned", "char"] => int(8, false),
        ["int8_t" | "char"] | ["signed", "char"] => int(8, true),
        ["uint16_t" | "word"] | ["unsigned", "short"] => int(16, false),
        ["int16_t" | "short"] | ["signed", "short"] => int(16, true),
        ["uint32_t" | "size_t" | "unsigned"]
        | ["unsigned", "int" | "long"]
        | ["unsigned", "long", "int"] => int(32, false),
        ["int32_t" | "int" | "long" | "signed"]
        | ["signed", "int" | "long"]
        | ["long", "int"] => int(32, true),
        ["uint64_t"] | ["unsigned", "long", "long"] => int(64, false),
        ["int64_t"] | ["long", "long"] | ["signed", "long", "long"] => int(64, true),
        ["float" | "double"] => Some(CastKind::Float),
        ["bool" | "boolean"] => Some(CastKind::Bool),
        _ => None,
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Int(value) => format!("number {value}"),
        TokenKind::Float(value) => format!("number {value}"),
        TokenKind::Str(text) => format!("string {text:?}"),
        TokenKind::Ident(name) => format!("`{name}`"),
        TokenKind::Keyword(keyword) => format!("keyword {keyword:?}").to_lowercase(),
        TokenKind::Punct(punct) => format!("{punct:?}"),
        TokenKind::Eof => "end of input".to_owned(),
    }
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn line(&self) -> Line {
        let index = self.pos.min(self.tokens.len() - 1);
        self.tokens[index].line
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        kind
    }

    fn is_punct(&self, punct: Punct) -> bool {
        *self.peek() == TokenKind::Punct(punct)
    }

    fn is_keyword(&self, keyword: Keyword) -> bool {
        *self.peek() == TokenKind::Keyword(keyword)
    }

    fn eat_punct(&mut self, punct: Punct) -> bool {
        let found = self.is_punct(punct);
        if found {
            self.pos += 1;
        }
        found
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        let found = self.is_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::new(
            self.line(),
            format!("expected {expected}, found {}", describe(self.peek())),
        )
    }

    fn expect_punct(&mut self, punct: Punct, expected: &str) -> Result<(), ParseError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn ident(&mut self, expected: &str) -> Result<Rc<str>, ParseError> {
        if let TokenKind::Ident(name) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            Ok(name)
        } else {
            Err(self.unexpected(expected))
        }
    }

    // Statements

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        match self.peek() {
            TokenKind::Keyword(Keyword::Let | Keyword::Var | Keyword::Const) => {
                let stmt = self.declarations()?;
                self.expect_punct(Punct::Semicolon, "`;` after declaration")?;
                Ok(stmt)
            }
            TokenKind::Keyword(Keyword::Async | Keyword::Function) => {
                Ok(Stmt::Function(Rc::new(self.function()?)))
            }
            TokenKind::Punct(Punct::LBrace) => Ok(Stmt::Block(self.block()?)),
            TokenKind::Punct(Punct::Semicolon) => {
                self.pos += 1;
                Ok(Stmt::Empty)
            }
            TokenKind::Keyword(Keyword::If) => {
                self.pos += 1;
                let test = self.condition()?;
                let then = Box::new(self.statement()?);
                let otherwise = if self.eat_keyword(Keyword::Else) {
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    test,
                    then,
                    otherwise,
                })
            }
            TokenKind::Keyword(Keyword::While) => {
                self.pos += 1;
                let test = self.condition()?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::While { test, body })
            }
            TokenKind::Keyword(Keyword::Do) => {
                self.pos += 1;
                let body = Box::new(self.statement()?);
                if !self.eat_keyword(Keyword::While) {
                    return Err(self.unexpected("`while` after `do` body"));
                }
                let test = self.condition()?;
                self.expect_punct(Punct::Semicolon, "`;` after `do … while`")?;
                Ok(Stmt::DoWhile { body, test })
            }
            TokenKind::Keyword(Keyword::For) => self.for_statement(),
            TokenKind::Keyword(Keyword::Switch) => self.switch_statement(),
            TokenKind::Keyword(Keyword::Return) => {
                self.pos += 1;
                let value = if self.is_punct(Punct::Semicolon) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect_punct(Punct::Semicolon, "`;` after return")?;
                Ok(Stmt::Return { value, line })
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.pos += 1;
                self.expect_punct(Punct::Semicolon, "`;` after break")?;
                Ok(Stmt::Break(line))
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.pos += 1;
                self.expect_punct(Punct::Semicolon, "`;` after continue")?;
                Ok(Stmt::Continue(line))
            }
            _ => {
                let expr = self.expression()?;
                self.expect_punct(Punct::Semicolon, "`;` after expression")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect_punct(Punct::LBrace, "`{`")?;
        let mut body = Vec::new();
        while !self.eat_punct(Punct::RBrace) {
            if self.at_eof() {
                return Err(self.unexpected("`}`"));
            }
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn condition(&mut self) -> Result<Expr, ParseError> {
        self.expect_punct(Punct::LParen, "`(`")?;
        let test = self.expression()?;
        self.expect_punct(Punct::RParen, "`)`")?;
        Ok(test)
    }

    /// `let a = 1, b` without the trailing `;`
    fn declarations(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.advance();
        let mut declarators = Vec::new();
        loop {
            let name = self.ident("variable name")?;
            let init = if self.eat_punct(Punct::Assign) {
                Some(self.assignment()?)
            } else {
                None
            };
            declarators.push(Declarator { name, init });
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        Ok(Stmt::Let { declarators, line })
    }

    fn function(&mut self) -> Result<FunctionDecl, ParseError> {
        let line = self.line();
        self.eat_keyword(Keyword::Async);
        if !self.eat_keyword(Keyword::Function) {
            return Err(self.unexpected("`function`"));
        }
        let name = self.ident("function name")?;
        self.expect_punct(Punct::LParen, "`(` after function name")?;
        let mut params = Vec::new();
        while !self.eat_punct(Punct::RParen) {
            let name = self.ident("parameter name")?;
            let default = if self.eat_punct(Punct::Assign) {
                Some(self.assignment()?)
            } else {
                None
            };
            params.push(Param { name, default });
            if !self.eat_punct(Punct::Comma) {
                self.expect_punct(Punct::RParen, "`)` after parameters")?;
                break;
            }
        }
        let body = self.block()?;
        Ok(FunctionDecl {
            name,
            params,
            body,
            line,
        })
    }

    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1;
        self.expect_punct(Punct::LParen, "`(` after for")?;
        let init = match self.peek() {
            TokenKind::Punct(Punct::Semicolon) => None,
            TokenKind::Keyword(Keyword::Let | Keyword::Var | Keyword::Const) => {
                Some(Box::new(self.declarations()?))
            }
            _ => Some(Box::new(Stmt::Expr(self.expression()?))),
        };
        self.expect_punct(Punct::Semicolon, "`;` in for")?;
        let test = if self.is_punct(Punct::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(Punct::Semicolon, "`;` in for")?;
        let mut step = Vec::new();
        if !self.is_punct(Punct::RParen) {
            loop {
                step.push(self.assignment()?);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RParen, "`)` after for clauses")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::For {
            init,
            test,
            step,
            body,
        })
    }

    fn switch_statement(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1;
        let discriminant = self.condition()?;
        self.expect_punct(Punct::LBrace, "`{` after switch")?;
        let mut cases = Vec::new();
        while !self.eat_punct(Punct::RBrace) {
            let test = if self.eat_keyword(Keyword::Case) {
                Some(self.expression()?)
            } else if self.eat_keyword(Keyword::Default) {
                None
            } else {
                return Err(self.unexpected("`case` or `default`"));
            };
            self.expect_punct(Punct::Colon, "`:` after case")?;
            let mut body = Vec::new();
            while !matches!(
                self.peek(),
                TokenKind::Keyword(Keyword::Case | Keyword::Default)
                    | TokenKind::Punct(Punct::RBrace)
                    | TokenKind::Eof
            ) {
                body.push(self.statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(Stmt::Switch {
            discriminant,
            cases,
        })
    }

    // Expressions

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let target = self.conditional()?;
        let TokenKind::Punct(punct) = *self.peek() else {
            return Ok(target);
        };
        let Some(op) = compound_assignment(punct) else {
            return Ok(target);
        };
        if !matches!(
            target.kind,
            ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        ) {
            return Err(ParseError::new(target.line, "invalid assignment target"));
        }
        self.pos += 1;
        let value = self.assignment()?;
        let line = target.line;
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            line,
        ))
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.logical_or()?;
        if !self.eat_punct(Punct::Question) {
            return Ok(test);
        }
        let then = self.assignment()?;
        self.expect_punct(Punct::Colon, "`:` in conditional")?;
        let otherwise = self.assignment()?;
        let line = test.line;
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            line,
        ))
    }

    fn logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.logical_and()?;
        while self.eat_punct(Punct::OrOr) {
            let right = self.logical_and()?;
            let line = left.line;
            left = Expr::new(
                ExprKind::Logical(LogicalOp::Or, Box::new(left), Box::new(right)),
                line,
            );
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.binary(0)?;
        while self.eat_punct(Punct::AndAnd) {
            let right = self.binary(0)?;
            let line = left.line;
            left = Expr::new(
                ExprKind::Logical(LogicalOp::And, Box::new(left), Box::new(right)),
                line,
            );
        }
        Ok(left)
    }

    fn binary(&mut self, level: usize) -> Result<Expr, ParseError> {
        let Some(operators) = BINARY_LEVELS.get(level) else {
            return self.unary();
        };
        let mut left = self.binary(level + 1)?;
        loop {
            let TokenKind::Punct(punct) = *self.peek() else {
                return Ok(left);
            };
            let Some(&(_, op)) = operators.iter().find(|(p, _)| *p == punct) else {
                return Ok(left);
            };
            self.pos += 1;
            let right = self.binary(level + 1)?;
            let line = left.line;
            left = Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), line);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let op = match self.peek() {
            TokenKind::Punct(Punct::Bang) => Some(UnaryOp::Not),
            TokenKind::Punct(Punct::Minus) => Some(UnaryOp::Neg),
            TokenKind::Punct(Punct::Plus) => Some(UnaryOp::Plus),
            TokenKind::Punct(Punct::Tilde) => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let operand = self.unary()?;
            return Ok(Expr::new(ExprKind::Unary(op, Box::new(operand)), line));
        }

        if let TokenKind::Punct(punct @ (Punct::PlusPlus | Punct::MinusMinus)) = *self.peek() {
            self.pos += 1;
            let target = self.unary()?;
            return Ok(Expr::new(
                ExprKind::Update {
                    increment: punct == Punct::PlusPlus,
                    prefix: true,
                    target: Box::new(target),
                },
                line,
            ));
        }

        if self.eat_keyword(Keyword::Await) {
            let operand = self.unary()?;
            return Ok(Expr::new(ExprKind::Await(Box::new(operand)), line));
        }

        if let Some((kind, len)) = self.cast_ahead() {
            self.pos += len;
            let operand = self.unary()?;
            return Ok(Expr::new(ExprKind::Cast(kind, Box::new(operand)), line));
        }

        self.postfix()
    }

    /// A `(type words)` prefix followed by an operand, with its token length
    fn cast_ahead(&self) -> Option<(CastKind, usize)> {
        if !self.is_punct(Punct::LParen) {
            return None;
        }
        let mut words = Vec::new();
        let mut offset = 1;
        while let TokenKind::Ident(word) = self.peek_at(offset) {
            words.push(word.as_ref());
            offset += 1;
        }
        if *self.peek_at(offset) != TokenKind::Punct(Punct::RParen) {
            return None;
        }
        let kind = cast_kind(&words)?;
        let starts_operand = matches!(
            self.peek_at(offset + 1),
            TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::Ident(_)
                | TokenKind::Keyword(
                    Keyword::True
                        | Keyword::False
                        | Keyword::Undefined
                        | Keyword::Null
                        | Keyword::Await
                )
                | TokenKind::Punct(
                    Punct::LParen
                        | Punct::LBracket
                        | Punct::Bang
                        | Punct::Tilde
                        | Punct::Minus
                        | Punct::Plus
                        | Punct::PlusPlus
                        | Punct::MinusMinus
                )
        );
        starts_operand.then_some((kind, offset + 1))
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            let line = self.line();
            if self.eat_punct(Punct::LParen) {
                let args = self.arguments(Punct::RParen)?;
                expr = Expr::new(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    line,
                );
            } else if self.eat_punct(Punct::Dot) {
                let name = self.ident("property name")?;
                expr = Expr::new(
                    ExprKind::Member {
                        object: Box::new(expr),
                        name,
                    },
                    line,
                );
            } else if self.eat_punct(Punct::LBracket) {
                let index = self.expression()?;
                self.expect_punct(Punct::RBracket, "`]`")?;
                expr = Expr::new(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    line,
                );
            } else if let TokenKind::Punct(punct @ (Punct::PlusPlus | Punct::MinusMinus)) =
                *self.peek()
            {
                self.pos += 1;
                expr = Expr::new(
                    ExprKind::Update {
                        increment: punct == Punct::PlusPlus,
                        prefix: false,
                        target: Box::new(expr),
                    },
                    line,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma separated expressions up to `close`, trailing comma allowed
    fn arguments(&mut self, close: Punct) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        while !self.eat_punct(close) {
            args.push(self.assignment()?);
            if !self.eat_punct(Punct::Comma) {
                self.expect_punct(close, "`,` or closing bracket")?;
                break;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let kind = match self.advance() {
            TokenKind::Int(value) => ExprKind::Int(value),
            TokenKind::Float(value) => ExprKind::Float(value),
            TokenKind::Str(text) => ExprKind::Str(text),
            TokenKind::Ident(name) => ExprKind::Ident(name),
            TokenKind::Keyword(Keyword::True) => ExprKind::Bool(true),
            TokenKind::Keyword(Keyword::False) => ExprKind::Bool(false),
            TokenKind::Keyword(Keyword::Undefined | Keyword::Null) => ExprKind::Undefined,
            TokenKind::Punct(Punct::LParen) => {
                let inner = self.expression()?;
                self.expect_punct(Punct::RParen, "`)`")?;
                return Ok(inner);
            }
            TokenKind::Punct(Punct::LBracket) => ExprKind::Array(self.arguments(Punct::RBracket)?),
            other => {
                return Err(ParseError::new(
                    line,
                    format!("expected expression, found {}", describe(&other)),
                ));
            }
        };
        Ok(Expr::new(kind, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(src: &str) -> ExprKind {
        let program = parse(&format!("{src};")).unwrap();
        match program.body.into_iter().next() {
            Some(Stmt::Expr(expr)) => expr.kind,
            other => panic!("not an expression: {other:?}"),
        }
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        let ExprKind::Binary(BinaryOp::Add, _, right) = expr("1 + 2 * 3") else {
            panic!("expected addition");
        };
        assert!(matches!(right.kind, ExprKind::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn test_cast_binds_to_operand() {
        let ExprKind::Binary(BinaryOp::Mul, left, _) = expr("(uint8_t)x * 2") else {
            panic!("expected multiplication");
        };
        assert!(matches!(
            left.kind,
            ExprKind::Cast(
                CastKind::Int {
                    bits: 8,
                    signed: false
                },
                _
            )
        ));
    }

    #[test]
    fn test_parenthesised_name_is_not_a_cast() {
        assert!(matches!(
            expr("(count) - 1"),
            ExprKind::Binary(BinaryOp::Sub, _, _)
        ));
    }

    #[test]
    fn test_unsigned_long_cast() {
        assert!(matches!(
            expr("(unsigned long)millis()"),
            ExprKind::Cast(
                CastKind::Int {
                    bits: 32,
                    signed: false
                },
                _
            )
        ));
    }

    #[test]
    fn test_function_with_defaults() {
        let program = parse("async function f(a, b = 2) { return a + b; }").unwrap();
        let Some(Stmt::Function(decl)) = program.body.first() else {
            panic!("expected function");
        };
        assert_eq!(decl.params.len(), 2);
        assert!(decl.params[1].default.is_some());
    }

    #[test]
    fn test_for_with_step_list() {
        let program = parse("for (let i = 0, j = 9; i < j; i++, j--) {}").unwrap();
        let Some(Stmt::For { step, .. }) = program.body.first() else {
            panic!("expected for");
        };
        assert_eq!(step.len(), 2);
    }

    #[test]
    fn test_error_carries_line() {
        let err = parse("let a = 1;\nlet b = ;").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(parse("1 = 2;").is_err());
    }
}
