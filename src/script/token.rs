//! Tokenizer for sketch script

use std::rc::Rc;

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum TokenKind {
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Ident(Rc<str>),
    Keyword(Keyword),
    Punct(Punct),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Keyword {
    Let,
    Var,
    Const,
    Function,
    Async,
    Await,
    If,
    Else,
    While,
    Do,
    For,
    Return,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    True,
    False,
    Undefined,
    Null,
}

impl Keyword {
    fn parse_from_str(word: &str) -> Option<Self> {
        Some(match word {
            "let" => Self::Let,
            "var" => Self::Var,
            "const" => Self::Const,
            "function" => Self::Function,
            "async" => Self::Async,
            "await" => Self::Await,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "do" => Self::Do,
            "for" => Self::For,
            "return" => Self::Return,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "switch" => Self::Switch,
            "case" => Self::Case,
            "default" => Self::Default,
            "true" => Self::True,
            "false" => Self::False,
            "undefined" => Self::Undefined,
            "null" => Self::Null,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Punct {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Question,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Assign,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    AndAnd,
    OrOr,
    PlusPlus,
    MinusMinus,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
}

/// Longest spellings first so that `<<=` wins over `<<` and `<`
const PUNCTUATION: [(&str, Punct); 46] = [
    ("===", Punct::Eq),
    ("!==", Punct::NotEq),
    ("<<=", Punct::ShlAssign),
    (">>=", Punct::ShrAssign),
    ("==", Punct::Eq),
    ("!=", Punct::NotEq),
    ("<=", Punct::Le),
    (">=", Punct::Ge),
    ("<<", Punct::Shl),
    (">>", Punct::Shr),
    ("&&", Punct::AndAnd),
    ("||", Punct::OrOr),
    ("++", Punct::PlusPlus),
    ("--", Punct::MinusMinus),
    ("+=", Punct::PlusAssign),
    ("-=", Punct::MinusAssign),
    ("*=", Punct::StarAssign),
    ("/=", Punct::SlashAssign),
    ("%=", Punct::PercentAssign),
    ("&=", Punct::AmpAssign),
    ("|=", Punct::PipeAssign),
    ("^=", Punct::CaretAssign),
    ("(", Punct::LParen),
    (")", Punct::RParen),
    ("{", Punct::LBrace),
    ("}", Punct::RBrace),
    ("[", Punct::LBracket),
    ("]", Punct::RBracket),
    (",", Punct::Comma),
    (";", Punct::Semicolon),
    (":", Punct::Colon),
    ("?", Punct::Question),
    (".", Punct::Dot),
    ("+", Punct::Plus),
    ("-", Punct::Minus),
    ("*", Punct::Star),
    ("/", Punct::Slash),
    ("%", Punct::Percent),
    ("&", Punct::Amp),
    ("|", Punct::Pipe),
    ("^", Punct::Caret),
    ("~", Punct::Tilde),
    ("!", Punct::Bang),
    ("=", Punct::Assign),
    ("<", Punct::Lt),
    (">", Punct::Gt),
];

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Token {
    pub(super) kind: TokenKind,
    pub(super) line: u32,
}

/// Split sketch script into tokens, ending with [`TokenKind::Eof`]
pub(super) fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).run()
}

struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: u32,
    tokens: Vec<Token>,
}

impl<'s> Lexer<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            tokens: Vec::new(),
        }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            line: self.line,
        });
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(c) = self.peek() {
            match c {
                '\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                c if c.is_whitespace() => self.pos += c.len_utf8(),
                '/' if self.rest().starts_with("//") => self.skip_line_comment(),
                '/' if self.rest().starts_with("/*") => self.skip_block_comment()?,
                '0'..='9' => self.number()?,
                '.' if self.rest()[1..].starts_with(|d: char| d.is_ascii_digit()) => {
                    self.number()?;
                }
                '"' => self.string()?,
                '\'' => self.char_literal()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.word(),
                _ => self.punct()?,
            }
        }
        self.push(TokenKind::Eof);
        Ok(self.tokens)
    }

    fn skip_line_comment(&mut self) {
        let len = self.rest().find('\n').unwrap_or(self.rest().len());
        self.pos += len;
    }

    fn skip_block_comment(&mut self) -> Result<(), ParseError> {
        let Some(end) = self.rest()[2..].find("*/") else {
            return Err(ParseError::new(self.line, "unterminated block comment"));
        };
        let body = &self.rest()[..end + 4];
        self.line += u32::try_from(body.matches('\n').count()).unwrap_or(u32::MAX);
        self.pos += body.len();
        Ok(())
    }

    fn word(&mut self) {
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        let word = &self.rest()[..len];
        self.pos += len;
        let kind = match Keyword::parse_from_str(word) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Ident(word.into()),
        };
        self.push(kind);
    }

    fn number(&mut self) -> Result<(), ParseError> {
        let rest = self.rest();
        let radix = if rest.starts_with("0x") || rest.starts_with("0X") {
            Some(16)
        } else if rest.starts_with("0b") || rest.starts_with("0B") {
            Some(2)
        } else {
            None
        };

        if let Some(radix) = radix {
            let digits_len = rest[2..]
                .find(|c: char| !c.is_digit(radix))
                .unwrap_or(rest.len() - 2);
            let digits = &rest[2..2 + digits_len];
            let value = u64::from_str_radix(digits, radix)
                .map_err(|_| ParseError::new(self.line, format!("invalid number {rest:.12}")))?;
            self.pos += 2 + digits_len;
            self.skip_suffix("uUlL");
            #[allow(clippy::cast_possible_wrap)]
            self.push(TokenKind::Int(value as i64));
            return Ok(());
        }

        let bytes = rest.as_bytes();
        let mut len = 0;
        let mut is_float = false;
        while len < bytes.len() && bytes[len].is_ascii_digit() {
            len += 1;
        }
        if len < bytes.len() && bytes[len] == b'.' {
            is_float = true;
            len += 1;
            while len < bytes.len() && bytes[len].is_ascii_digit() {
                len += 1;
            }
        }
        if len < bytes.len() && (bytes[len] == b'e' || bytes[len] == b'E') {
            let mut exp = len + 1;
            if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
                exp += 1;
            }
            if exp < bytes.len() && bytes[exp].is_ascii_digit() {
                is_float = true;
                len = exp;
                while len < bytes.len() && bytes[len].is_ascii_digit() {
                    len += 1;
                }
            }
        }

        let text = &rest[..len];
        self.pos += len;
        let kind = if is_float {
            self.skip_suffix("fFlL");
            TokenKind::Float(
                text.parse()
                    .map_err(|_| ParseError::new(self.line, format!("invalid number {text}")))?,
            )
        } else {
            self.skip_suffix("uUlL");
            TokenKind::Int(
                text.parse()
                    .map_err(|_| ParseError::new(self.line, format!("invalid number {text}")))?,
            )
        };
        self.push(kind);
        Ok(())
    }

    fn skip_suffix(&mut self, suffix: &str) {
        let len = self
            .rest()
            .find(|c: char| !suffix.contains(c))
            .unwrap_or(self.rest().len());
        self.pos += len;
    }

    fn escape(&mut self, quote: char) -> Result<String, ParseError> {
        let start_line = self.line;
        // Opening quote
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(ParseError::new(start_line, "unterminated literal"));
            };
            self.pos += c.len_utf8();
            match c {
                '\n' => return Err(ParseError::new(start_line, "unterminated literal")),
                '\\' => {
                    let Some(escaped) = self.peek() else {
                        return Err(ParseError::new(start_line, "unterminated literal"));
                    };
                    self.pos += escaped.len_utf8();
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }
    }

    fn string(&mut self) -> Result<(), ParseError> {
        let text = self.escape('"')?;
        self.push(TokenKind::Str(text.into()));
        Ok(())
    }

    /// C character literals are small integers
    fn char_literal(&mut self) -> Result<(), ParseError> {
        let text = self.escape('\'')?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                self.push(TokenKind::Int(i64::from(u32::from(c))));
                Ok(())
            }
            _ => Err(ParseError::new(
                self.line,
                format!("invalid character literal '{text}'"),
            )),
        }
    }

    fn punct(&mut self) -> Result<(), ParseError> {
        let rest = self.rest();
        let Some(&(spelling, punct)) = PUNCTUATION.iter().find(|(p, _)| rest.starts_with(p)) else {
            let c = rest.chars().next().unwrap_or_default();
            return Err(ParseError::new(self.line, format!("unexpected character {c:?}")));
        };
        self.pos += spelling.len();
        self.push(TokenKind::Punct(punct));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 0xFF 0b101 1.5 65536UL 2.0f"),
            vec![
                TokenKind::Int(42),
                TokenKind::Int(255),
                TokenKind::Int(5),
                TokenKind::Float(1.5),
                TokenKind::Int(65536),
                TokenKind::Float(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_longest_punctuation_wins() {
        assert_eq!(
            kinds("a <<= 1"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct(Punct::ShlAssign),
                TokenKind::Int(1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lines_are_tracked_through_comments() {
        let tokens = tokenize("a\n/* x\n y */ b // c\nd").unwrap();
        let lines: Vec<u32> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 3, 4, 4]);
    }

    #[test]
    fn test_char_literal_is_integer() {
        assert_eq!(kinds("'A'"), vec![TokenKind::Int(65), TokenKind::Eof]);
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("\"abc").is_err());
    }
}
