use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use thiserror::Error;

use crate::error::{HubError, Result};

/// Maximum nesting depth accepted by the reply parser
pub const MAX_DEPTH: usize = 64;

/// A value in the literal grammar of the hub's interpreter
///
/// This is both what gets sent (every call argument is rendered through [`fmt::Display`])
/// and what comes back (every reply is parsed with [`Literal::parse`]). Rendering produces
/// the same text the interpreter's own `repr()` would, so a rendered value parses back to an
/// equal one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// `None`
    None,
    /// `True` / `False`
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// Text string literal
    Str(String),
    /// Byte string literal, `b'...'` or `bytearray(b'...')`
    Bytes(Vec<u8>),
    /// `[...]`
    List(Vec<Literal>),
    /// `(...)`
    Tuple(Vec<Literal>),
    /// `{k: v, ...}`, in reply order
    Dict(Vec<(Literal, Literal)>),
}

/// Failure to parse reply text as a literal
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    /// Byte offset into the reply where parsing stopped
    pub offset: usize,
    /// What went wrong
    pub message: String,
}

impl Literal {
    /// Byte string literal
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(data.into())
    }

    /// Parse reply text produced by the interpreter's `repr()`
    ///
    /// Leading and trailing whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LiteralError`] if the text is not exactly one literal.
    pub fn parse(text: &str) -> std::result::Result<Self, LiteralError> {
        let mut parser = Parser::new(text);
        parser.skip_ws();
        let value = parser.value(0)?;
        parser.skip_ws();
        if parser.pos < parser.src.len() {
            return Err(parser.error("trailing characters after literal"));
        }
        Ok(value)
    }

    /// Name of the variant, as used in error messages
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
        }
    }

    /// `true` for `None`
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Boolean value, if this is a bool
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value, if this is an int
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value; ints widen to float
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String slice, if this is a str
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Byte slice, if this is a byte string
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Items of a list or tuple
    #[must_use]
    pub fn as_seq(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) | Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a string key in a dict
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub(crate) fn unexpected(&self, expected: &'static str) -> HubError {
        HubError::UnexpectedReply {
            expected,
            found: self.to_string(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => render_float(*x, f),
            Self::Str(s) => render_str(s, f),
            Self::Bytes(b) => render_bytes(b, f),
            Self::List(items) => {
                f.write_char('[')?;
                render_items(items, f)?;
                f.write_char(']')
            }
            Self::Tuple(items) => {
                f.write_char('(')?;
                render_items(items, f)?;
                if items.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Self::Dict(entries) => {
                f.write_char('{')?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_char('}')
            }
        }
    }
}

fn render_items(items: &[Literal], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn render_float(x: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if x.is_nan() {
        f.write_str("float('nan')")
    } else if x.is_infinite() {
        if x > 0.0 {
            f.write_str("float('inf')")
        } else {
            f.write_str("float('-inf')")
        }
    } else {
        // Debug always keeps a decimal point or exponent, so the value stays a float remotely
        write!(f, "{x:?}")
    }
}

const fn pick_quote(has_single: bool, has_double: bool) -> char {
    if has_single && !has_double {
        '"'
    } else {
        '\''
    }
}

fn render_str(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let quote = pick_quote(s.contains('\''), s.contains('"'));
    f.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => write!(f, "\\{c}")?,
            c if c.is_control() => {
                let code = u32::from(c);
                if code <= 0xff {
                    write!(f, "\\x{code:02x}")?;
                } else {
                    write!(f, "\\u{code:04x}")?;
                }
            }
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

fn render_bytes(b: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let quote = pick_quote(b.contains(&b'\''), b.contains(&b'"'));
    f.write_char('b')?;
    f.write_char(quote)?;
    for &byte in b {
        match byte {
            b'\\' => f.write_str("\\\\")?,
            b'\n' => f.write_str("\\n")?,
            b'\r' => f.write_str("\\r")?,
            b'\t' => f.write_str("\\t")?,
            byte if char::from(byte) == quote => write!(f, "\\{quote}")?,
            0x20..=0x7e => f.write_char(char::from(byte))?,
            byte => write!(f, "\\x{byte:02x}")?,
        }
    }
    f.write_char(quote)
}

struct Parser<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    const fn new(text: &'a str) -> Self {
        Self {
            src: text.as_bytes(),
            text,
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.src[self.pos..].starts_with(token.as_bytes()) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> std::result::Result<(), LiteralError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", char::from(byte))))
        }
    }

    /// True if an identifier character follows, so `Nonesuch` is not read as `None`
    fn at_ident_char(&self) -> bool {
        self.peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
    }

    fn keyword(&mut self, word: &str) -> bool {
        let start = self.pos;
        if self.eat(word) && !self.at_ident_char() {
            return true;
        }
        self.pos = start;
        false
    }

    fn value(&mut self, depth: usize) -> std::result::Result<Literal, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(self.error("literal nested too deeply"));
        }
        match self.peek() {
            None => Err(self.error("unexpected end of reply")),
            Some(b'[') => {
                self.pos += 1;
                let (items, _) = self.items(b']', depth)?;
                Ok(Literal::List(items))
            }
            Some(b'(') => {
                self.pos += 1;
                let (mut items, trailing_comma) = self.items(b')', depth)?;
                if items.len() == 1 && !trailing_comma {
                    // Parenthesized value, not a tuple
                    return Ok(items.remove(0));
                }
                Ok(Literal::Tuple(items))
            }
            Some(b'{') => {
                self.pos += 1;
                self.dict(depth)
            }
            Some(b'\'' | b'"') => Ok(Literal::Str(self.string()?)),
            Some(b'b') if matches!(self.src.get(self.pos + 1), Some(b'\'' | b'"')) => {
                self.pos += 1;
                Ok(Literal::Bytes(self.byte_string()?))
            }
            Some(b'0'..=b'9' | b'+' | b'-' | b'.') => self.number(),
            Some(_) => self.word(),
        }
    }

    fn word(&mut self) -> std::result::Result<Literal, LiteralError> {
        if self.keyword("None") {
            Ok(Literal::None)
        } else if self.keyword("True") {
            Ok(Literal::Bool(true))
        } else if self.keyword("False") {
            Ok(Literal::Bool(false))
        } else if self.keyword("inf") {
            Ok(Literal::Float(f64::INFINITY))
        } else if self.keyword("nan") {
            Ok(Literal::Float(f64::NAN))
        } else if self.eat("float(") {
            self.skip_ws();
            let start = self.pos;
            let text = self.string()?;
            self.skip_ws();
            self.expect(b')')?;
            match text.trim().parse::<f64>() {
                Ok(value) => Ok(Literal::Float(value)),
                Err(_) => Err(LiteralError {
                    offset: start,
                    message: format!("bad float() argument {text:?}"),
                }),
            }
        } else if self.eat("bytearray(") {
            self.skip_ws();
            if !self.eat("b") {
                return Err(self.error("expected byte string inside bytearray()"));
            }
            let data = self.byte_string()?;
            self.skip_ws();
            self.expect(b')')?;
            Ok(Literal::Bytes(data))
        } else {
            Err(self.error("unrecognized token"))
        }
    }

    /// Comma separated values up to `close`; also reports whether a trailing comma was seen
    fn items(
        &mut self,
        close: u8,
        depth: usize,
    ) -> std::result::Result<(Vec<Literal>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok((items, trailing_comma));
            }
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    trailing_comma = true;
                }
                Some(c) if c == close => {
                    trailing_comma = false;
                }
                _ => return Err(self.error(format!("expected ',' or '{}'", char::from(close)))),
            }
        }
    }

    fn dict(&mut self, depth: usize) -> std::result::Result<Literal, LiteralError> {
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(Literal::Dict(entries));
            }
            let key = self.value(depth + 1)?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            let value = self.value(depth + 1)?;
            entries.push((key, value));
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn number(&mut self) -> std::result::Result<Literal, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
            if self.keyword("inf") {
                let value = if self.src[start] == b'-' {
                    f64::NEG_INFINITY
                } else {
                    f64::INFINITY
                };
                return Ok(Literal::Float(value));
            }
            if self.keyword("nan") {
                return Ok(Literal::Float(f64::NAN));
            }
        }
        let mut is_float = false;
        let mut digits = self.digits();
        if self.peek() == Some(b'.') {
            self.pos += 1;
            is_float = true;
            digits += self.digits();
        }
        if digits == 0 {
            self.pos = start;
            return Err(self.error("expected digits"));
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            is_float = true;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.digits() == 0 {
                return Err(self.error("expected exponent digits"));
            }
        }
        let text = &self.text[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(Literal::Float)
                .map_err(|e| self.error(format!("invalid float {text}: {e}")))
        } else {
            text.parse::<i64>()
                .map(Literal::Int)
                .map_err(|e| self.error(format!("invalid integer {text}: {e}")))
        }
    }

    fn digits(&mut self) -> usize {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn open_quote(&mut self) -> std::result::Result<u8, LiteralError> {
        match self.peek() {
            Some(q @ (b'\'' | b'"')) => {
                self.pos += 1;
                Ok(q)
            }
            _ => Err(self.error("expected quote")),
        }
    }

    fn hex_escape(&mut self, len: usize) -> std::result::Result<u32, LiteralError> {
        let end = self.pos + len;
        let hex = self
            .text
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated escape"))?;
        if !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
            return Err(self.error(format!("bad hex escape {hex}")));
        }
        let value =
            u32::from_str_radix(hex, 16).map_err(|_| self.error(format!("bad hex escape {hex}")))?;
        self.pos = end;
        Ok(value)
    }

    /// Up to three octal digits; the first one has already been peeked
    fn octal_escape(&mut self) -> u32 {
        let mut value = 0;
        for _ in 0..3 {
            match self.peek() {
                Some(c @ b'0'..=b'7') => {
                    value = value * 8 + u32::from(c - b'0');
                    self.pos += 1;
                }
                _ => break,
            }
        }
        value
    }

    /// Shared escapes; returns `None` for `\u`/`\U`, which only text strings accept
    fn simple_escape(&mut self) -> std::result::Result<Option<u32>, LiteralError> {
        let c = self.peek().ok_or_else(|| self.error("truncated escape"))?;
        let code = match c {
            b'\\' => u32::from(b'\\'),
            b'\'' => u32::from(b'\''),
            b'"' => u32::from(b'"'),
            b'n' => u32::from(b'\n'),
            b'r' => u32::from(b'\r'),
            b't' => u32::from(b'\t'),
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'v' => 0x0b,
            b'0'..=b'7' => return Ok(Some(self.octal_escape())),
            b'x' => {
                self.pos += 1;
                return self.hex_escape(2).map(Some);
            }
            b'u' | b'U' => return Ok(None),
            _ => return Err(self.error(format!("unknown escape \\{}", char::from(c)))),
        };
        self.pos += 1;
        Ok(Some(code))
    }

    fn string(&mut self) -> std::result::Result<String, LiteralError> {
        let quote = self.open_quote()?;
        let mut out = String::new();
        loop {
            let rest = &self.text[self.pos..];
            let c = rest
                .chars()
                .next()
                .ok_or_else(|| self.error("unterminated string"))?;
            self.pos += c.len_utf8();
            if c == char::from(quote) {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let code = match self.simple_escape()? {
                Some(code) => code,
                None => {
                    let len = if self.peek() == Some(b'u') { 4 } else { 8 };
                    self.pos += 1;
                    self.hex_escape(len)?
                }
            };
            let decoded =
                char::from_u32(code).ok_or_else(|| self.error("escape is not a valid char"))?;
            out.push(decoded);
        }
    }

    fn byte_string(&mut self) -> std::result::Result<Vec<u8>, LiteralError> {
        let quote = self.open_quote()?;
        let mut out = Vec::new();
        loop {
            let c = self.peek().ok_or_else(|| self.error("unterminated byte string"))?;
            self.pos += 1;
            if c == quote {
                return Ok(out);
            }
            if c != b'\\' {
                if !c.is_ascii() {
                    return Err(self.error("non-ASCII character in byte string"));
                }
                out.push(c);
                continue;
            }
            let code = self
                .simple_escape()?
                .ok_or_else(|| self.error("unicode escape in byte string"))?;
            let byte = u8::try_from(code).map_err(|_| self.error("byte escape out of range"))?;
            out.push(byte);
        }
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! int_literal {
    ($($t:ty),*) => {
        $(impl From<$t> for Literal {
            fn from(value: $t) -> Self {
                Self::Int(i64::from(value))
            }
        })*
    };
}

int_literal!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&[u8]> for Literal {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl<T: Into<Self>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Literal {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<Self>, B: Into<Self>> From<(A, B)> for Literal {
    fn from((a, b): (A, B)) -> Self {
        Self::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Self>, B: Into<Self>, C: Into<Self>> From<(A, B, C)> for Literal {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

/// Conversion from a decoded reply into a typed result
pub trait FromLiteral: Sized {
    /// Convert, failing with [`HubError::UnexpectedReply`] on a shape mismatch
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnexpectedReply`] if the literal has the wrong shape.
    fn from_literal(literal: Literal) -> Result<Self>;
}

impl FromLiteral for Literal {
    fn from_literal(literal: Literal) -> Result<Self> {
        Ok(literal)
    }
}

impl FromLiteral for bool {
    fn from_literal(literal: Literal) -> Result<Self> {
        literal.as_bool().ok_or_else(|| literal.unexpected("bool"))
    }
}

impl FromLiteral for i64 {
    fn from_literal(literal: Literal) -> Result<Self> {
        literal.as_i64().ok_or_else(|| literal.unexpected("int"))
    }
}

impl FromLiteral for f64 {
    fn from_literal(literal: Literal) -> Result<Self> {
        literal.as_f64().ok_or_else(|| literal.unexpected("float"))
    }
}

impl FromLiteral for String {
    fn from_literal(literal: Literal) -> Result<Self> {
        match literal {
            Literal::Str(s) => Ok(s),
            other => Err(other.unexpected("str")),
        }
    }
}

impl FromLiteral for Vec<u8> {
    fn from_literal(literal: Literal) -> Result<Self> {
        match literal {
            Literal::Bytes(b) => Ok(b),
            other => Err(other.unexpected("bytes")),
        }
    }
}

impl FromLiteral for Vec<Literal> {
    fn from_literal(literal: Literal) -> Result<Self> {
        match literal {
            Literal::List(items) | Literal::Tuple(items) => Ok(items),
            other => Err(other.unexpected("sequence")),
        }
    }
}

impl<T: FromLiteral> FromLiteral for Option<T> {
    fn from_literal(literal: Literal) -> Result<Self> {
        if literal.is_none() {
            Ok(None)
        } else {
            T::from_literal(literal).map(Some)
        }
    }
}

impl FromLiteral for Vec<String> {
    fn from_literal(literal: Literal) -> Result<Self> {
        let strings = literal.as_seq().and_then(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        });
        strings.ok_or_else(|| literal.unexpected("list of str"))
    }
}

impl FromLiteral for Vec<i64> {
    fn from_literal(literal: Literal) -> Result<Self> {
        let ints = literal
            .as_seq()
            .and_then(|items| items.iter().map(Literal::as_i64).collect::<Option<Vec<_>>>());
        ints.ok_or_else(|| literal.unexpected("list of int"))
    }
}

impl FromLiteral for (i64, i64) {
    fn from_literal(literal: Literal) -> Result<Self> {
        match literal.as_seq() {
            Some([Literal::Int(a), Literal::Int(b)]) => Ok((*a, *b)),
            _ => Err(literal.unexpected("2-tuple of ints")),
        }
    }
}

impl FromLiteral for Vec<(i64, i64)> {
    fn from_literal(literal: Literal) -> Result<Self> {
        let pairs = literal.as_seq().and_then(|items| {
            items
                .iter()
                .map(|item| match item.as_seq() {
                    Some([Literal::Int(a), Literal::Int(b)]) => Some((*a, *b)),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
        });
        pairs.ok_or_else(|| literal.unexpected("list of (int, int)"))
    }
}

impl FromLiteral for (i64, i64, i64) {
    fn from_literal(literal: Literal) -> Result<Self> {
        match literal.as_seq() {
            Some([Literal::Int(a), Literal::Int(b), Literal::Int(c)]) => Ok((*a, *b, *c)),
            _ => Err(literal.unexpected("3-tuple of ints")),
        }
    }
}
