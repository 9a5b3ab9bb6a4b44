//! Pull-based JSON tokenizer over a buffered byte stream.
//!
//! Tokens are produced one at a time on request. Number and string bytes are
//! written into the [`Arena`]; the resulting [`Span`] stays valid until the
//! next token is requested, unless the caller commits it.
//!
//! The tokenizer never consumes past the end of the current token: the
//! boundary byte of numbers and literals is only peeked.

use std::io::{self, BufRead};

use memchr::memchr2;

use crate::arena::{Arena, Span};
use crate::error::{Error, Result};
use crate::input::fill_buf;

const NUMBER_BUF: usize = 32;
const STRING_BUF: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Raw bytes of the literal, exactly as they appeared in the input.
    Number(Span),
    /// Decoded string contents.
    String(Span),
    Bool(bool),
    Null,
    Colon,
    Comma,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Eof,
}

impl Token {
    /// Short description used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Token::Number(_) => "number",
            Token::String(_) => "string",
            Token::Bool(_) => "bool",
            Token::Null => "null",
            Token::Colon => "':'",
            Token::Comma => "','",
            Token::LBrace => "'{'",
            Token::RBrace => "'}'",
            Token::LBracket => "'['",
            Token::RBracket => "']'",
            Token::Eof => "EOF",
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Token::Number(_) | Token::String(_) | Token::Bool(_) | Token::Null
        )
    }
}

pub struct Tokenizer<R> {
    reader: R,
    /// Bytes consumed from `reader` so far.
    offset: u64,
    arena: Arena,
    token: Token,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Tokenizer {
            reader,
            offset: 0,
            arena: Arena::new(),
            token: Token::Eof,
        }
    }

    /// The token produced by the last call to [`Tokenizer::advance`].
    pub fn token(&self) -> Token {
        self.token
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes of a number or string token.
    pub fn text(&self, span: Span) -> &[u8] {
        self.arena.get(span)
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Skip a UTF-8 byte-order mark at the current position.
    pub fn skip_bom(&mut self) -> Result<()> {
        let skipped = crate::input::skip_bom(&mut self.reader)?;
        self.offset += skipped as u64;
        Ok(())
    }

    /// Read the next token, replacing the current one.
    pub fn advance(&mut self) -> Result<Token> {
        loop {
            let Some(b) = self.next_byte()? else {
                self.token = Token::Eof;
                return Ok(Token::Eof);
            };
            let token = match b {
                b' ' | b'\t' | b'\n' | b'\r' => continue,
                b':' => Token::Colon,
                b',' => Token::Comma,
                b'{' => Token::LBrace,
                b'}' => Token::RBrace,
                b'[' => Token::LBracket,
                b']' => Token::RBracket,
                b'-' | b'0'..=b'9' => self.number(b)?,
                b't' | b'f' => {
                    self.skip_letters()?;
                    Token::Bool(b == b't')
                }
                b'n' => {
                    self.skip_letters()?;
                    Token::Null
                }
                b'"' => self.string()?,
                other => return Err(self.lexical(format!("unexpected byte {other:#04x}"))),
            };
            self.token = token;
            return Ok(token);
        }
    }

    /// Consume the rest of an object or array whose opening bracket is the
    /// current token, without producing tokens.
    ///
    /// Only nesting depth and string boundaries are tracked; the contents are
    /// not validated. The current token is stale afterwards: call
    /// [`Tokenizer::advance`] to continue.
    pub fn skip_composite(&mut self) -> Result<()> {
        debug_assert!(matches!(self.token, Token::LBrace | Token::LBracket));
        let mut depth = 1usize;
        let mut in_string = false;
        let mut escaped = false;

        loop {
            let chunk = fill_buf(&mut self.reader)?;
            if chunk.is_empty() {
                return Err(self.lexical("unexpected end of input inside skipped value"));
            }

            let mut i = 0;
            while i < chunk.len() {
                if in_string {
                    if escaped {
                        escaped = false;
                        i += 1;
                        continue;
                    }
                    match memchr2(b'"', b'\\', &chunk[i..]) {
                        Some(j) => {
                            i += j;
                            if chunk[i] == b'\\' {
                                escaped = true;
                            } else {
                                in_string = false;
                            }
                            i += 1;
                        }
                        None => i = chunk.len(),
                    }
                    continue;
                }

                match chunk[i] {
                    b'"' => in_string = true,
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth -= 1;
                        if depth == 0 {
                            self.consume(i + 1);
                            return Ok(());
                        }
                    }
                    _ => {}
                }
                i += 1;
            }

            let n = chunk.len();
            self.consume(n);
        }
    }

    pub(crate) fn lexical(&self, message: impl Into<String>) -> Error {
        Error::Lexical {
            offset: self.offset,
            message: message.into(),
        }
    }

    // -----------------------------------------------------------------------
    // Byte-level access
    // -----------------------------------------------------------------------

    fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(fill_buf(&mut self.reader)?.first().copied())
    }

    fn consume(&mut self, n: usize) {
        self.reader.consume(n);
        self.offset += n as u64;
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let b = self.peek_byte()?;
        if b.is_some() {
            self.consume(1);
        }
        Ok(b)
    }

    // -----------------------------------------------------------------------
    // Scalars
    // -----------------------------------------------------------------------

    fn skip_letters(&mut self) -> Result<()> {
        while let Some(b) = self.peek_byte()? {
            if !b.is_ascii_alphabetic() {
                break;
            }
            self.consume(1);
        }
        Ok(())
    }

    /// Greedy scan: `-`? digits (`.` digits)? ([eE] [+-]? digits)?
    fn number(&mut self, first: u8) -> Result<Token> {
        let mut buf = TokenBuf::start(&mut self.arena, NUMBER_BUF)?;
        buf.push(&mut self.arena, first)?;
        self.digits(&mut buf)?;

        if self.peek_byte()? == Some(b'.') {
            self.consume(1);
            buf.push(&mut self.arena, b'.')?;
            self.digits(&mut buf)?;
        }

        if let Some(e @ (b'e' | b'E')) = self.peek_byte()? {
            self.consume(1);
            buf.push(&mut self.arena, e)?;
            if let Some(sign @ (b'+' | b'-' | b'0'..=b'9')) = self.peek_byte()? {
                self.consume(1);
                buf.push(&mut self.arena, sign)?;
                self.digits(&mut buf)?;
            }
        }

        Ok(Token::Number(buf.finish()))
    }

    fn digits(&mut self, buf: &mut TokenBuf) -> Result<()> {
        while let Some(d @ b'0'..=b'9') = self.peek_byte()? {
            self.consume(1);
            buf.push(&mut self.arena, d)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Strings
    // -----------------------------------------------------------------------

    fn string(&mut self) -> Result<Token> {
        let mut buf = TokenBuf::start(&mut self.arena, STRING_BUF)?;

        loop {
            let chunk = fill_buf(&mut self.reader)?;
            if chunk.is_empty() {
                return Err(self.lexical("unterminated string"));
            }
            match memchr2(b'"', b'\\', chunk) {
                Some(i) => {
                    let stop = chunk[i];
                    buf.extend(&mut self.arena, &chunk[..i])?;
                    self.consume(i + 1);
                    if stop == b'"' {
                        break;
                    }
                    let b = self.escape_byte()?;
                    self.escape(b, &mut buf)?;
                }
                None => {
                    let n = chunk.len();
                    buf.extend(&mut self.arena, chunk)?;
                    self.consume(n);
                }
            }
        }

        Ok(Token::String(buf.finish()))
    }

    fn escape_byte(&mut self) -> Result<u8> {
        match self.next_byte()? {
            Some(b) => Ok(b),
            None => Err(self.lexical("unterminated string")),
        }
    }

    /// Decode the escape whose introducing byte (after `\`) is `b`.
    fn escape(&mut self, b: u8, buf: &mut TokenBuf) -> Result<()> {
        let byte = match b {
            b'a' => 0x07,
            b'b' => 0x08,
            b'v' => 0x0b,
            b't' => b'\t',
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b'0' => 0,
            b'\\' => b'\\',
            b'u' => return self.unicode_escape(buf),
            other => other,
        };
        buf.extend_exact(&mut self.arena, &[byte])?;
        Ok(())
    }

    /// `\uXXXX`, pairing UTF-16 surrogates when a low surrogate follows
    /// directly. Unpaired surrogates decode to U+FFFD.
    fn unicode_escape(&mut self, buf: &mut TokenBuf) -> Result<()> {
        let unit = self.hex4()?;
        let c = match unit {
            0xD800..=0xDBFF => {
                if self.peek_byte()? != Some(b'\\') {
                    char::REPLACEMENT_CHARACTER
                } else {
                    self.consume(1);
                    let next = self.escape_byte()?;
                    if next != b'u' {
                        self.push_char(char::REPLACEMENT_CHARACTER, buf)?;
                        return self.escape(next, buf);
                    }
                    let low = self.hex4()?;
                    if (0xDC00..=0xDFFF).contains(&low) {
                        let c = 0x1_0000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                        char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER)
                    } else {
                        self.push_char(char::REPLACEMENT_CHARACTER, buf)?;
                        char::from_u32(low).unwrap_or(char::REPLACEMENT_CHARACTER)
                    }
                }
            }
            _ => char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER),
        };
        self.push_char(c, buf)
    }

    fn push_char(&mut self, c: char, buf: &mut TokenBuf) -> Result<()> {
        let mut utf8 = [0; 4];
        buf.extend_exact(&mut self.arena, c.encode_utf8(&mut utf8).as_bytes())?;
        Ok(())
    }

    fn hex4(&mut self) -> Result<u32> {
        let mut unit = 0u32;
        for _ in 0..4 {
            let Some(b) = self.next_byte()? else {
                return Err(self.lexical("unterminated \\u escape"));
            };
            let Some(d) = (b as char).to_digit(16) else {
                return Err(self.lexical(format!("invalid hex digit {b:#04x} in \\u escape")));
            };
            unit = unit << 4 | d;
        }
        Ok(unit)
    }
}

/// A token buffer under construction at the arena cursor.
struct TokenBuf {
    span: Span,
    len: usize,
}

impl TokenBuf {
    fn start(arena: &mut Arena, capacity: usize) -> Result<Self> {
        Ok(TokenBuf {
            span: arena.alloc(capacity)?,
            len: 0,
        })
    }

    fn push(&mut self, arena: &mut Arena, b: u8) -> Result<()> {
        if self.len == self.span.len() {
            self.span = arena.realloc(self.span.len() * 2)?;
        }
        arena.get_mut(self.span)[self.len] = b;
        self.len += 1;
        Ok(())
    }

    /// Append a run of plain bytes, doubling capacity as needed.
    fn extend(&mut self, arena: &mut Arena, bytes: &[u8]) -> Result<()> {
        let needed = self.len + bytes.len();
        if needed > self.span.len() {
            let mut capacity = self.span.len().max(1);
            while capacity < needed {
                capacity *= 2;
            }
            self.span = arena.realloc(capacity)?;
        }
        arena.get_mut(self.span)[self.len..needed].copy_from_slice(bytes);
        self.len = needed;
        Ok(())
    }

    /// Append a decoded escape, growing by exactly the overflow.
    fn extend_exact(&mut self, arena: &mut Arena, bytes: &[u8]) -> Result<()> {
        let needed = self.len + bytes.len();
        if needed > self.span.len() {
            self.span = arena.realloc(needed)?;
        }
        arena.get_mut(self.span)[self.len..needed].copy_from_slice(bytes);
        self.len = needed;
        Ok(())
    }

    fn finish(self) -> Span {
        self.span.truncate(self.len)
    }
}
