/// Recursive descent compiler for path expressions.
///
/// Grammar:
///   primary  = keysel | indexsel | group | ε
///   keysel   = "." ("*" | string) primary
///   indexsel = "[" ("*" | space* "+"? uint) "]" primary
///   group    = "{" selector (","? selector)* "}"
///   selector = keysel | indexsel
///   string   = '"' (escape | byte)* '"' | bare run ending at one of `{}[.,` or end
///
/// Keys accept the escapes `\a \b \v \t \f \n \r \0 \\ \xHH`; any other
/// escaped byte stands for itself.
use super::{Query, Selector, SelectorKind, SelectorTree};

/// Deepest selector nesting accepted by the compiler.
const MAX_DEPTH: usize = 512;

const BARE_KEY_END: &[u8] = b"{}[.,";

/// A malformed path expression.
///
/// Displays the whole expression with a caret under the failing offset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render_caret(.expr, *.offset, .message))]
pub struct SelectorError {
    expr: Vec<u8>,
    offset: usize,
    message: String,
}

impl SelectorError {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn render_caret(expr: &[u8], offset: usize, message: &str) -> String {
    const PREFIX: &str = "invalid selector: ";
    let shown = String::from_utf8_lossy(expr);
    let head = String::from_utf8_lossy(&expr[..offset.min(expr.len())]);
    let width = PREFIX.len() + head.chars().count();
    format!("{PREFIX}{shown}\n{:width$}^\n{message}", "")
}

/// Compile a path expression into a [`Query`].
pub fn compile(expr: &[u8]) -> Result<Query, SelectorError> {
    let mut parser = Parser {
        expr,
        pos: 0,
        depth: 0,
    };
    let root = parser.parse_primary()?;
    if parser.pos < expr.len() {
        return Err(parser.error("unexpected character"));
    }
    let query = Query::new(root);
    log::debug!("compiled selector: {query}");
    Ok(query)
}

struct Parser<'a> {
    expr: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.expr.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> SelectorError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> SelectorError {
        SelectorError {
            expr: self.expr.to_vec(),
            offset,
            message: message.into(),
        }
    }

    fn parse_primary(&mut self) -> Result<Option<SelectorTree>, SelectorError> {
        match self.peek() {
            Some(b'.' | b'[') => {
                let selector = self.parse_selector()?;
                Ok(Some(SelectorTree {
                    selectors: vec![selector],
                }))
            }
            Some(b'{') => self.parse_group().map(Some),
            _ => Ok(None),
        }
    }

    fn parse_selector(&mut self) -> Result<Selector, SelectorError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("selector nested too deeply"));
        }

        let kind = match self.peek() {
            Some(b'.') => {
                self.pos += 1;
                if self.peek() == Some(b'*') {
                    self.pos += 1;
                    SelectorKind::AllKeys
                } else {
                    SelectorKind::Key(self.parse_key()?.into_boxed_slice())
                }
            }
            Some(b'[') => {
                let open = self.pos;
                self.pos += 1;
                let kind = if self.peek() == Some(b'*') {
                    self.pos += 1;
                    SelectorKind::AllIndices
                } else {
                    SelectorKind::Index(self.parse_index(open)?)
                };
                match self.peek() {
                    Some(b']') => self.pos += 1,
                    None => return Err(self.error(format!("unclosed '[' at offset {open}"))),
                    Some(_) => return Err(self.error("expected ']'")),
                }
                kind
            }
            _ => return Err(self.error("expected '.', '[' or '}'")),
        };

        let submatch = self.parse_primary()?.map(Box::new);
        self.depth -= 1;
        Ok(Selector { kind, submatch })
    }

    fn parse_group(&mut self) -> Result<SelectorTree, SelectorError> {
        let open = self.pos;
        self.pos += 1; // '{'
        let mut selectors = Vec::new();

        loop {
            match self.peek() {
                None => return Err(self.error(format!("unclosed '{{' at offset {open}"))),
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(SelectorTree { selectors });
                }
                Some(b',') => self.pos += 1,
                Some(_) => selectors.push(self.parse_selector()?),
            }
        }
    }

    /// Index literal: decimal, `0x` hexadecimal, or leading-zero octal,
    /// optionally preceded by whitespace and a `+` sign.
    fn parse_index(&mut self, open: usize) -> Result<usize, SelectorError> {
        while let Some(b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r') = self.peek() {
            self.pos += 1;
        }
        if self.peek() == Some(b'+') {
            self.pos += 1;
        }
        let start = self.pos;
        let (radix, digits_start) = match (self.peek(), self.expr.get(self.pos + 1)) {
            (Some(b'0'), Some(b'x' | b'X')) => (16, self.pos + 2),
            (Some(b'0'), Some(b'0'..=b'9')) => (8, self.pos + 1),
            _ => (10, self.pos),
        };

        let mut end = digits_start;
        while end < self.expr.len() && (self.expr[end] as char).is_digit(radix) {
            end += 1;
        }

        if end == digits_start {
            if start == self.expr.len() {
                return Err(self.error(format!("unclosed '[' at offset {open}")));
            }
            return Err(self.error("expected an integer"));
        }

        // Digits are ASCII by construction.
        let digits = std::str::from_utf8(&self.expr[digits_start..end]).unwrap_or_default();
        let index = usize::from_str_radix(digits, radix)
            .map_err(|_| self.error_at(start, "array index out of range"))?;
        self.pos = end;
        Ok(index)
    }

    fn parse_key(&mut self) -> Result<Vec<u8>, SelectorError> {
        let mut key = Vec::new();

        if self.peek() == Some(b'"') {
            let open = self.pos;
            self.pos += 1;
            loop {
                match self.peek() {
                    None => {
                        return Err(self.error(format!("unterminated string at offset {open}")));
                    }
                    Some(b'"') => {
                        self.pos += 1;
                        return Ok(key);
                    }
                    Some(b'\\') => {
                        let (byte, next) = decode_escape(self.expr, self.pos)
                            .map_err(|(offset, msg)| self.error_at(offset, msg))?;
                        key.push(byte);
                        self.pos = next;
                    }
                    Some(b) => {
                        key.push(b);
                        self.pos += 1;
                    }
                }
            }
        }

        while let Some(b) = self.peek() {
            if BARE_KEY_END.contains(&b) {
                break;
            }
            if b == b'\\' {
                let (byte, next) = decode_escape(self.expr, self.pos)
                    .map_err(|(offset, msg)| self.error_at(offset, msg))?;
                key.push(byte);
                self.pos = next;
            } else {
                key.push(b);
                self.pos += 1;
            }
        }
        Ok(key)
    }
}

/// Decode the selector escape starting at the backslash at `pos`.
///
/// Returns the decoded byte and the offset just past the escape, or the
/// failing offset and a message.
fn decode_escape(expr: &[u8], pos: usize) -> Result<(u8, usize), (usize, &'static str)> {
    debug_assert_eq!(expr.get(pos), Some(&b'\\'));
    let Some(&c) = expr.get(pos + 1) else {
        return Err((pos + 1, "unterminated escape sequence"));
    };
    let byte = match c {
        b'a' => 0x07,
        b'b' => 0x08,
        b'v' => 0x0b,
        b't' => b'\t',
        b'f' => 0x0c,
        b'n' => b'\n',
        b'r' => b'\r',
        b'0' => 0,
        b'\\' => b'\\',
        b'x' => {
            let (Some(&hi), Some(&lo)) = (expr.get(pos + 2), expr.get(pos + 3)) else {
                return Err((expr.len(), "unterminated escape sequence"));
            };
            let digit = |b: u8, at: usize| {
                (b as char)
                    .to_digit(16)
                    .map(|d| d as u8)
                    .ok_or((at, "invalid hex digit in \\x escape"))
            };
            let value = digit(hi, pos + 2)? << 4 | digit(lo, pos + 3)?;
            return Ok((value, pos + 4));
        }
        other => other,
    };
    Ok((byte, pos + 2))
}
