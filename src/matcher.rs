//! Streaming matcher: walks the token stream guided by a compiled [`Query`].
//!
//! The matcher pulls one token at a time from the [`Tokenizer`] and, for
//! every object member or array element, decides to descend, print or skip.
//! Nothing is materialized beyond the key buffers of the members currently
//! being descended into, which are committed in the arena and released in
//! reverse order as the recursion unwinds.
//!
//! Recursion depth is bounded by the selector tree, not by the document:
//! printing and skipping are both iterative.

use std::fmt::Write as _;
use std::io::{BufRead, Write};

use log::{Level, log_enabled, trace};
use smallvec::SmallVec;

use crate::arena::Span;
use crate::error::{Error, Result};
use crate::output::{self, OutputConfig};
use crate::selector::{self, Query, Selector, SelectorKind};
use crate::tokenizer::{Token, Tokenizer};

/// Selectors tested together at one JSON node.
type Group<'q> = SmallVec<[&'q Selector; 4]>;

/// Match a single JSON value from `input`, writing every selected value to
/// `out`. Returns the number of values written.
///
/// Anything after the first value is left unread.
pub fn match_once<R, W>(input: R, query: &Query, config: &OutputConfig, out: &mut W) -> Result<u64>
where
    R: BufRead,
    W: Write + ?Sized,
{
    let mut matcher = Matcher::new(input, config, out);
    matcher.tokens.skip_bom()?;
    let root = root_group(query);
    match matcher.tokens.advance()? {
        Token::Eof => Err(matcher.unexpected("a value", Token::Eof)),
        _ => {
            matcher.match_value(root.as_deref())?;
            Ok(matcher.emitted)
        }
    }
}

/// Match every value of a whitespace-separated stream of JSON values.
///
/// An empty stream selects nothing and is not an error.
pub fn match_stream<R, W>(
    input: R,
    query: &Query,
    config: &OutputConfig,
    out: &mut W,
) -> Result<u64>
where
    R: BufRead,
    W: Write + ?Sized,
{
    let mut matcher = Matcher::new(input, config, out);
    matcher.tokens.skip_bom()?;
    let root = root_group(query);
    while matcher.tokens.advance()? != Token::Eof {
        matcher.match_value(root.as_deref())?;
    }
    Ok(matcher.emitted)
}

fn root_group(query: &Query) -> Option<Group<'_>> {
    query.root().map(|tree| tree.selectors.iter().collect())
}

/// What a group does with one key or index occurrence.
enum Accepted<'q> {
    Nothing,
    /// The first accepting selector is a leaf: print the value.
    Leaf,
    /// Merged submatches of the non-leaf accepting selectors, in group order.
    Submatch(Group<'q>),
}

/// The first accepting selector decides between printing and descending.
/// Once descending, later leaves are ignored and every other non-leaf
/// acceptor contributes its submatch.
fn accept<'q>(group: &[&'q Selector], test: impl Fn(&SelectorKind) -> bool) -> Accepted<'q> {
    let mut accepted = Accepted::Nothing;
    for &selector in group.iter().filter(|s| test(&s.kind)) {
        let Some(sub) = selector.submatch.as_deref() else {
            if matches!(accepted, Accepted::Nothing) {
                return Accepted::Leaf;
            }
            continue;
        };
        match &mut accepted {
            Accepted::Submatch(merged) => merged.extend(sub.selectors.iter()),
            _ => accepted = Accepted::Submatch(sub.selectors.iter().collect()),
        }
    }
    accepted
}

#[derive(Debug, Clone, Copy)]
enum PathSegment {
    /// Committed key bytes.
    Key(Span),
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object,
    Array,
}

struct Matcher<'a, R, W: ?Sized> {
    tokens: Tokenizer<R>,
    out: &'a mut W,
    config: &'a OutputConfig,
    /// Keys and indices currently being descended into.
    path: Vec<PathSegment>,
    emitted: u64,
}

impl<'a, R: BufRead, W: Write + ?Sized> Matcher<'a, R, W> {
    fn new(input: R, config: &'a OutputConfig, out: &'a mut W) -> Self {
        Matcher {
            tokens: Tokenizer::new(input),
            out,
            config,
            path: Vec::new(),
            emitted: 0,
        }
    }

    /// Consume the value starting at the current token.
    ///
    /// `None` prints the value. On return the whole value has been read and
    /// the following token has not.
    fn match_value(&mut self, group: Option<&[&Selector]>) -> Result<()> {
        let Some(group) = group else {
            return self.emit();
        };
        match self.tokens.token() {
            Token::LBrace if group.iter().any(|s| s.kind.matches_keys()) => {
                self.match_object(group)
            }
            Token::LBracket if group.iter().any(|s| s.kind.matches_indices()) => {
                self.match_array(group)
            }
            Token::LBrace | Token::LBracket => self.tokens.skip_composite(),
            // A scalar where the selector wants to go deeper selects nothing.
            token if token.is_scalar() => Ok(()),
            token => Err(self.unexpected("a value", token)),
        }
    }

    fn match_object(&mut self, group: &[&Selector]) -> Result<()> {
        loop {
            let key = match self.tokens.advance()? {
                Token::RBrace => return Ok(()),
                Token::Comma => continue,
                Token::String(key) => key,
                token => return Err(self.unexpected("a string key or '}'", token)),
            };

            let accepted = accept(group, |kind| kind.accepts_key(self.tokens.text(key)));
            if let Accepted::Nothing = accepted {
                self.expect_colon()?;
                self.tokens.advance()?;
                self.skip_value()?;
                continue;
            }

            self.tokens.arena_mut().commit(key.len());
            self.expect_colon()?;
            self.path.push(PathSegment::Key(key));
            self.tokens.advance()?;
            self.descend(accepted)?;
            self.path.pop();
            self.tokens.arena_mut().free(key.len());
        }
    }

    fn match_array(&mut self, group: &[&Selector]) -> Result<()> {
        let mut index = 0usize;
        loop {
            match self.tokens.advance()? {
                Token::RBracket => return Ok(()),
                Token::Comma => continue,
                Token::Eof => return Err(self.unexpected("a value or ']'", Token::Eof)),
                _ => {}
            }

            match accept(group, |kind| kind.accepts_index(index)) {
                Accepted::Nothing => self.skip_value()?,
                accepted => {
                    self.path.push(PathSegment::Index(index));
                    self.descend(accepted)?;
                    self.path.pop();
                }
            }
            index += 1;
        }
    }

    fn descend(&mut self, accepted: Accepted<'_>) -> Result<()> {
        if log_enabled!(Level::Trace) {
            trace!("selected {}", self.path_string());
        }
        match accepted {
            Accepted::Nothing => self.skip_value(),
            Accepted::Leaf => self.emit(),
            Accepted::Submatch(group) => self.match_value(Some(&group[..])),
        }
    }

    /// Discard the value starting at the current token.
    fn skip_value(&mut self) -> Result<()> {
        match self.tokens.token() {
            Token::LBrace | Token::LBracket => self.tokens.skip_composite(),
            token if token.is_scalar() => Ok(()),
            token => Err(self.unexpected("a value", token)),
        }
    }

    fn expect_colon(&mut self) -> Result<()> {
        match self.tokens.advance()? {
            Token::Colon => Ok(()),
            token => Err(self.unexpected("':'", token)),
        }
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    /// Print the value starting at the current token, then the separator.
    fn emit(&mut self) -> Result<()> {
        match self.tokens.token() {
            Token::String(s) if self.config.raw => self.out.write_all(self.tokens.text(s))?,
            _ => self.print_value()?,
        }
        output::finish_value(self.out, self.config)?;
        self.emitted += 1;
        Ok(())
    }

    /// Re-serialize one value in compact form.
    fn print_value(&mut self) -> Result<()> {
        let mut stack: SmallVec<[Frame; 16]> = SmallVec::new();
        let mut token = self.tokens.token();

        loop {
            // `token` starts a value here.
            match token {
                Token::LBrace => {
                    self.out.write_all(b"{")?;
                    token = self.tokens.advance()?;
                    if token != Token::RBrace {
                        stack.push(Frame::Object);
                        token = self.print_key(token)?;
                        continue;
                    }
                    self.out.write_all(b"}")?;
                }
                Token::LBracket => {
                    self.out.write_all(b"[")?;
                    token = self.tokens.advance()?;
                    if token != Token::RBracket {
                        stack.push(Frame::Array);
                        continue;
                    }
                    self.out.write_all(b"]")?;
                }
                _ => self.print_scalar(token)?,
            }

            // Close finished containers until a sibling value follows.
            loop {
                let Some(&frame) = stack.last() else {
                    return Ok(());
                };
                match (frame, self.tokens.advance()?) {
                    (_, Token::Comma) => {
                        self.out.write_all(b",")?;
                        token = self.tokens.advance()?;
                        if frame == Frame::Object {
                            token = self.print_key(token)?;
                        }
                        break;
                    }
                    (Frame::Object, Token::RBrace) => self.out.write_all(b"}")?,
                    (Frame::Array, Token::RBracket) => self.out.write_all(b"]")?,
                    (Frame::Object, other) => return Err(self.unexpected("',' or '}'", other)),
                    (Frame::Array, other) => return Err(self.unexpected("',' or ']'", other)),
                }
                stack.pop();
            }
        }
    }

    /// Print `"key":` and return the first token of the member's value.
    fn print_key(&mut self, token: Token) -> Result<Token> {
        let Token::String(key) = token else {
            return Err(self.unexpected("a string key", token));
        };
        output::write_json_string(self.out, self.tokens.text(key))?;
        self.expect_colon()?;
        self.out.write_all(b":")?;
        Ok(self.tokens.advance()?)
    }

    fn print_scalar(&mut self, token: Token) -> Result<()> {
        match token {
            Token::Number(n) => self.out.write_all(self.tokens.text(n))?,
            Token::String(s) => output::write_json_string(self.out, self.tokens.text(s))?,
            Token::Bool(b) => output::write_bool(self.out, b)?,
            Token::Null => self.out.write_all(b"null")?,
            other => return Err(self.unexpected("a value", other)),
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    fn unexpected(&self, expected: &'static str, found: Token) -> Error {
        Error::Structural {
            offset: self.tokens.offset(),
            expected,
            found: found.describe(),
            path: self.path_string(),
        }
    }

    /// The matched path in selector syntax, e.g. `.items[3].id`.
    fn path_string(&self) -> String {
        let mut path = String::new();
        for segment in &self.path {
            // Writing to a String cannot fail.
            let _ = match *segment {
                PathSegment::Key(span) => {
                    path.push('.');
                    selector::write_key(&mut path, self.tokens.text(span))
                }
                PathSegment::Index(i) => write!(path, "[{i}]"),
            };
        }
        path
    }
}
