/// Selector trees: the compiled form of a path expression.
///
/// A path expression such as `.items[*]{.id,.tags[0]}` compiles into a tree
/// of [`SelectorTree`] groups. Each group is an ordered fan-out of
/// [`Selector`]s tested against the same JSON node; a selector without a
/// submatch is a leaf and prints whatever value it reaches.
pub mod parser;

use std::fmt;

pub use parser::{SelectorError, compile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorKind {
    /// `.*`
    AllKeys,
    /// `.key` / `."key"`
    Key(Box<[u8]>),
    /// `[*]`
    AllIndices,
    /// `[N]`
    Index(usize),
}

impl SelectorKind {
    /// Whether this kind can be tested at an object position.
    pub fn matches_keys(&self) -> bool {
        matches!(self, SelectorKind::AllKeys | SelectorKind::Key(_))
    }

    /// Whether this kind can be tested at an array position.
    pub fn matches_indices(&self) -> bool {
        matches!(self, SelectorKind::AllIndices | SelectorKind::Index(_))
    }

    pub fn accepts_key(&self, key: &[u8]) -> bool {
        match self {
            SelectorKind::AllKeys => true,
            SelectorKind::Key(expected) => expected.len() == key.len() && **expected == *key,
            _ => false,
        }
    }

    pub fn accepts_index(&self, index: usize) -> bool {
        match self {
            SelectorKind::AllIndices => true,
            SelectorKind::Index(expected) => *expected == index,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub kind: SelectorKind,
    /// Applied to the matched value; `None` makes this selector a leaf.
    pub submatch: Option<Box<SelectorTree>>,
}

impl Selector {
    pub fn is_leaf(&self) -> bool {
        self.submatch.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorTree {
    pub selectors: Vec<Selector>,
}

/// A compiled path expression.
///
/// The root is `None` for the empty expression, which selects the whole
/// input value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    root: Option<SelectorTree>,
}

impl Query {
    pub fn new(root: Option<SelectorTree>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> Option<&SelectorTree> {
        self.root.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Display: canonical path-expression syntax
// ---------------------------------------------------------------------------

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Some(tree) => tree.fmt(f),
            None => Ok(()),
        }
    }
}

impl fmt::Display for SelectorTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [only] = self.selectors.as_slice() {
            return only.fmt(f);
        }
        f.write_str("{")?;
        for (i, selector) in self.selectors.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            selector.fmt(f)?;
        }
        f.write_str("}")
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SelectorKind::AllKeys => f.write_str(".*")?,
            SelectorKind::Key(key) => {
                f.write_str(".")?;
                write_key(f, key)?;
            }
            SelectorKind::AllIndices => f.write_str("[*]")?,
            SelectorKind::Index(i) => write!(f, "[{i}]")?,
        }
        match &self.submatch {
            Some(tree) => tree.fmt(f),
            None => Ok(()),
        }
    }
}

/// Write a key in selector syntax: bare when unambiguous, quoted otherwise.
pub fn write_key<W: fmt::Write>(w: &mut W, key: &[u8]) -> fmt::Result {
    let bare = !key.is_empty()
        && key[0] != b'*'
        && key[0] != b'"'
        && key
            .iter()
            .all(|&b| b.is_ascii_graphic() && !b"{}[.,\\".contains(&b));
    if bare {
        // All bytes are printable ASCII here.
        return w.write_str(std::str::from_utf8(key).unwrap_or_default());
    }

    w.write_char('"')?;
    for chunk in key.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '"' => w.write_str("\\\"")?,
                '\\' => w.write_str("\\\\")?,
                '\n' => w.write_str("\\n")?,
                '\t' => w.write_str("\\t")?,
                '\r' => w.write_str("\\r")?,
                c if c.is_control() && (c as u32) < 0x80 => write!(w, "\\x{:02x}", c as u32)?,
                c => w.write_char(c)?,
            }
        }
        for &b in chunk.invalid() {
            write!(w, "\\x{b:02x}")?;
        }
    }
    w.write_char('"')
}
