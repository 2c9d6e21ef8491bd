//! RFC 6901 JSON Pointer representation.
//!
//! A pointer is a sequence of unescaped reference tokens. Its textual form is
//! `""` for the document root, otherwise `/` followed by the tokens joined by
//! `/`, with `~` escaped as `~0` and `/` escaped as `~1`.

use crate::{PatchError, PatchResult};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Escape a single reference token (`~` → `~0`, `/` → `~1`).
pub fn escape_segment(token: &str) -> Cow<'_, str> {
    if !token.contains(['~', '/']) {
        return Cow::Borrowed(token);
    }
    let mut out = String::with_capacity(token.len() + 2);
    for ch in token.chars() {
        match ch {
            '~' => out.push_str("~0"),
            '/' => out.push_str("~1"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Unescape a raw reference token. Returns `None` when a `~` is not followed
/// by `0` or `1`.
pub fn unescape_segment(raw: &str) -> Option<String> {
    if !raw.contains('~') {
        return Some(raw.to_owned());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '~' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return None,
        }
    }
    Some(out)
}

/// Check whether every `~` in a raw segment starts a valid escape.
#[inline]
pub fn has_valid_escapes(raw: &str) -> bool {
    unescape_segment(raw).is_some()
}

/// A parsed JSON Pointer.
///
/// # Examples
///
/// ```
/// use formflow_state::Pointer;
///
/// let p = Pointer::root().key("items").index(0).key("a/b");
/// assert_eq!(p.to_string(), "/items/0/a~1b");
/// assert_eq!(Pointer::parse("/items/0/a~1b").unwrap(), p);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pointer(Vec<String>);

impl Pointer {
    /// The root pointer (`""`).
    #[inline]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Create a pointer from already-unescaped tokens.
    #[inline]
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    /// Parse pointer text, rejecting a missing leading slash and bad escapes.
    pub fn parse(text: &str) -> PatchResult<Self> {
        if text.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = text.strip_prefix('/') else {
            return Err(PatchError::invalid_pointer(text, "must start with '/'"));
        };
        rest.split('/')
            .map(|raw| {
                unescape_segment(raw).ok_or_else(|| {
                    PatchError::invalid_pointer(text, "'~' must be followed by '0' or '1'")
                })
            })
            .collect::<PatchResult<Vec<_>>>()
            .map(Self)
    }

    /// Append a key token (builder pattern).
    #[inline]
    pub fn key(mut self, k: impl Into<String>) -> Self {
        self.0.push(k.into());
        self
    }

    /// Append an array index token (builder pattern).
    #[inline]
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(i.to_string());
        self
    }

    /// Append the array end token `-` (builder pattern).
    #[inline]
    pub fn append_marker(mut self) -> Self {
        self.0.push("-".to_owned());
        self
    }

    /// Push a token onto the pointer (mutating).
    #[inline]
    pub fn push(&mut self, token: impl Into<String>) {
        self.0.push(token.into());
    }

    /// Pop the last token.
    #[inline]
    pub fn pop(&mut self) -> Option<String> {
        self.0.pop()
    }

    /// Unescaped tokens.
    #[inline]
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// Whether this is the root pointer.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of tokens.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Same as [`Pointer::is_root`].
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last token, if any.
    #[inline]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Pointer without its last token.
    pub fn parent(&self) -> Option<Pointer> {
        if self.0.is_empty() {
            None
        } else {
            Some(Pointer(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Whether `prefix` is a (non-strict) prefix of this pointer.
    #[inline]
    pub fn starts_with(&self, prefix: &Pointer) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Pointer extended with one more token.
    #[inline]
    pub fn child(&self, token: impl Into<String>) -> Pointer {
        let mut p = self.clone();
        p.0.push(token.into());
        p
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.0 {
            write!(f, "/{}", escape_segment(token))?;
        }
        Ok(())
    }
}

impl FromStr for Pointer {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pointer::parse(s)
    }
}

impl TryFrom<String> for Pointer {
    type Error = PatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Pointer::parse(&value)
    }
}

impl From<Pointer> for String {
    fn from(p: Pointer) -> Self {
        p.to_string()
    }
}

impl FromIterator<String> for Pointer {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Pointer(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Pointer {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Construct a [`Pointer`] from tokens.
///
/// ```
/// use formflow_state::pointer;
///
/// let p = pointer!("items", 0, "amount");
/// assert_eq!(p.to_string(), "/items/0/amount");
/// ```
#[macro_export]
macro_rules! pointer {
    () => {
        $crate::Pointer::root()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::Pointer::root();
        $(
            p.push(($seg).to_string());
        )+
        p
    }};
}
