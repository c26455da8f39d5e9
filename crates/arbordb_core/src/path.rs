//! Logical paths and their flat key encoding.
//!
//! ## Flat Key Format
//!
//! A flat key is the concatenation of one token per path segment:
//!
//! - object field: `/` followed by the escaped field name
//!   (`~` → `~0`, `/` → `~1`, `[` → `~2`)
//! - array slot: `[` followed by the decimal index and `]`
//!
//! The root of a realm is the empty key. Escaping guarantees that `/` and `[`
//! only ever start a token, so every key splits unambiguously and two distinct
//! paths never share a key.

use crate::error::{CoreError, CoreResult};
use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// One decoded token of a flat key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySegment {
    /// An object field.
    Field(String),
    /// An array slot.
    Index(usize),
}

impl KeySegment {
    /// Returns the segment as it appears in a logical path.
    #[must_use]
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            Self::Field(name) => Cow::Borrowed(name),
            Self::Index(index) => Cow::Owned(index.to_string()),
        }
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Self::Field(name) => name == segment,
            Self::Index(index) => array_index(segment) == Some(*index),
        }
    }
}

/// Appends the field token for `name` to `out`.
pub fn push_field(out: &mut String, name: &str) {
    out.push('/');
    for c in name.chars() {
        match c {
            '~' => out.push_str("~0"),
            '/' => out.push_str("~1"),
            '[' => out.push_str("~2"),
            c => out.push(c),
        }
    }
}

/// Appends the array slot token for `index` to `out`.
pub fn push_index(out: &mut String, index: usize) {
    out.push('[');
    out.push_str(&index.to_string());
    out.push(']');
}

fn unescape_field(raw: &str) -> Option<String> {
    if !raw.contains('~') {
        return Some(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                Some('2') => out.push('['),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Decodes a flat key into its segments.
///
/// # Errors
///
/// Returns [`CoreError::CorruptEntry`] if the key was not produced by the
/// flat key encoder.
pub fn parse_key(key: &str) -> CoreResult<Vec<KeySegment>> {
    let bytes = key.as_bytes();
    let mut segments = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'/' => {
                let start = i + 1;
                let end = key[start..]
                    .find(['/', '['])
                    .map_or(key.len(), |offset| start + offset);
                let name = unescape_field(&key[start..end])
                    .ok_or_else(|| CoreError::corrupt_entry(key, "invalid escape sequence"))?;
                segments.push(KeySegment::Field(name));
                i = end;
            }
            b'[' => {
                let start = i + 1;
                let end = key[start..]
                    .find(']')
                    .map(|offset| start + offset)
                    .ok_or_else(|| CoreError::corrupt_entry(key, "unterminated array slot"))?;
                let index = array_index(&key[start..end])
                    .ok_or_else(|| CoreError::corrupt_entry(key, "invalid array slot"))?;
                segments.push(KeySegment::Index(index));
                i = end + 1;
            }
            _ => return Err(CoreError::corrupt_entry(key, "unexpected character")),
        }
    }
    Ok(segments)
}

/// Parses a canonical non-negative integer (`0`, `17`, never `007` or `+1`).
#[must_use]
pub fn array_index(segment: &str) -> Option<usize> {
    let canonical = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if canonical {
        segment.parse().ok()
    } else {
        None
    }
}

/// Encodes `segments` with every slot written as a field token.
///
/// Keys that address the same logical position under field and slot
/// encodings (`/list[2]` and `/list/2`) share this form.
#[must_use]
pub fn logical_key(segments: &[KeySegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        push_field(&mut out, &segment.name());
    }
    out
}

/// Returns every proper ancestor of a flat key, root (`""`) first.
pub fn ancestor_keys(key: &str) -> impl Iterator<Item = &str> {
    key.char_indices()
        .filter(|(_, c)| *c == '/' || *c == '[')
        .map(move |(i, _)| &key[..i])
}

fn key_within(key: &str, prefix: &str) -> bool {
    key.starts_with(prefix) && matches!(key.as_bytes().get(prefix.len()), None | Some(b'/' | b'['))
}

/// A slash-delimited location inside a realm.
///
/// Empty segments are discarded, so `"/a//b/"` and `"a/b"` are the same path.
///
/// # Example
///
/// ```rust
/// use arbordb_core::LogicalPath;
///
/// let path = LogicalPath::parse("/users//ada/");
/// assert_eq!(path.segments(), ["users", "ada"]);
/// assert_eq!(path.to_string(), "/users/ada");
/// assert_eq!(path.token_prefix(), "/users/ada");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LogicalPath {
    segments: Vec<String>,
}

impl LogicalPath {
    /// The realm root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Splits `raw` on `/`, dropping empty segments.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self::from_segments(raw.split('/'))
    }

    /// Builds a path from segments, dropping empty ones.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// Returns the segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns true for the realm root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true for the realm root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the last segment.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns the parent path, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.segments.split_last()?;
        Some(Self {
            segments: parent.to_vec(),
        })
    }

    /// Returns this path extended by `segment`.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    /// Appends a segment. Empty segments are ignored.
    pub fn push(&mut self, segment: impl Into<String>) {
        let segment = segment.into();
        if !segment.is_empty() {
            self.segments.push(segment);
        }
    }

    /// Removes and returns the last segment.
    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }

    /// The flat key prefix of this path with every segment as an object field.
    #[must_use]
    pub fn token_prefix(&self) -> String {
        let mut prefix = String::new();
        for segment in &self.segments {
            push_field(&mut prefix, segment);
        }
        prefix
    }

    /// The flat key prefix addressing this path as an array slot of its parent.
    ///
    /// Only defined when the last segment is a canonical non-negative integer.
    #[must_use]
    pub fn array_prefix(&self) -> Option<String> {
        let (last, parent) = self.segments.split_last()?;
        let index = array_index(last)?;
        let mut prefix = String::new();
        for segment in parent {
            push_field(&mut prefix, segment);
        }
        push_index(&mut prefix, index);
        Some(prefix)
    }

    /// Builds a matcher selecting every flat key at or below this path.
    #[must_use]
    pub fn selector(&self) -> KeySelector {
        let inner_numeric = self
            .segments
            .split_last()
            .is_some_and(|(_, parent)| parent.iter().any(|s| array_index(s).is_some()));
        KeySelector {
            token_prefix: self.token_prefix(),
            array_prefix: self.array_prefix(),
            segments: inner_numeric.then(|| self.segments.clone()),
        }
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for LogicalPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Selects the flat keys of a subtree.
///
/// A key belongs to the subtree when it equals the path's token or array
/// prefix or continues it with a new token. When an inner segment is numeric
/// the subtree may also be stored under mixed field/slot encodings, which are
/// matched segment by segment.
#[derive(Debug, Clone)]
pub struct KeySelector {
    token_prefix: String,
    array_prefix: Option<String>,
    segments: Option<Vec<String>>,
}

impl KeySelector {
    /// Returns true if `key` lies at or below the selected path.
    #[must_use]
    pub fn covers(&self, key: &str) -> bool {
        if key_within(key, &self.token_prefix) {
            return true;
        }
        if self
            .array_prefix
            .as_deref()
            .is_some_and(|prefix| key_within(key, prefix))
        {
            return true;
        }
        let Some(segments) = &self.segments else {
            return false;
        };
        let Ok(decoded) = parse_key(key) else {
            return false;
        };
        decoded.len() >= segments.len()
            && segments
                .iter()
                .zip(&decoded)
                .all(|(segment, token)| token.matches(segment))
    }
}
