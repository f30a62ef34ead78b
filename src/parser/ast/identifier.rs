use std::{borrow::Cow, fmt};

use tracing::warn;

/// Dotted name as written: `[catalog.][schema.]name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub parts: Vec<String>,
}

impl QualifiedName {
    pub fn new(parts: Vec<String>) -> Self {
        Self { parts }
    }

    /// Last part; empty for an empty name.
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    /// Schema part, when the name has at least two parts.
    pub fn schema(&self) -> Option<&str> {
        let n = self.parts.len();
        (n >= 2).then(|| self.parts[n - 2].as_str())
    }

    /// Catalog part, when the name has three parts.
    pub fn catalog(&self) -> Option<&str> {
        let n = self.parts.len();
        (n >= 3).then(|| self.parts[n - 3].as_str())
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl From<&str> for QualifiedName {
    fn from(dotted: &str) -> Self {
        Self { parts: dotted.split('.').map(str::to_string).collect() }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}

/// Cut `ident` to at most `max_len` bytes without splitting a character.
pub fn truncate_identifier(ident: &str, max_len: usize) -> Cow<'_, str> {
    if ident.len() <= max_len {
        return Cow::Borrowed(ident);
    }
    let mut end = max_len;
    while end > 0 && !ident.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = &ident[..end];
    warn!(identifier = ident, truncated, "identifier will be truncated");
    Cow::Owned(truncated.to_string())
}
