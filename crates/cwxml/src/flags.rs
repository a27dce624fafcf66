//! String-tagged bit sets.

use std::fmt;

/// Order-preserving set of flag tokens.
///
/// Stored on disk as `", "`-separated tokens. Unknown tokens are kept verbatim
/// so they survive a round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Flags(Vec<String>);

impl Flags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a separated token list. Commas, `|` and whitespace all separate.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut flags = Self::new();
        for token in text
            .split(|c: char| c == ',' || c == '|' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            flags.insert(token);
        }
        flags
    }

    /// Insert a token, keeping first-insertion order. Returns false if present.
    pub fn insert(&mut self, token: &str) -> bool {
        if self.contains(token) {
            return false;
        }
        self.0.push(token.to_string());
        true
    }

    /// Remove a token. Returns false if it was not present.
    pub fn remove(&mut self, token: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|t| t != token);
        before != self.0.len()
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.0.iter().any(|t| t == token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Flags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut flags = Self::new();
        for token in iter {
            flags.insert(token.as_ref());
        }
        flags
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}
