//! Element locators used in error reports.

use std::fmt;

/// Slash separated path from the document root to an element.
///
/// List entries carry their position, e.g. `Drawable/ShaderGroup/Shaders/Item[2]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ElementPath(String);

impl ElementPath {
    /// Path of a document root element.
    #[must_use]
    pub fn root(tag: &str) -> Self {
        Self(tag.to_string())
    }

    /// Path of the child `tag` of this element.
    #[must_use]
    pub fn child(&self, tag: &str) -> Self {
        if self.0.is_empty() {
            return Self::root(tag);
        }
        Self(format!("{}/{tag}", self.0))
    }

    /// Path of the `index`-th entry named `tag` below this element.
    #[must_use]
    pub fn item(&self, tag: &str, index: usize) -> Self {
        self.child(&format!("{tag}[{index}]"))
    }

    /// Path of the attribute `name` on this element.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Self {
        Self(format!("{}@{name}", self.0))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}
