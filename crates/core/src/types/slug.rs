//! URL slugs for categories and products.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A lowercase, hyphen-separated URL fragment derived from a name.
///
/// ```
/// use loka_core::Slug;
///
/// assert_eq!(Slug::from_name("Kopi Gayo  Arabica!").as_str(), "kopi-gayo-arabica");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Derive a slug from a display name.
    ///
    /// Alphanumerics are lowercased, runs of whitespace, hyphens or
    /// underscores collapse into one hyphen, everything else is dropped.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let mut out = String::with_capacity(name.len());
        let mut pending_hyphen = false;
        for ch in name.chars() {
            if ch.is_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.extend(ch.to_lowercase());
            } else if ch.is_whitespace() || ch == '-' || ch == '_' {
                pending_hyphen = true;
            }
        }
        Self(out)
    }

    /// First slug built from `base` that `is_taken` rejects: `base`, then
    /// `base-1`, `base-2`, and so on.
    #[must_use]
    pub fn unique(base: &Self, mut is_taken: impl FnMut(&str) -> bool) -> Self {
        if !is_taken(&base.0) {
            return base.clone();
        }
        let mut n: u32 = 1;
        loop {
            let candidate = format!("{}-{n}", base.0);
            if !is_taken(&candidate) {
                return Self(candidate);
            }
            n += 1;
        }
    }

    /// Wrap a slug read back from storage.
    #[must_use]
    pub const fn from_stored(s: String) -> Self {
        Self(s)
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
