//! Lookup-key normalization shared by the Discogs fetcher and the library reconciler.
//!
//! Both sides of the sync spell names differently ("Café Tacvba" vs
//! "CAFE TACVBA", "Simon & Garfunkel" vs "Simon and Garfunkel (2)"), so
//! every artist and album name is reduced to a [`NormalizedKey`] before it
//! is stored or looked up.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Separator placed between words of a normalized key.
const SEPARATOR: char = '-';

/// Separator used when joining several credited artists into one name.
pub const ARTIST_JOINER: &str = " - ";

/// Discogs disambiguation suffixes such as "Nirvana (2)".
static DISAMBIGUATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\d+\)").unwrap());

/// A case-folded, diacritic-stripped, punctuation-normalized name.
///
/// Two raw names producing the same key are treated as the same artist
/// or album. Building a key from an existing key's text yields the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn new(raw: &str) -> Self {
        Self(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NormalizedKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for NormalizedKey {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<NormalizedKey> for String {
    fn from(key: NormalizedKey) -> Self {
        key.0
    }
}

impl AsRef<str> for NormalizedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reduce a raw title or name to its lookup form.
///
/// Compatibility-decomposes the text, drops combining marks, lowercases,
/// and collapses every run of non-alphanumeric characters into a single
/// `-`, trimming separators from both ends. A name with no letters or
/// digits at all ("!!!") keeps its folded, trimmed text instead, so such
/// names stay distinct from each other; only blank input gives an empty key.
///
/// ```rust
/// use discogs2music::normalize::normalize;
///
/// assert_eq!(normalize("Café"), normalize("CAFE"));
/// assert_eq!(normalize("  The Dark Side of the Moon! "), "the-dark-side-of-the-moon");
/// ```
pub fn normalize(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for c in fold(raw) {
        if c.is_alphanumeric() {
            if pending_separator && !key.is_empty() {
                key.push(SEPARATOR);
            }
            pending_separator = false;
            key.push(c);
        } else {
            pending_separator = true;
        }
    }

    if key.is_empty() {
        return fold(raw).collect::<String>().trim().to_string();
    }
    key
}

/// Decomposed, mark-free, lowercased characters of `raw`.
fn fold(raw: &str) -> impl Iterator<Item = char> + '_ {
    raw.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| !is_combining_mark(*c))
}

/// Remove Discogs "(N)" disambiguators from an artist name.
pub fn strip_disambiguator(name: &str) -> String {
    DISAMBIGUATOR.replace_all(name, "").trim().to_string()
}

/// Join the credited artists of a release into a single display name.
///
/// Each name loses its "(N)" disambiguator; names are joined with `" - "`.
pub fn artist_credit<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(strip_disambiguator)
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(ARTIST_JOINER)
}
