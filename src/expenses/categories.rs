//! Category table — ordered keyword lists loaded from a JSON file.
//!
//! The file is a single object mapping category name to keywords:
//!
//! ```json
//! { "transporte": ["METRO", "bus"], "comida": ["cafeteria"] }
//! ```
//!
//! Declaration order is match priority, so entries are kept in a `Vec`
//! exactly as they appear in the file.

use std::fmt;
use std::path::Path;

use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use tracing::warn;

use crate::error::ConfigError;

/// One category and its lowercased keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Ordered mapping of category name to keyword list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTable {
    entries: Vec<Category>,
}

impl CategoryTable {
    /// Load and normalize a category file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::CategoriesNotFound(display.clone())
            } else {
                ConfigError::Io(e)
            }
        })?;
        Self::from_json_str(&raw, &display)
    }

    /// Parse a category document. `source` only labels errors.
    pub fn from_json_str(json: &str, source: &str) -> Result<Self, ConfigError> {
        let OrderedCategories(pairs) =
            serde_json::from_str(json).map_err(|e| ConfigError::MalformedCategories {
                path: source.to_string(),
                reason: e.to_string(),
            })?;
        Self::from_pairs(pairs).map_err(|reason| ConfigError::MalformedCategories {
            path: source.to_string(),
            reason,
        })
    }

    /// Build a table from `(name, keywords)` pairs, lowercasing keywords.
    ///
    /// Only a repeated name is an error. An empty keyword is kept (it matches
    /// every detail) but logged, since it is almost always a typo.
    pub fn from_pairs<N, K, I>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (N, Vec<K>)>,
        N: Into<String>,
        K: AsRef<str>,
    {
        let mut entries: Vec<Category> = Vec::new();
        for (name, keywords) in pairs {
            let name = name.into();
            if entries.iter().any(|c| c.name == name) {
                return Err(format!("duplicate category `{name}`"));
            }
            let keywords = keywords
                .iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect::<Vec<_>>();
            if keywords.iter().any(|k| k.is_empty()) {
                warn!(
                    category = %name,
                    "Category has an empty keyword, it matches every expense"
                );
            }
            entries.push(Category { name, keywords });
        }
        Ok(Self { entries })
    }

    /// Categories in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Map visitor that keeps document order and rejects duplicate keys.
struct OrderedCategories(Vec<(String, Vec<String>)>);

impl<'de> Deserialize<'de> for OrderedCategories {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = OrderedCategories;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping category names to keyword lists")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs: Vec<(String, Vec<String>)> =
                    Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, keywords)) = map.next_entry::<String, Vec<String>>()? {
                    if pairs.iter().any(|(n, _)| *n == name) {
                        return Err(de::Error::custom(format!("duplicate category `{name}`")));
                    }
                    pairs.push((name, keywords));
                }
                Ok(OrderedCategories(pairs))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}
