//! Partition keys as the warehouse names them.
//!
//! A partition is identified by fixed values for each of the table's partition
//! columns, in declaration order. The warehouse lists partitions as
//! `col1=value1/col2=value2`, escaping special characters in column names and
//! values as `%XX`:
//!
//! ```text
//! PARTITION_NAME ::= dimension ("/" dimension)*
//! dimension      ::= escaped_column "=" escaped_value
//! escaped        ::= (safe_char | "%" HEX HEX)*
//! ```
//!
//! # Examples
//!
//! ```rust
//! use coldstore_core::partition::PartitionKey;
//!
//! let mut key = PartitionKey::new();
//! key.insert("load_date", "2024-01-01");
//! key.insert("source", "a/b");
//!
//! // Declaration order is kept and separators in values are escaped.
//! assert_eq!(key.to_string(), "load_date=2024-01-01/source=a%2Fb");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered mapping of partition column to value.
///
/// Order is the table's declared partition order, which is also the order the
/// warehouse expects in `PARTITION (...)` specs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PartitionKey(Vec<(String, String)>);

impl PartitionKey {
    /// Creates a new empty partition key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a dimension into the partition key.
    ///
    /// If the column already exists its value is replaced in place, otherwise
    /// the column is appended.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        if let Some(slot) = self.0.iter_mut().find(|(c, _)| *c == column) {
            slot.1 = value;
        } else {
            self.0.push((column, value));
        }
    }

    /// Gets a dimension value by column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Returns an iterator over `(column, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    /// Returns the partition column names in declaration order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.0.iter().map(|(c, _)| c.clone()).collect()
    }

    /// Returns true if the partition key has no dimensions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Parses a partition name as listed by `SHOW PARTITIONS`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, a segment has no `=`, a column is
    /// empty or repeated, or an escape sequence is malformed.
    pub fn parse_name(name: &str) -> Result<Self, PartitionKeyParseError> {
        if name.is_empty() {
            return Err(PartitionKeyParseError::Empty);
        }

        let mut key = Self::new();
        for segment in name.split('/') {
            let (column, value) = segment
                .split_once('=')
                .ok_or_else(|| PartitionKeyParseError::MissingEquals(segment.to_string()))?;

            let column = unescape(column)?;
            if column.is_empty() {
                return Err(PartitionKeyParseError::EmptyColumn(segment.to_string()));
            }
            if key.get(&column).is_some() {
                return Err(PartitionKeyParseError::DuplicateColumn(column));
            }
            let value = unescape(value)?;
            key.0.push((column, value));
        }

        Ok(key)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (column, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}={}", escape(column), escape(value))?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PartitionKey {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut key = Self::new();
        for (column, value) in iter {
            key.insert(column, value);
        }
        key
    }
}

/// Errors that can occur when parsing a partition name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionKeyParseError {
    /// The partition name was empty.
    #[error("empty partition name")]
    Empty,
    /// Missing '=' separator between column and value.
    #[error("missing '=' in partition segment: {0}")]
    MissingEquals(String),
    /// The column part of a segment was empty.
    #[error("empty column in partition segment: {0}")]
    EmptyColumn(String),
    /// A column appeared twice.
    #[error("duplicate partition column: {0}")]
    DuplicateColumn(String),
    /// A `%XX` escape was truncated or not hexadecimal.
    #[error("invalid escape sequence in: {0}")]
    InvalidEscape(String),
}

fn needs_escape(c: char) -> bool {
    matches!(
        c,
        '\u{01}'..='\u{1F}'
            | '"'
            | '#'
            | '%'
            | '\''
            | '*'
            | '/'
            | ':'
            | '='
            | '?'
            | '\\'
            | '\u{7F}'
            | '{'
            | '['
            | ']'
            | '^'
    )
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if needs_escape(c) {
            out.push_str(&format!("%{:02X}", u32::from(c)));
        } else {
            out.push(c);
        }
    }
    out
}

fn unescape(escaped: &str) -> Result<String, PartitionKeyParseError> {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let hex: String = chars.by_ref().take(2).collect();
        let byte = (hex.len() == 2)
            .then(|| u8::from_str_radix(&hex, 16).ok())
            .flatten()
            .ok_or_else(|| PartitionKeyParseError::InvalidEscape(escaped.to_string()))?;
        out.push(char::from(byte));
    }
    Ok(out)
}
