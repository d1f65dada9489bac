//! Dotted version numbers for catalog entries and model requirements.
//!
//! A [`Version`] is an ordered tuple of non-negative integers parsed from text such as
//! `"4.10"`. Ordering is numeric per component, never lexicographic, and missing trailing
//! components count as zero, so `"4.10"` ranks above `"4.9"` and `"1"` equals `"1.0"`.

use core::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

const SEPARATOR: char = '.';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParseError {
    #[error("version string is empty")]
    Empty,
    #[error("version \"{0}\" contains an empty component")]
    EmptyComponent(String),
    #[error("version \"{version}\" has a non-numeric component \"{component}\"")]
    NonNumeric { version: String, component: String },
    #[error("version \"{version}\" has a component that is too large: \"{component}\"")]
    OutOfRange { version: String, component: String },
    #[error("version {0} is written as a number, which drops trailing zeros; quote it")]
    Unquoted(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Version {
    /// The text as authored, kept for diagnostics.
    text: String,
    components: Vec<u64>,
}

impl Version {
    pub(crate) fn parse(raw: &str) -> Result<Version, ParseError> {
        let text = raw.trim();

        if text.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut components = Vec::new();

        for segment in text.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(ParseError::EmptyComponent(text.to_string()));
            }

            if !segment.chars().all(|c| c.is_ascii_digit()) {
                return Err(ParseError::NonNumeric {
                    version: text.to_string(),
                    component: segment.to_string(),
                });
            }

            let component = segment.parse::<u64>().map_err(|_| ParseError::OutOfRange {
                version: text.to_string(),
                component: segment.to_string(),
            })?;

            components.push(component);
        }

        Ok(Version {
            text: text.to_string(),
            components,
        })
    }

    /// Compare two versions component-wise, padding the shorter one with zeros.
    pub(crate) fn compare(a: &Version, b: &Version) -> Ordering {
        let len = a.components.len().max(b.components.len());

        for i in 0..len {
            let lhs = a.components.get(i).copied().unwrap_or(0);
            let rhs = b.components.get(i).copied().unwrap_or(0);

            match lhs.cmp(&rhs) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }

        Ordering::Equal
    }

    pub(crate) fn satisfies_minimum(&self, minimum: &Version) -> bool {
        Version::compare(self, minimum) != Ordering::Less
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.text
    }

    /// Components without trailing zeros; equal versions share this slice.
    fn significant(&self) -> &[u64] {
        let end = self
            .components
            .iter()
            .rposition(|&c| c != 0)
            .map_or(0, |i| i + 1);

        &self.components[..end]
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        Version::compare(self, other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        Version::compare(self, other)
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

/// Unparsed version text as it appears in a document.
///
/// Whole numbers such as `version: 4` are accepted as text. Fractional numbers are kept
/// aside and refused at parse time: `version: 4.10` arrives as the float `4.1`, so the
/// authored text is already lost.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum VersionText {
    Text(String),
    Unquoted(f64),
}

impl VersionText {
    pub(crate) fn as_text(&self) -> Result<&str, ParseError> {
        match self {
            VersionText::Text(text) => Ok(text),
            VersionText::Unquoted(n) => Err(ParseError::Unquoted(n.to_string())),
        }
    }

    pub(crate) fn parse(&self) -> Result<Version, ParseError> {
        Version::parse(self.as_text()?)
    }
}

impl<'de> Deserialize<'de> for VersionText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Integer(u64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => VersionText::Text(text),
            Raw::Integer(n) => VersionText::Text(n.to_string()),
            Raw::Float(n) => VersionText::Unquoted(n),
        })
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        VersionText::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
