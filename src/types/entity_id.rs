//! Hierarchical entity identifiers of the form `domain:key=value[,key=value]*`.
//!
//! A value may be quoted (`name="a,b"`). Quoted values keep their quotes and
//! may contain separators; a backslash escapes the next character.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DecorationError;

/// Property keys may not contain the separators of the identifier grammar.
static PROPERTY_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^[^,=:*?"]+$"#).unwrap());

/// The property that names the kind of an entity and is promoted to the
/// second naming segment.
pub const TYPE_PROPERTY: &str = "type";

/// A parsed entity identifier: a domain plus an ordered, key-unique list of properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    domain: String,
    properties: Vec<(String, String)>,
}

impl EntityId {
    /// Build an identifier from a domain and the property list suffix used as
    /// a key in listing trees (e.g. `type=Bar,name=X`).
    pub fn from_parts(domain: &str, properties: &str) -> Result<Self, DecorationError> {
        if domain.is_empty() {
            return Err(DecorationError::MalformedIdentifier(format!(
                "empty domain in '{domain}:{properties}'"
            )));
        }
        if properties.is_empty() {
            return Err(DecorationError::MalformedIdentifier(format!(
                "empty property list in '{domain}:'"
            )));
        }

        let malformed = |reason: String| {
            DecorationError::MalformedIdentifier(format!("{reason} in '{domain}:{properties}'"))
        };

        let mut parsed: Vec<(String, String)> = Vec::new();
        for pair in split_properties(properties).map_err(malformed)? {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(malformed(format!("property '{pair}' has no '='")));
            };
            if !PROPERTY_KEY.is_match(key) {
                return Err(malformed(format!("invalid property key '{key}'")));
            }
            if value.starts_with('"') {
                if !is_closed_quote(value) {
                    return Err(malformed(format!("badly quoted value {value}")));
                }
            } else if value.contains('"') {
                return Err(malformed(format!("stray quote in value '{value}'")));
            }
            if parsed.iter().any(|(k, _)| k == key) {
                return Err(malformed(format!("duplicate property key '{key}'")));
            }
            parsed.push((key.to_string(), value.to_string()));
        }

        Ok(Self {
            domain: domain.to_string(),
            properties: parsed,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Properties in their original order.
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `type` property, if present.
    pub fn kind(&self) -> Option<&str> {
        self.property(TYPE_PROPERTY)
    }

    /// The property list as it appears after the domain separator.
    pub fn property_list(&self) -> String {
        self.properties
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Split a property list on the commas outside quoted values. Inside quotes a
/// backslash escapes the next character.
fn split_properties(properties: &str) -> Result<Vec<&str>, String> {
    let mut pairs = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in properties.char_indices() {
        if quoted {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => quoted = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => quoted = true,
            ',' => {
                pairs.push(&properties[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quoted {
        return Err("unterminated quoted value".to_string());
    }
    pairs.push(&properties[start..]);
    Ok(pairs)
}

/// A quoted value must end at its first unescaped closing quote.
fn is_closed_quote(value: &str) -> bool {
    let mut escaped = false;
    for (i, c) in value.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return i + 1 == value.len(),
            _ => {}
        }
    }
    false
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.domain, self.property_list())
    }
}

impl FromStr for EntityId {
    type Err = DecorationError;

    /// Accepts `org.foo:type=Bar,name=X`. The domain ends at the first `:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((domain, properties)) = s.split_once(':') else {
            return Err(DecorationError::MalformedIdentifier(format!(
                "missing ':' domain separator in '{s}'"
            )));
        };
        EntityId::from_parts(domain, properties)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
