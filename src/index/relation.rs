// src/index/relation.rs

//! Parser for Debian-style relation fields.
//!
//! ```text
//! python3-six (>= 1.10), python3-pbr:any | python3-setuptools [amd64] <!nocheck>
//! ```
//!
//! Commas separate relations; `|` separates alternatives inside one
//! relation. Each alternative keeps its name, an optional version
//! constraint, architecture qualifiers and build profiles. Multiarch
//! suffixes such as `:any` are dropped from the name.

use regex::Regex;

use crate::errors::{Result, StackbuildError};

const RELATION_PATTERN: &str = r"^(?P<name>[A-Za-z0-9][A-Za-z0-9+.\-_]*)(?::[a-z0-9\-]+)?\s*(?:\(\s*(?P<op><<|<=|=|>=|>>|<|>)\s*(?P<version>[^)\s]+)\s*\))?\s*(?:\[(?P<arch>[^\]]*)\])?\s*(?P<profiles>(?:<[^>]*>\s*)*)$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    pub op: String,
    pub version: String,
}

/// One alternative of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub version: Option<VersionConstraint>,
    pub arch: Vec<String>,
    pub profiles: Vec<String>,
}

/// A single comma-separated relation: satisfied by any one alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub alternatives: Vec<Dependency>,
}

impl Relation {
    /// Names of all alternatives, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.alternatives.iter().map(|d| d.name.as_str())
    }
}

/// Compiled relation parser.
#[derive(Debug, Clone)]
pub struct RelationParser {
    re: Regex,
}

impl RelationParser {
    pub fn new() -> Result<Self> {
        let re = Regex::new(RELATION_PATTERN)
            .map_err(|e| StackbuildError::IndexError(format!("invalid relation pattern: {e}")))?;
        Ok(Self { re })
    }

    /// Parse a full relation field. Empty segments are ignored.
    pub fn parse_field(&self, field: &str) -> Result<Vec<Relation>> {
        let mut out = Vec::new();
        for part in field.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let alternatives = part
                .split('|')
                .map(|alt| self.parse_dependency(alt.trim()))
                .collect::<Result<Vec<_>>>()?;
            out.push(Relation { alternatives });
        }
        Ok(out)
    }

    fn parse_dependency(&self, text: &str) -> Result<Dependency> {
        let caps = self.re.captures(text).ok_or_else(|| {
            StackbuildError::IndexError(format!("cannot parse dependency '{text}'"))
        })?;

        let version = match (caps.name("op"), caps.name("version")) {
            (Some(op), Some(v)) => Some(VersionConstraint {
                op: op.as_str().to_string(),
                version: v.as_str().to_string(),
            }),
            _ => None,
        };

        let arch = caps
            .name("arch")
            .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let profiles = caps
            .name("profiles")
            .map(|m| {
                m.as_str()
                    .split('>')
                    .map(|p| p.trim().trim_start_matches('<').trim())
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Dependency {
            name: caps["name"].to_string(),
            version,
            arch,
            profiles,
        })
    }
}
