// src/index/mod.rs

//! Package index snapshot: which binaries each source package produces and
//! what those binaries depend on.
//!
//! The snapshot is a TOML document:
//!
//! ```toml
//! [source.nova]
//! version = "29.0.0-0ubuntu1"
//!
//! [source.nova.binary.python3-nova]
//! depends = ["python3-oslo.config (>= 1:9.0)", "python3-keystoneauth1 | python3-keystoneclient"]
//! provides = ["python3-nova-api"]
//! ```
//!
//! The graph builder only needs two questions answered: "which source owns
//! this binary name (directly or through `provides`)?" and "what does each
//! binary of this source depend on?".

pub mod relation;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{Result, StackbuildError};
use crate::fs::FileSystem;
use crate::types::PackageName;

pub use relation::{Dependency, Relation, RelationParser, VersionConstraint};

/// Raw TOML document as written on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIndex {
    #[serde(default)]
    pub source: BTreeMap<String, RawSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSource {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub binary: BTreeMap<String, RawBinary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBinary {
    /// Defaults to the source version.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub pre_depends: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPackage {
    pub name: String,
    pub version: String,
    pub source: PackageName,
    pub depends: Vec<Relation>,
    pub pre_depends: Vec<Relation>,
    pub provides: Vec<String>,
}

impl BinaryPackage {
    /// `pre_depends` followed by `depends`.
    pub fn all_relations(&self) -> impl Iterator<Item = &Relation> {
        self.pre_depends.iter().chain(self.depends.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePackage {
    pub name: PackageName,
    pub version: String,
    pub binaries: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    sources: BTreeMap<PackageName, SourcePackage>,
    binaries: BTreeMap<String, BinaryPackage>,
    /// Virtual package name -> binaries providing it.
    providers: BTreeMap<String, Vec<String>>,
}

impl PackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and parse an index snapshot.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let contents = fs.read_to_string(path)?;
        let index = Self::from_toml_str(&contents)?;
        debug!(
            path = %path.display(),
            sources = index.sources.len(),
            binaries = index.binaries.len(),
            "loaded package index"
        );
        Ok(index)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw: RawIndex = toml::from_str(contents)?;
        Self::try_from(raw)
    }

    pub fn add_source(&mut self, name: impl Into<PackageName>, version: impl Into<String>) {
        let name = name.into();
        self.sources
            .entry(name.clone())
            .or_insert_with(|| SourcePackage {
                name,
                version: String::new(),
                binaries: Vec::new(),
            })
            .version = version.into();
    }

    /// Register a binary under its source. The source is created on demand.
    pub fn add_binary(&mut self, binary: BinaryPackage) {
        let source = self
            .sources
            .entry(binary.source.clone())
            .or_insert_with(|| SourcePackage {
                name: binary.source.clone(),
                version: binary.version.clone(),
                binaries: Vec::new(),
            });
        if !source.binaries.contains(&binary.name) {
            source.binaries.push(binary.name.clone());
        }

        for virt in &binary.provides {
            let providers = self.providers.entry(virt.clone()).or_default();
            if !providers.contains(&binary.name) {
                providers.push(binary.name.clone());
                providers.sort();
            }
        }

        if let Some(prev) = self.binaries.insert(binary.name.clone(), binary) {
            warn!(
                binary = %prev.name,
                previous_source = %prev.source,
                "binary registered twice; keeping the latest"
            );
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourcePackage> {
        self.sources.get(name)
    }

    pub fn binary(&self, name: &str) -> Option<&BinaryPackage> {
        self.binaries.get(name)
    }

    pub fn contains_source(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn binaries_for_source(&self, source: &str) -> Vec<&BinaryPackage> {
        match self.sources.get(source) {
            Some(src) => src
                .binaries
                .iter()
                .filter_map(|b| self.binaries.get(b))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Source package owning `binary`, either directly or as the first
    /// (sorted) provider of a virtual package.
    pub fn resolve_source(&self, binary: &str) -> Option<&str> {
        if let Some(bin) = self.binaries.get(binary) {
            return Some(bin.source.as_str());
        }
        self.providers
            .get(binary)?
            .iter()
            .find_map(|p| self.binaries.get(p))
            .map(|bin| bin.source.as_str())
    }
}

impl TryFrom<RawIndex> for PackageIndex {
    type Error = StackbuildError;

    fn try_from(raw: RawIndex) -> std::result::Result<Self, Self::Error> {
        let parser = RelationParser::new()?;
        let mut index = PackageIndex::new();

        for (source_name, source) in raw.source {
            index.add_source(source_name.clone(), source.version.clone());

            for (bin_name, bin) in source.binary {
                let depends = parse_all(&parser, &bin.depends, &bin_name)?;
                let pre_depends = parse_all(&parser, &bin.pre_depends, &bin_name)?;
                index.add_binary(BinaryPackage {
                    version: bin.version.unwrap_or_else(|| source.version.clone()),
                    name: bin_name,
                    source: source_name.clone(),
                    depends,
                    pre_depends,
                    provides: bin.provides,
                });
            }
        }

        Ok(index)
    }
}

fn parse_all(parser: &RelationParser, fields: &[String], binary: &str) -> Result<Vec<Relation>> {
    let mut out = Vec::new();
    for field in fields {
        let mut parsed = parser.parse_field(field).map_err(|e| {
            StackbuildError::IndexError(format!("binary '{binary}': {e}"))
        })?;
        out.append(&mut parsed);
    }
    Ok(out)
}
