// src/dag/exclusions.rs

//! Curated soft-dependency exclusions.
//!
//! Package metadata declares optional and runtime-only relationships exactly
//! like hard build dependencies. Some of those would fabricate cycles in the
//! build graph, so the graph builder consults this table before adding an
//! edge:
//!
//! - `soft`: `dependent -> {dependency}` source-level edges to drop.
//! - `optional_binaries`: binary names that never produce an edge, whoever
//!   depends on them (docs/test tooling).

use std::collections::{BTreeMap, BTreeSet};

use crate::config::model::ExclusionsSection;
use crate::types::PackageName;

/// Source-level edges known to be soft.
pub const BUILTIN_SOFT_EXCLUSIONS: &[(&str, &[&str])] = &[
    // oslo.config only pulls oslo.log in at runtime.
    ("python-oslo.config", &["python-oslo.log"]),
    ("networking-bagpipe", &["networking-bgpvpn"]),
];

/// Binaries that are only ever needed for docs, linting or tests.
pub const BUILTIN_OPTIONAL_BINARIES: &[&str] = &[
    "python3-hacking",
    "python3-openstackdocstheme",
    "python3-oslotest",
    "python3-reno",
    "python3-sphinx",
    "python3-sphinx-rtd-theme",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoftDependencyExclusions {
    soft: BTreeMap<PackageName, BTreeSet<PackageName>>,
    optional_binaries: BTreeSet<String>,
}

impl SoftDependencyExclusions {
    /// An empty table; nothing is excluded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for (dependent, deps) in BUILTIN_SOFT_EXCLUSIONS {
            for dep in *deps {
                table.add(*dependent, *dep);
            }
        }
        for bin in BUILTIN_OPTIONAL_BINARIES {
            table.add_optional_binary(*bin);
        }
        table
    }

    /// Build the effective table from the `[exclusions]` config section.
    ///
    /// Config entries extend the built-in table unless `replace_builtin` is
    /// set, in which case they are the whole table.
    pub fn from_section(section: &ExclusionsSection) -> Self {
        let mut table = if section.replace_builtin {
            Self::empty()
        } else {
            Self::builtin()
        };
        for (dependent, deps) in &section.soft {
            for dep in deps {
                table.add(dependent.as_str(), dep.as_str());
            }
        }
        for bin in &section.optional_binaries {
            table.add_optional_binary(bin.as_str());
        }
        table
    }

    pub fn add(&mut self, dependent: impl Into<PackageName>, dependency: impl Into<PackageName>) {
        self.soft
            .entry(dependent.into())
            .or_default()
            .insert(dependency.into());
    }

    pub fn add_optional_binary(&mut self, binary: impl Into<String>) {
        self.optional_binaries.insert(binary.into());
    }

    /// Whether the source-level edge `dependent -> dependency` must be skipped.
    pub fn is_excluded(&self, dependent: &str, dependency: &str) -> bool {
        self.soft
            .get(dependent)
            .is_some_and(|deps| deps.contains(dependency))
    }

    pub fn is_optional_binary(&self, binary: &str) -> bool {
        self.optional_binaries.contains(binary)
    }

    /// Number of excluded source-level edges.
    pub fn len(&self) -> usize {
        self.soft.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.soft.is_empty() && self.optional_binaries.is_empty()
    }

    /// Excluded edges as `(dependent, dependency)` pairs, sorted.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.soft
            .iter()
            .flat_map(|(k, deps)| deps.iter().map(move |d| (k.as_str(), d.as_str())))
    }
}
