#![allow(dead_code)]

use std::collections::BTreeMap;

use stackbuild::config::{
    ConfigFile, ExclusionsSection, IndexSection, RawBuildSection, RawConfigFile, RunSection,
};
use stackbuild::dag::DependencyGraph;
use stackbuild::index::{PackageIndex, RawBinary, RawIndex, RawSource};
use stackbuild::ledger::{Ledger, RunHeader, RunPolicy};
use stackbuild::types::{BuildType, FailureType, PackageStatus};

/// Builder for `DependencyGraph`. Every named node needs a rebuild.
#[derive(Default)]
pub struct GraphBuilder {
    graph: DependencyGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, name: &str) -> Self {
        self.graph.add_node(name, true, "1.0");
        self
    }

    pub fn nodes(mut self, names: &[&str]) -> Self {
        for name in names {
            self.graph.add_node(*name, true, "1.0");
        }
        self
    }

    /// `from` needs `to` first.
    pub fn edge(mut self, from: &str, to: &str) -> Self {
        self.graph.add_edge(from, to);
        self
    }

    pub fn build(self) -> DependencyGraph {
        self.graph
    }
}

/// Builder for a fresh `Ledger` with a fixed identity.
pub struct LedgerBuilder {
    run_id: String,
    packages: Vec<String>,
    policy: RunPolicy,
    statuses: Vec<(String, PackageStatus)>,
}

impl LedgerBuilder {
    pub fn new(packages: &[&str]) -> Self {
        Self {
            run_id: "20260101T000000.000Z".to_string(),
            packages: packages.iter().map(|p| p.to_string()).collect(),
            policy: RunPolicy::default(),
            statuses: Vec::new(),
        }
    }

    pub fn run_id(mut self, run_id: &str) -> Self {
        self.run_id = run_id.to_string();
        self
    }

    pub fn keep_going(mut self, val: bool) -> Self {
        self.policy.keep_going = val;
        self
    }

    pub fn max_failures(mut self, n: usize) -> Self {
        self.policy.max_failures = n;
        self
    }

    pub fn parallel(mut self, n: usize) -> Self {
        self.policy.parallel = n;
        self
    }

    pub fn allow_skipped_deps(mut self, val: bool) -> Self {
        self.policy.allow_skipped_deps = val;
        self
    }

    /// Drive `package` into `status` through the regular transitions.
    pub fn with_status(mut self, package: &str, status: PackageStatus) -> Self {
        self.statuses.push((package.to_string(), status));
        self
    }

    pub fn build(self) -> Ledger {
        let header = RunHeader {
            run_id: self.run_id,
            target: "caracal".to_string(),
            series: "noble".to_string(),
            build_type: BuildType::Release,
        };
        let mut ledger = Ledger::new(header, self.policy, self.packages);

        for (name, status) in self.statuses {
            match status {
                PackageStatus::Pending => {}
                PackageStatus::Building => ledger.mark_started(&name),
                PackageStatus::Success => {
                    ledger.mark_started(&name);
                    ledger.mark_success(&name, None);
                }
                PackageStatus::Failed => {
                    ledger.mark_started(&name);
                    ledger.mark_failed(&name, FailureType::BuildFailed, "scripted failure", None);
                }
                PackageStatus::Skipped => ledger.mark_skipped(&name, "scripted skip"),
                PackageStatus::Blocked => ledger.mark_blocked(&name, "scripted-dependency"),
            }
        }
        ledger
    }
}

/// Builder for `PackageIndex` that goes through the TOML-facing raw model.
#[derive(Default)]
pub struct IndexBuilder {
    raw: RawIndex,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, name: &str, version: &str) -> Self {
        self.raw.source.entry(name.to_string()).or_default().version = version.to_string();
        self
    }

    /// Add `binary` to `source` with the given relation fields.
    pub fn binary(mut self, source: &str, binary: &str, depends: &[&str]) -> Self {
        self.binary_full(source, binary, depends, &[]);
        self
    }

    pub fn binary_providing(
        mut self,
        source: &str,
        binary: &str,
        depends: &[&str],
        provides: &[&str],
    ) -> Self {
        self.binary_full(source, binary, depends, provides);
        self
    }

    fn binary_full(&mut self, source: &str, binary: &str, depends: &[&str], provides: &[&str]) {
        let src: &mut RawSource = self.raw.source.entry(source.to_string()).or_default();
        src.binary.insert(
            binary.to_string(),
            RawBinary {
                version: None,
                depends: depends.iter().map(|d| d.to_string()).collect(),
                pre_depends: Vec::new(),
                provides: provides.iter().map(|p| p.to_string()).collect(),
            },
        );
    }

    pub fn build(self) -> PackageIndex {
        PackageIndex::try_from(self.raw).expect("Failed to build valid index from builder")
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                run: RunSection {
                    target: "caracal".to_string(),
                    series: "noble".to_string(),
                    ..RunSection::default()
                },
                index: IndexSection::default(),
                build: RawBuildSection {
                    command: "true {package}".to_string(),
                    workdir: None,
                    exit_codes: BTreeMap::new(),
                },
                exclusions: ExclusionsSection::default(),
            },
        }
    }

    pub fn packages(mut self, names: &[&str]) -> Self {
        self.config.run.packages = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.config.build.command = command.to_string();
        self
    }

    pub fn parallel(mut self, n: usize) -> Self {
        self.config.run.parallel = n;
        self
    }

    pub fn keep_going(mut self, val: bool) -> Self {
        self.config.run.keep_going = val;
        self
    }

    pub fn max_failures(mut self, n: usize) -> Self {
        self.config.run.max_failures = n;
        self
    }

    pub fn soft_exclusion(mut self, dependent: &str, dependency: &str) -> Self {
        self.config
            .exclusions
            .soft
            .entry(dependent.to_string())
            .or_default()
            .push(dependency.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
