//! Batch orchestration.
//!
//! The [`Engine`] drives one quarantine/unquarantine invocation: normalize
//! targets, resolve packages to files, match declarations, rewrite, and
//! aggregate. It reads source files but never writes anything back — the
//! caller owns persistence, commits, and anything beyond that.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::loader::{TagSet, Workspace};
use crate::parse::{GoSource, block_statements, decl};
use crate::report::{
    FailureReason, FileResult, GuardKind, GuardSite, QuarantineReport, TestFailure,
};
use crate::rewrite::{self, guard};
use crate::target::{QuarantineTarget, normalize};

/// One engine per root directory. Holds no state beyond its configuration,
/// so independent roots can be processed concurrently from separate engines.
#[derive(Debug, Clone)]
pub struct Engine {
    root: PathBuf,
    build_tags: Vec<String>,
}

enum Mode<'a> {
    Quarantine { reason: &'a str },
    Unquarantine,
}

impl Engine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Engine {
            root: root.into(),
            build_tags: Vec::new(),
        }
    }

    /// Extra build tags applied during file selection, alongside the implied
    /// host platform.
    pub fn with_build_tags(mut self, tags: Vec<String>) -> Self {
        self.build_tags = tags;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Inject skip guards for every requested target. `reason` is the
    /// tracking identifier embedded in each guard.
    #[tracing::instrument(skip_all, fields(root = %self.root.display(), targets = targets.len()))]
    pub fn quarantine(
        &self,
        targets: &[QuarantineTarget],
        reason: &str,
    ) -> Result<QuarantineReport, EngineError> {
        self.run(targets, &Mode::Quarantine { reason })
    }

    /// Remove the guards for every requested target.
    #[tracing::instrument(skip_all, fields(root = %self.root.display(), targets = targets.len()))]
    pub fn unquarantine(
        &self,
        targets: &[QuarantineTarget],
    ) -> Result<QuarantineReport, EngineError> {
        self.run(targets, &Mode::Unquarantine)
    }

    fn run(
        &self,
        targets: &[QuarantineTarget],
        mode: &Mode<'_>,
    ) -> Result<QuarantineReport, EngineError> {
        let targets = normalize(targets);
        let workspace = Workspace::discover(&self.root)?;
        let tags = TagSet::with_host_platform(&self.build_tags);

        let mut report = QuarantineReport::default();
        for target in &targets {
            self.process_package(&workspace, &tags, target, mode, &mut report)?;
        }
        tracing::info!(
            files = report.files.len(),
            successes = report.success_count(),
            failures = report.failures().len(),
            "batch complete"
        );
        Ok(report)
    }

    fn process_package(
        &self,
        workspace: &Workspace,
        tags: &TagSet,
        target: &QuarantineTarget,
        mode: &Mode<'_>,
        report: &mut QuarantineReport,
    ) -> Result<(), EngineError> {
        let Some(dir) = workspace.resolve(&target.package) else {
            for test in &target.tests {
                report.push_unmatched(&target.package, test, FailureReason::PackageNotFound);
            }
            return Ok(());
        };

        // Parse every candidate file once; a file that does not parse is set
        // aside and only surfaces for targets that match nowhere else.
        let mut sources: Vec<(PathBuf, String, GoSource)> = Vec::new();
        let mut unparseable: Vec<PathBuf> = Vec::new();
        for rel in workspace.package_files(&dir, tags)? {
            let abs = self.root.join(&rel);
            let text = fs::read_to_string(&abs).map_err(|e| EngineError::io(&abs, e))?;
            match GoSource::parse(text.clone()) {
                Ok(src) => sources.push((rel, text, src)),
                Err(err) => {
                    tracing::warn!(file = %rel.display(), %err, "skipping unparseable file");
                    unparseable.push(rel);
                }
            }
        }

        let mut successes: Vec<Vec<String>> = vec![Vec::new(); sources.len()];
        let mut failures: Vec<Vec<TestFailure>> = vec![Vec::new(); sources.len()];

        for test in &target.tests {
            let function = QuarantineTarget::function_name(test);
            let located = sources
                .iter()
                .position(|(_, _, src)| decl::find_function(src, function).is_some());
            let Some(idx) = located else {
                // The name might live in a file we had to skip.
                let reason = match unparseable.first() {
                    Some(file) => FailureReason::ParseFailed(file.display().to_string()),
                    None => FailureReason::TestNotFound,
                };
                report.push_unmatched(&target.package, test, reason);
                continue;
            };

            let src = &mut sources[idx].2;
            let outcome = match mode {
                Mode::Quarantine { reason } => rewrite::quarantine_test(src, test, reason),
                Mode::Unquarantine => rewrite::unquarantine_test(src, test),
            };
            match outcome {
                Ok(_) => successes[idx].push(test.clone()),
                Err(reason) => failures[idx].push(TestFailure {
                    test: test.clone(),
                    reason,
                }),
            }
        }

        for (idx, (rel, original, src)) in sources.into_iter().enumerate() {
            if successes[idx].is_empty() && failures[idx].is_empty() {
                continue;
            }
            let modified_source = src.text().to_string();
            report.push_file(FileResult {
                file: rel,
                package: target.package.clone(),
                changed: modified_source != original,
                modified_source,
                successes: std::mem::take(&mut successes[idx]),
                failures: std::mem::take(&mut failures[idx]),
            });
        }
        Ok(())
    }

    /// Inventory every guard currently present under the root.
    #[tracing::instrument(skip_all, fields(root = %self.root.display()))]
    pub fn scan(&self) -> Result<Vec<GuardSite>, EngineError> {
        let workspace = Workspace::discover(&self.root)?;
        let tags = TagSet::with_host_platform(&self.build_tags);

        let mut sites = Vec::new();
        for dir in workspace.all_package_dirs() {
            for rel in workspace.package_files(&dir, &tags)? {
                let abs = self.root.join(&rel);
                let text = fs::read_to_string(&abs).map_err(|e| EngineError::io(&abs, e))?;
                let Ok(src) = GoSource::parse(text) else {
                    continue;
                };
                collect_guards(&src, &rel, &mut sites);
            }
        }
        Ok(sites)
    }
}

fn collect_guards(src: &GoSource, rel: &Path, sites: &mut Vec<GuardSite>) {
    for node in decl::function_nodes(src) {
        let info = decl::function_info(src, node);
        if info.kind.is_none() {
            continue;
        }
        let Some(body) = node.child_by_field_name("body") else {
            continue;
        };

        if let Some(skip) = block_statements(body)
            .into_iter()
            .find_map(|s| guard::as_tagged_skip(src, s))
        {
            sites.push(GuardSite {
                file: rel.to_path_buf(),
                function: info.name.clone(),
                kind: GuardKind::Function,
                names: vec![info.name.clone()],
                reason: guard::reason_of(&skip.message).to_string(),
            });
        }

        for g in rewrite::subtest_guards(src, body) {
            sites.push(GuardSite {
                file: rel.to_path_buf(),
                function: info.name.clone(),
                kind: GuardKind::Subtest,
                names: g.names.clone(),
                reason: guard::reason_of(&g.message).to_string(),
            });
        }
    }
}
