//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::fs;
use std::path::Path;

use similar::TextDiff;

use crate::engine::Engine;
use crate::report::QuarantineReport;
use crate::target::QuarantineTarget;

use super::{CliError, CliResult, ExitCode, OutputOptions, Selection};

/// Inject skip guards and persist the rewritten files.
pub fn quarantine(
    reason: &str,
    selection: &Selection,
    output: &OutputOptions,
) -> CliResult<ExitCode> {
    let targets = collect_targets(selection)?;
    let engine = Engine::new(&selection.root).with_build_tags(selection.tags.clone());
    let report = engine
        .quarantine(&targets, reason)
        .map_err(|e| CliError::failure(format!("Error: {}", e)))?;
    finish(&report, &selection.root, output)
}

/// Remove previously injected guards and persist the rewritten files.
pub fn unquarantine(selection: &Selection, output: &OutputOptions) -> CliResult<ExitCode> {
    let targets = collect_targets(selection)?;
    let engine = Engine::new(&selection.root).with_build_tags(selection.tags.clone());
    let report = engine
        .unquarantine(&targets)
        .map_err(|e| CliError::failure(format!("Error: {}", e)))?;
    finish(&report, &selection.root, output)
}

/// Print the guards currently present under a root.
pub fn list(root: &Path, tags: Vec<String>, json: bool) -> CliResult<ExitCode> {
    let engine = Engine::new(root).with_build_tags(tags);
    let sites = engine
        .scan()
        .map_err(|e| CliError::failure(format!("Error: {}", e)))?;

    if json {
        let rendered = serde_json::to_string_pretty(&sites)
            .map_err(|e| CliError::failure(format!("Error encoding report: {}", e)))?;
        println!("{}", rendered);
        return Ok(ExitCode::SUCCESS);
    }

    if sites.is_empty() {
        println!("no quarantined tests");
        return Ok(ExitCode::SUCCESS);
    }
    for site in &sites {
        let reason = if site.reason.is_empty() {
            String::new()
        } else {
            format!("  [{}]", site.reason)
        };
        println!(
            "{}: {}  ({}){}",
            site.file.display(),
            site.names.join(", "),
            site.function,
            reason
        );
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Shared plumbing
// ============================================================================

/// Merge positional targets with a JSON targets file.
fn collect_targets(selection: &Selection) -> CliResult<Vec<QuarantineTarget>> {
    let mut targets: Vec<QuarantineTarget> = Vec::new();

    if let Some(path) = &selection.targets_file {
        let contents = fs::read_to_string(path)
            .map_err(|e| CliError::failure(format!("Error reading {}: {}", path.display(), e)))?;
        let parsed: Vec<QuarantineTarget> = serde_json::from_str(&contents).map_err(|e| {
            CliError::failure(format!("Error parsing {}: {}", path.display(), e))
        })?;
        targets.extend(parsed);
    }

    for raw in &selection.targets {
        let target = raw
            .parse::<QuarantineTarget>()
            .map_err(|e| CliError::failure(format!("Error: {}", e)))?;
        targets.push(target);
    }

    if targets.is_empty() {
        return Err(CliError::failure(
            "Error: no targets given (positional TARGETs or --targets-file)",
        ));
    }
    Ok(targets)
}

/// Report outcomes, then persist changed files (unless `--check`).
fn finish(report: &QuarantineReport, root: &Path, output: &OutputOptions) -> CliResult<ExitCode> {
    if output.json {
        let rendered = serde_json::to_string_pretty(report)
            .map_err(|e| CliError::failure(format!("Error encoding report: {}", e)))?;
        println!("{}", rendered);
    }

    for (package, test, reason) in report.failures() {
        eprintln!("failed: {}:{}  ({})", package, test, reason);
    }

    let mut changed = 0usize;
    for file in report.changed_files() {
        let path = root.join(&file.file);
        if output.diff {
            let original = fs::read_to_string(&path).map_err(|e| {
                CliError::failure(format!("Error reading {}: {}", path.display(), e))
            })?;
            print_diff(&file.file.display().to_string(), &original, &file.modified_source);
        }
        if !output.check {
            fs::write(&path, &file.modified_source).map_err(|e| {
                CliError::failure(format!("Error writing {}: {}", path.display(), e))
            })?;
        }
        changed += 1;
    }

    if !output.json {
        let verb = if output.check { "would modify" } else { "modified" };
        println!(
            "{} {} file(s), {} test(s) processed, {} failure(s)",
            verb,
            changed,
            report.success_count(),
            report.failures().len()
        );
    }

    if !report.failures().is_empty() || (output.check && changed > 0) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_diff(name: &str, original: &str, modified: &str) {
    let diff = TextDiff::from_lines(original, modified);
    print!(
        "{}",
        diff.unified_diff()
            .context_radius(3)
            .header(&format!("a/{}", name), &format!("b/{}", name))
    );
}
