//! Static resolution of package import paths to their declaring files.
//!
//! A root directory may hold one or more Go modules (nested modules
//! included). Discovery walks the tree once for `go.mod` files; resolution
//! maps an import path to a directory by longest-prefix match on module
//! paths, then lists that directory's buildable `.go` files. No code is
//! executed and no go toolchain is invoked — everything is derived from the
//! files on disk.

pub mod constraints;

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::EngineError;
pub use constraints::TagSet;

/// A discovered Go module: its declared import path and directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Module path from the `module` directive.
    pub path: String,
    /// Directory containing the go.mod, relative to the workspace root.
    pub dir: PathBuf,
}

/// The set of modules under a root directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    modules: Vec<Module>,
}

impl Workspace {
    /// Walk `root` for go.mod files and parse their module directives.
    ///
    /// Vendor trees, `testdata`, and dot/underscore directories are skipped,
    /// matching the go tool's traversal rules.
    pub fn discover(root: &Path) -> Result<Self, EngineError> {
        if !root.is_dir() {
            return Err(EngineError::RootNotFound(root.to_path_buf()));
        }

        let mut modules = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(traversable);
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                EngineError::io(path, e.into())
            })?;
            if entry.file_type().is_file() && entry.file_name() == "go.mod" {
                let contents = fs::read_to_string(entry.path())
                    .map_err(|e| EngineError::io(entry.path(), e))?;
                let path = parse_module_path(&contents).ok_or_else(|| EngineError::ModFile {
                    path: entry.path().to_path_buf(),
                    message: "missing module directive".to_string(),
                })?;
                let dir = entry
                    .path()
                    .parent()
                    .unwrap_or(root)
                    .strip_prefix(root)
                    .unwrap_or(Path::new(""))
                    .to_path_buf();
                modules.push(Module { path, dir });
            }
        }

        if modules.is_empty() {
            return Err(EngineError::NoModules(root.to_path_buf()));
        }
        // Deterministic resolution order regardless of filesystem iteration.
        modules.sort_by(|a, b| a.dir.cmp(&b.dir));

        tracing::debug!(root = %root.display(), modules = modules.len(), "discovered Go modules");
        Ok(Workspace {
            root: root.to_path_buf(),
            modules,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Resolve an import path to a package directory (relative to the root).
    ///
    /// The module whose path is the longest segment-prefix of the import path
    /// wins, so nested modules shadow their parents. Returns `None` when no
    /// module claims the path or the mapped directory does not exist.
    pub fn resolve(&self, import_path: &str) -> Option<PathBuf> {
        let module = self
            .modules
            .iter()
            .filter(|m| {
                import_path == m.path
                    || import_path
                        .strip_prefix(&m.path)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|m| m.path.len())?;

        let rel = import_path.strip_prefix(&module.path).unwrap_or("");
        let rel = rel.trim_start_matches('/');
        let dir = if rel.is_empty() {
            module.dir.clone()
        } else {
            module.dir.join(rel)
        };
        if self.root.join(&dir).is_dir() {
            Some(dir)
        } else {
            None
        }
    }

    /// List the buildable `.go` files of a package directory, sorted by name.
    ///
    /// `dir` is relative to the root (as returned by [`Workspace::resolve`]);
    /// the returned paths are too. Files excluded by build constraints are
    /// filtered out.
    pub fn package_files(&self, dir: &Path, tags: &TagSet) -> Result<Vec<PathBuf>, EngineError> {
        let abs = self.root.join(dir);
        let mut files = Vec::new();
        let entries = fs::read_dir(&abs).map_err(|e| EngineError::io(&abs, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::io(&abs, e))?;
            let path = entry.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "go") {
                continue;
            }
            let source = match fs::read_to_string(&path) {
                Ok(s) => s,
                // Unreadable or non-UTF-8 files cannot declare targets we can
                // edit; skip them rather than failing the package.
                Err(_) => continue,
            };
            if constraints::file_included(&path, &source, tags) {
                files.push(dir.join(entry.file_name()));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Every package directory in the workspace that contains buildable `.go`
    /// files, relative to the root. Used by the guard scanner.
    pub fn all_package_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(traversable);
        for entry in walker.flatten() {
            if !entry.file_type().is_dir() {
                continue;
            }
            let has_go = fs::read_dir(entry.path())
                .map(|mut it| {
                    it.any(|e| {
                        e.ok().is_some_and(|e| {
                            e.path().extension().is_some_and(|ext| ext == "go")
                        })
                    })
                })
                .unwrap_or(false);
            if has_go {
                let rel = entry
                    .path()
                    .strip_prefix(&self.root)
                    .unwrap_or(Path::new(""))
                    .to_path_buf();
                dirs.push(rel);
            }
        }
        dirs.sort();
        dirs
    }
}

/// Directory filter shared by discovery and scanning: skip vendor trees,
/// testdata, and dot/underscore directories.
fn traversable(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    let Some(name) = entry.file_name().to_str() else {
        return false;
    };
    !(name.starts_with('.') || name.starts_with('_') || name == "vendor" || name == "testdata")
}

/// Pull the module path out of a go.mod's `module` directive.
fn parse_module_path(contents: &str) -> Option<String> {
    for line in contents.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("module") {
            let rest = rest.trim();
            if rest.is_empty() {
                continue;
            }
            // The path may be quoted.
            let path = rest.trim_matches('"');
            return Some(path.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_parse_module_path() {
        assert_eq!(
            parse_module_path("module example.com/mod\n\ngo 1.22\n"),
            Some("example.com/mod".to_string())
        );
        assert_eq!(
            parse_module_path("// comment\nmodule \"quoted/path\"\n"),
            Some("quoted/path".to_string())
        );
        assert_eq!(parse_module_path("go 1.22\n"), None);
    }

    #[test]
    fn test_discover_and_resolve_nested_modules() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "go.mod", "module example.com/outer\n");
        write(root, "pkg/a.go", "package pkg\n");
        write(root, "sub/go.mod", "module example.com/outer/sub\n");
        write(root, "sub/inner/b.go", "package inner\n");

        let ws = Workspace::discover(root).unwrap();
        assert_eq!(ws.modules().len(), 2);

        assert_eq!(
            ws.resolve("example.com/outer/pkg"),
            Some(PathBuf::from("pkg"))
        );
        // The nested module's path wins over the outer prefix.
        assert_eq!(
            ws.resolve("example.com/outer/sub/inner"),
            Some(PathBuf::from("sub/inner"))
        );
        assert_eq!(ws.resolve("example.com/outer"), Some(PathBuf::from("")));
        assert_eq!(ws.resolve("example.com/elsewhere"), None);
        assert_eq!(ws.resolve("example.com/outer/missing"), None);
    }

    #[test]
    fn test_resolve_requires_segment_boundary() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "go.mod", "module example.com/mod\n");
        write(root, "pkg/a.go", "package pkg\n");

        let ws = Workspace::discover(root).unwrap();
        // "example.com/module" must not match module "example.com/mod".
        assert_eq!(ws.resolve("example.com/module"), None);
    }

    #[test]
    fn test_discover_skips_vendor_and_testdata() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "go.mod", "module example.com/mod\n");
        write(root, "vendor/dep/go.mod", "module dep\n");
        write(root, "pkg/testdata/go.mod", "module fixture\n");

        let ws = Workspace::discover(root).unwrap();
        assert_eq!(ws.modules().len(), 1);
        assert_eq!(ws.modules()[0].path, "example.com/mod");
    }

    #[test]
    fn test_discover_errors_without_modules() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            Workspace::discover(tmp.path()),
            Err(EngineError::NoModules(_))
        ));
        assert!(matches!(
            Workspace::discover(&tmp.path().join("missing")),
            Err(EngineError::RootNotFound(_))
        ));
    }

    #[test]
    fn test_package_files_filters_constraints() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "go.mod", "module example.com/mod\n");
        write(root, "pkg/a.go", "package pkg\n");
        write(root, "pkg/a_test.go", "package pkg\n");
        write(root, "pkg/tagged.go", "//go:build never\n\npackage pkg\n");
        write(root, "pkg/notes.txt", "not go\n");

        let ws = Workspace::discover(root).unwrap();
        let dir = ws.resolve("example.com/mod/pkg").unwrap();
        let files = ws
            .package_files(&dir, &TagSet::with_host_platform(&[]))
            .unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.go", "a_test.go"]);
    }
}
