//! Allowed dependencies declared in `.dep` files
//!
//! Layout under the source root:
//!
//! ```text
//! groups/<grp>/group/<grp>.dep            group level
//! groups/<grp>/<pkg>/package/<pkg>.dep    package level
//! standalones/<pkg>/package/<pkg>.dep     standalone package
//! ```
//!
//! Each file may have a `.t.dep` sibling for test-only dependencies. Every
//! line names one provider.

use super::{ErrorAddPhysicalDependency, ErrorLoadAllowedDependencies, NodeStorage, UniqueId};
use crate::kinds::{DiagramType, PhysicalDependencyType};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read every `.dep` file under `source_dir` into allowed dependencies.
/// Files that do not exist are skipped.
pub fn load_allowed_dependencies(ns: &mut NodeStorage, source_dir: &Path) -> Result<(), ErrorLoadAllowedDependencies> {
    let mut top_level = Vec::new();
    for uid in ns.get_top_level_packages()? {
        match uid.kind {
            DiagramType::Repository => top_level.extend(ns.children(uid)?),
            _ => top_level.push(uid),
        }
    }

    let mut loaded = 0;
    for package in top_level {
        let Some(name) = ns.find_by_id(package)?.map(|n| n.name().to_string()) else {
            continue;
        };

        if ns.is_package_group(package)? {
            let prefix = source_dir.join("groups").join(&name);
            for file in dep_files(&prefix.join("group"), &name) {
                loaded += read_dep_file(ns, &file, package)?;
            }
            for child in ns.children(package)? {
                let Some(child_name) = ns.find_by_id(child)?.map(|n| n.name().to_string()) else {
                    continue;
                };
                for file in dep_files(&prefix.join(&child_name).join("package"), &child_name) {
                    loaded += read_dep_file(ns, &file, child)?;
                }
            }
        } else {
            let dir = source_dir.join("standalones").join(&name).join("package");
            for file in dep_files(&dir, &name) {
                loaded += read_dep_file(ns, &file, package)?;
            }
        }
    }

    info!(loaded, source_dir = %source_dir.display(), "Loaded allowed dependencies");
    Ok(())
}

fn dep_files(dir: &Path, name: &str) -> [PathBuf; 2] {
    [dir.join(format!("{name}.dep")), dir.join(format!("{name}.t.dep"))]
}

/// Returns the number of dependencies added.
fn read_dep_file(ns: &mut NodeStorage, path: &Path, source: UniqueId) -> Result<usize, ErrorLoadAllowedDependencies> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(ErrorLoadAllowedDependencies::AllowedDependencyFileCouldNotBeOpen {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    debug!(path = %path.display(), "Reading dep file");

    let parent_name = match ns.parent(source)? {
        Some(parent) => ns.find_by_id(parent)?.map(|n| n.qualified_name().to_string()),
        None => None,
    };

    let mut added = 0;
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(target) = resolve_target(ns, parent_name.as_deref(), line)? else {
            debug!(name = line, path = %path.display(), "Skipping unknown allowed dependency");
            continue;
        };

        match ns.add_physical_dependency(source, target, PhysicalDependencyType::Allowed) {
            Ok(()) => added += 1,
            Err(ErrorAddPhysicalDependency::SelfRelation | ErrorAddPhysicalDependency::DependencyAlreadyExists) => {}
            Err(ErrorAddPhysicalDependency::Storage(e)) => return Err(e.into()),
            Err(reason) => {
                let name_of = |ns: &mut NodeStorage, uid: UniqueId| -> crate::Result<String> {
                    Ok(ns
                        .find_by_id(uid)?
                        .map(|n| n.qualified_name().to_string())
                        .unwrap_or_default())
                };
                return Err(ErrorLoadAllowedDependencies::UnexpectedErrorAddingPhysicalDependency {
                    source_name: name_of(ns, source)?,
                    target_name: name_of(ns, target)?,
                    reason,
                });
            }
        }
    }
    Ok(added)
}

/// Packages inside a group name their siblings. Groups and standalone
/// packages name other groups or standalone packages.
fn resolve_target(ns: &mut NodeStorage, parent_name: Option<&str>, line: &str) -> crate::Result<Option<UniqueId>> {
    let candidates = match parent_name {
        Some(parent) => vec![format!("{parent}/{line}")],
        None => vec![format!("groups/{line}"), format!("standalones/{line}")],
    };
    for qualified_name in candidates {
        if let Some(node) = ns.find_by_qualified_name_any(&qualified_name)? {
            return Ok(Some(node.uid()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_allowed_dependencies() {
        let db_dir = tempfile::tempdir().unwrap();
        let mut ns = NodeStorage::open(&db_dir.path().join("codedb.db")).unwrap();
        let grp = ns.add_package("grp", "groups/grp", None, None).unwrap();
        let pkg = ns.add_package("pkg", "groups/grp/pkg", Some(grp), None).unwrap();
        ns.add_component("component", "groups/pkg/component", Some(pkg)).unwrap();
        let pkb = ns.add_package("pkb", "groups/grp/pkb", Some(grp), None).unwrap();
        ns.add_component("component2", "groups/pkg/component2", Some(pkb)).unwrap();

        let src = tempfile::tempdir().unwrap();
        write(src.path(), "groups/grp/pkg/package/pkg.dep", "pkb");
        assert!(!ns.has_allowed_dependency(pkg, pkb).unwrap());

        load_allowed_dependencies(&mut ns, src.path()).unwrap();
        assert!(ns.has_allowed_dependency(pkg, pkb).unwrap());
        assert!(!ns.has_concrete_dependency(pkg, pkb).unwrap());

        // loading twice is harmless
        load_allowed_dependencies(&mut ns, src.path()).unwrap();
    }

    #[test]
    fn test_load_allowed_dependencies_between_groups() {
        let db_dir = tempfile::tempdir().unwrap();
        let mut ns = NodeStorage::open(&db_dir.path().join("codedb.db")).unwrap();
        let grpa = ns.add_package("grpa", "groups/grpa", None, None).unwrap();
        let pkga = ns.add_package("pkga", "groups/grpa/pkga", Some(grpa), None).unwrap();
        ns.add_component("component", "groups/grpa/pkga/component", Some(pkga))
            .unwrap();
        let grpb = ns.add_package("grpb", "groups/grpb", None, None).unwrap();
        let pkgb = ns.add_package("pkgb", "groups/grpb/pkgb", Some(grpb), None).unwrap();
        ns.add_component("component", "groups/grpb/pkgb/component", Some(pkgb))
            .unwrap();
        let pkgstd = ns.add_package("pkgstd", "standalones/pkgstd", None, None).unwrap();
        ns.add_component("component", "standalones/pkgstd/component", Some(pkgstd))
            .unwrap();

        let src = tempfile::tempdir().unwrap();
        write(src.path(), "groups/grpa/group/grpa.dep", "grpb\npkgstd");
        write(src.path(), "standalones/pkgstd/package/pkgstd.t.dep", "# test only\n\npkgstd\nunknown\n");
        assert!(!ns.has_allowed_dependency(grpa, grpb).unwrap());
        assert!(!ns.has_allowed_dependency(grpa, pkgstd).unwrap());

        load_allowed_dependencies(&mut ns, src.path()).unwrap();
        assert!(ns.has_allowed_dependency(grpa, grpb).unwrap());
        assert!(ns.has_allowed_dependency(grpa, pkgstd).unwrap());
        assert!(!ns.has_allowed_dependency(grpb, grpa).unwrap());
        assert!(!ns.has_allowed_dependency(pkgstd, pkgstd).unwrap());
    }
}
