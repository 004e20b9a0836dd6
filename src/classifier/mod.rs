//! Physical design classifier
//!
//! Maps a source file path onto the package group, package and component it
//! belongs to. Semantic packing rules are consulted first; after them come the
//! non-Lakosian directories, third-party mappings and finally the naming
//! conventions of Lakosian code (`grp/grppkg/grppkg_comp.h`,
//! `pkg/xx_pkg_comp.h`).

mod rules;

pub use rules::{
    load_semantic_rules, load_semantic_rules_from, semantic_rule_search_paths, MappingRule,
    RuleMapping,
};

use crate::config::ThirdPartyMapping;
use crate::kinds::FileType;
use crate::paths::{
    dotted_extension, file_name_string, file_stem_string, generic_string, path_starts_with,
};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Group used for everything that does not follow Lakosian naming.
pub const NON_LAKOSIAN_GROUP_NAME: &str = "non-lakosian group";

/// Placeholder for the source prefix inside stored disk paths.
pub const SOURCE_DIR_VAR: &str = "${SOURCE_DIR}";

const HEADER_EXTENSIONS: &[&str] = &[".h", ".hh", ".h++", ".hpp", ".H"];
const SOURCE_EXTENSIONS: &[&str] = &[".cpp", ".c", ".C", ".c++", ".cc", ".cxx", ".t.cpp", ".moc"];
const OTHER_EXTENSIONS: &[&str] = &[".dep", ".mem", ".o", ".swp", ".md", ".txt", ""];

/// Extensions tried when looking for the header of a source file.
pub const HEADER_CANDIDATE_EXTENSIONS: &[&str] = &[".h", ".hh", ".h++", ".hpp"];

/// Request from a semantic rule to register a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPackage {
    pub qualified_name: String,
    pub parent: Option<String>,
    pub repository: Option<String>,
    pub disk_path: Option<String>,
}

impl AddPackage {
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            parent: None,
            repository: None,
            disk_path: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }
}

/// A pluggable packing rule, consulted before the built-in conventions.
pub trait SemanticRule: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Whether this rule claims `path` (absolute, `/` separated)
    fn accept(&self, path: &str) -> bool;

    /// Register the packages of `path` through `add_package` and return the
    /// qualified name of the package the file belongs to.
    fn process(&self, path: &str, add_package: &mut dyn FnMut(AddPackage)) -> String;
}

/// A package the store must contain for a claim to hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageEntry {
    pub qualified_name: String,
    pub name: String,
    pub disk_path: String,
    pub parent: Option<String>,
    pub repository: Option<String>,
}

/// Outcome of classifying one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageClaim {
    /// Qualified name of the package the file belongs to
    pub package: String,
    /// Packages to create, parents before children
    pub packages: Vec<PackageEntry>,
    /// Repositories to create (with an empty disk path)
    pub repositories: Vec<String>,
    pub component_qualified_name: String,
    pub component_name: String,
}

impl PackageClaim {
    fn push_package(&mut self, entry: PackageEntry) {
        if !self
            .packages
            .iter()
            .any(|p| p.qualified_name == entry.qualified_name)
        {
            self.packages.push(entry);
        }
    }

    fn push_repository(&mut self, name: &str) {
        if !self.repositories.iter().any(|r| r == name) {
            self.repositories.push(name.to_string());
        }
    }
}

/// Classify a path by its extension.
pub fn categorise_path(path: &Path) -> FileType {
    let ext = dotted_extension(path);
    if HEADER_EXTENSIONS.contains(&ext.as_str()) {
        FileType::Header
    } else if SOURCE_EXTENSIONS.contains(&ext.as_str()) {
        FileType::Source
    } else if OTHER_EXTENSIONS.contains(&ext.as_str()) {
        FileType::UnknownUnknown
    } else {
        FileType::KnownUnknown
    }
}

/// Whether `ext` (with its leading dot) is a C or C++ extension.
pub fn is_cpp_extension(ext: &str) -> bool {
    HEADER_EXTENSIONS.contains(&ext) || SOURCE_EXTENSIONS.contains(&ext)
}

fn standalone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/([a-zA-Z]{1,2})_([a-zA-Z0-9_]+)\.").expect("static regex"))
}

/// `grp/grppkg/grppkg_comp.cpp`, allowing a `+` suffix on the package directory.
pub fn is_component_on_package_group(component_path: &Path) -> bool {
    let component = file_name_string(component_path);
    let Some(pkg_dir) = component_path.parent() else {
        return false;
    };
    let pkg = file_name_string(pkg_dir);
    let group = pkg_dir.parent().map(file_name_string).unwrap_or_default();
    if group.chars().count() != 3 {
        return false;
    }

    if component.starts_with(&format!("{pkg}_")) && pkg.starts_with(&group) {
        return true;
    }

    let special: Vec<&str> = pkg.split('+').collect();
    if let [base, _] = special.as_slice() {
        if component.starts_with(&format!("{base}_")) && base.starts_with(&group) {
            return true;
        }
    }

    false
}

/// `<prefix>_<pkg>_<comp>` inside a directory named `<prefix>_<pkg>` or `<pkg>`.
pub fn is_component_on_standalone_package(component_path: &Path) -> bool {
    if !standalone_regex().is_match(&generic_string(component_path)) {
        return false;
    }

    let component = file_name_string(component_path);
    let parent = component_path
        .parent()
        .map(file_name_string)
        .unwrap_or_default();
    if component.starts_with(&parent) {
        return true;
    }

    let parts: Vec<&str> = component.split('_').collect();
    parts.len() >= 3 && parts[1] == parent
}

/// Maps relative file paths onto packages and components.
pub struct Classifier {
    prefix: PathBuf,
    non_lakosian_dirs: Vec<PathBuf>,
    third_party: Vec<(Regex, String)>,
    rules: Vec<Box<dyn SemanticRule>>,
}

impl Classifier {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            non_lakosian_dirs: Vec::new(),
            third_party: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_non_lakosian_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.non_lakosian_dirs = dirs;
        self
    }

    pub fn with_third_party(mut self, mappings: &[ThirdPartyMapping]) -> crate::Result<Self> {
        for mapping in mappings {
            let regex = Regex::new(&mapping.pattern)
                .map_err(|e| crate::Error::Parse(format!("{}: {}", mapping.pattern, e)))?;
            self.third_party.push((regex, mapping.group.clone()));
        }
        Ok(self)
    }

    pub fn with_rules(mut self, rules: Vec<Box<dyn SemanticRule>>) -> Self {
        self.rules = rules;
        self
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Classify `path`, already relative to the source prefix.
    ///
    /// Returns `None` for the empty path.
    pub fn classify(&self, path: &Path) -> Option<PackageClaim> {
        if path.as_os_str().is_empty() {
            return None;
        }

        let mut claim = PackageClaim {
            package: String::new(),
            packages: Vec::new(),
            repositories: Vec::new(),
            component_qualified_name: String::new(),
            component_name: file_stem_string(path),
        };

        let full_path = generic_string(&self.prefix.join(path));
        if let Some(rule) = self.rules.iter().find(|r| r.accept(&full_path)) {
            tracing::debug!("Semantic rule {} claims {}", rule.name(), full_path);
            let mut requested = Vec::new();
            let package = rule.process(&full_path, &mut |add| requested.push(add));
            for add in requested {
                self.register_rule_package(&mut claim, add);
            }
            if !claim.packages.iter().any(|p| p.qualified_name == package) {
                self.register_rule_package(&mut claim, AddPackage::new(package.clone()));
            }
            claim.package = package;
        } else {
            self.classify_by_convention(path, &mut claim);
        }

        claim.component_qualified_name = component_qualified_name(path, &claim.package);
        Some(claim)
    }

    fn register_rule_package(&self, claim: &mut PackageClaim, add: AddPackage) {
        if let Some(repo) = &add.repository {
            claim.push_repository(repo);
        }
        if let Some(parent) = &add.parent {
            claim.push_package(PackageEntry {
                qualified_name: parent.clone(),
                name: parent.clone(),
                disk_path: String::new(),
                parent: None,
                repository: add.repository.clone(),
            });
        }
        claim.push_package(PackageEntry {
            name: add.qualified_name.clone(),
            qualified_name: add.qualified_name,
            disk_path: add.disk_path.unwrap_or_default(),
            parent: add.parent,
            repository: add.repository,
        });
    }

    fn classify_by_convention(&self, path: &Path, claim: &mut PackageClaim) {
        let pkg_path = path.parent().unwrap_or_else(|| Path::new(""));
        let full_pkg_path = self.prefix.join(pkg_path);
        let dir_name = file_name_string(pkg_path);

        let non_lakosian = self
            .non_lakosian_dirs
            .iter()
            .any(|dir| path_starts_with(dir, &full_pkg_path));

        let mut disk_path = generic_string(&full_pkg_path);
        let relative = generic_string(path);
        let mapped = self
            .third_party
            .iter()
            .find(|(regex, _)| regex.is_match(&relative))
            .map(|(_, group)| group.clone());

        let mut standalone = false;
        let (group_qname, group_name) = if let Some(group) = mapped {
            (group.clone(), group)
        } else if non_lakosian {
            (NON_LAKOSIAN_GROUP_NAME.to_string(), NON_LAKOSIAN_GROUP_NAME.to_string())
        } else if is_component_on_standalone_package(path) {
            standalone = true;
            disk_path = self.with_source_dir_var(&disk_path);
            (format!("standalones/{dir_name}"), dir_name.clone())
        } else if is_component_on_package_group(path) {
            disk_path = self.with_source_dir_var(&disk_path);
            let group = pkg_path.parent().map(file_name_string).unwrap_or_default();
            (format!("groups/{group}"), group)
        } else {
            (NON_LAKOSIAN_GROUP_NAME.to_string(), NON_LAKOSIAN_GROUP_NAME.to_string())
        };

        claim.push_package(PackageEntry {
            qualified_name: group_qname.clone(),
            name: group_name,
            disk_path: disk_path.clone(),
            parent: None,
            repository: None,
        });

        if standalone || dir_name.is_empty() {
            claim.package = group_qname;
            return;
        }

        let package = format!("{group_qname}/{dir_name}");
        claim.push_package(PackageEntry {
            qualified_name: package.clone(),
            name: dir_name,
            disk_path,
            parent: Some(group_qname),
            repository: None,
        });
        claim.package = package;
    }

    fn with_source_dir_var(&self, disk_path: &str) -> String {
        let prefix = generic_string(&self.prefix);
        match disk_path.strip_prefix(prefix.trim_end_matches('/')) {
            Some(rest) if !prefix.is_empty() => {
                format!("{}/{}", SOURCE_DIR_VAR, rest.trim_start_matches('/'))
            }
            _ => disk_path.to_string(),
        }
    }
}

/// Qualified name of the component `path` belongs to inside `package`.
pub fn component_qualified_name(path: &Path, package: &str) -> String {
    let stem = file_stem_string(path);
    if package.contains("standalones/") || package.contains("groups/") {
        return format!("{package}/{stem}");
    }
    let parent = path.parent().map(generic_string).unwrap_or_default();
    if parent.is_empty() {
        stem
    } else {
        format!("{parent}/{stem}")
    }
}
