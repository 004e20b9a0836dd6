//! Declarative semantic packing rules loaded from `*.toml` files.

use super::{AddPackage, SemanticRule};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RuleMapping {
    /// Directory name that marks a path as belonging to `package`
    pub path: String,
    pub package: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RuleFile {
    repository: Option<String>,
    #[serde(default)]
    case_insensitive: bool,
    nested_after: Option<String>,
    #[serde(default)]
    mapping: Vec<RuleMapping>,
}

/// Maps directory names onto top-level packages, optionally turning the
/// directories below a marker into nested packages.
///
/// ```toml
/// repository = "KF5"
/// case_insensitive = true
/// nested_after = "src"
///
/// [[mapping]]
/// path = "KCoreAddons"
/// package = "KCoreAddons"
/// ```
#[derive(Debug, Clone)]
pub struct MappingRule {
    name: String,
    rule: RuleFile,
}

impl MappingRule {
    pub fn from_toml(name: impl Into<String>, contents: &str) -> crate::Result<Self> {
        let name = name.into();
        let rule: RuleFile =
            toml::from_str(contents).map_err(|e| crate::Error::InvalidRule(name.clone(), e.to_string()))?;
        if rule.mapping.is_empty() {
            return Err(crate::Error::InvalidRule(name, "no [[mapping]] entries".into()));
        }
        Ok(Self { name, rule })
    }

    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(path.display().to_string(), &contents)
    }

    pub fn mappings(&self) -> &[RuleMapping] {
        &self.rule.mapping
    }

    fn fold(&self, s: &str) -> String {
        if self.rule.case_insensitive {
            s.to_lowercase()
        } else {
            s.to_string()
        }
    }

    fn top_level_package(&self, path: &str) -> Option<&RuleMapping> {
        let path = self.fold(path);
        self.rule
            .mapping
            .iter()
            .find(|m| path.contains(&self.fold(&format!("/{}/", m.path))))
    }
}

impl SemanticRule for MappingRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&self, path: &str) -> bool {
        self.top_level_package(path).is_some()
    }

    fn process(&self, path: &str, add_package: &mut dyn FnMut(AddPackage)) -> String {
        let Some(top) = self.top_level_package(path) else {
            return "Unknown".to_string();
        };

        let mut package = top.package.clone();
        let mut add = AddPackage::new(package.clone());
        if let Some(repo) = &self.rule.repository {
            add = add.with_repository(repo.clone());
        }
        add_package(add);

        let Some(marker) = &self.rule.nested_after else {
            return package;
        };
        let folded = self.fold(path);
        let needle = self.fold(&format!("/{marker}/"));
        let Some(pos) = folded.rfind(&needle) else {
            return package;
        };

        // Directories between the marker and the file name
        let rest = &folded[pos + needle.len()..];
        let mut dirs: Vec<&str> = rest.split('/').collect();
        dirs.pop();
        for dir in dirs.into_iter().filter(|d| !d.is_empty()) {
            let inner = format!("{package}/{dir}");
            add_package(AddPackage::new(inner.clone()).with_parent(package.clone()));
            package = inner;
        }
        package
    }
}

/// Directories searched for rule files, in order.
pub fn semantic_rule_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(env) = std::env::var("SEMRULES_PATH") {
        if !env.is_empty() {
            paths.push(PathBuf::from(env));
        }
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        paths.push(exe_dir.join("semrules"));
    }
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join("semrules"));
    }
    paths
}

/// Load every rule found in the default search paths.
pub fn load_semantic_rules() -> crate::Result<Vec<Box<dyn SemanticRule>>> {
    load_semantic_rules_from(&semantic_rule_search_paths())
}

/// Load `*.toml` rules from `dirs`, ordered by full path.
pub fn load_semantic_rules_from(dirs: &[PathBuf]) -> crate::Result<Vec<Box<dyn SemanticRule>>> {
    let mut files = Vec::new();
    for dir in dirs.iter().filter(|d| d.is_dir()) {
        let pattern = format!("{}/*.toml", glob::Pattern::escape(&dir.to_string_lossy()));
        let entries = glob::glob(&pattern)
            .map_err(|e| crate::Error::InvalidRule(pattern.clone(), e.to_string()))?;
        files.extend(entries.filter_map(|e| e.ok()));
    }
    files.sort();

    let mut rules: Vec<Box<dyn SemanticRule>> = Vec::with_capacity(files.len());
    for file in files {
        tracing::debug!("Loading semantic rule {}", file.display());
        rules.push(Box::new(MappingRule::from_file(&file)?));
    }
    Ok(rules)
}
