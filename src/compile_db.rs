//! Compilation database (`compile_commands.json`)
//!
//! Several databases can be merged into one; only C and C++ translation units
//! are kept. Lookups answer whether a file or package directory is part of the
//! build, which is what lets the scanner tell a deleted file from one that was
//! never built.

use crate::classifier::{categorise_path, is_cpp_extension};
use crate::paths::{dotted_extension, weakly_canonical};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilationDatabaseErrorKind {
    ErrorLoadingFromFile,
    CompileCommandsContainsNoCommands,
    CompileCommandsContainsNoFiles,
}

impl CompilationDatabaseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ErrorLoadingFromFile => "error loading compilation database",
            Self::CompileCommandsContainsNoCommands => "compilation database contains no commands",
            Self::CompileCommandsContainsNoFiles => "compilation database contains no files",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationDatabaseError {
    pub kind: CompilationDatabaseErrorKind,
    pub message: String,
}

impl CompilationDatabaseError {
    fn new(kind: CompilationDatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompilationDatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind.as_str())
        } else {
            write!(f, "{}: {}", self.kind.as_str(), self.message)
        }
    }
}

impl std::error::Error for CompilationDatabaseError {}

#[derive(Debug, Deserialize)]
struct RawCompileCommand {
    directory: String,
    file: String,
    command: Option<String>,
    arguments: Option<Vec<String>>,
    output: Option<String>,
}

/// One entry of a compilation database, with paths resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
    pub directory: PathBuf,
    pub filename: PathBuf,
    pub arguments: Vec<String>,
    pub output: Option<String>,
}

impl CompileCommand {
    /// `-I` directories of this command, relative ones resolved against the
    /// directory of the file.
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        let base = self.filename.parent().unwrap_or_else(|| Path::new(""));
        let mut dirs: Vec<PathBuf> = Vec::new();
        let mut args = self.arguments.iter();
        while let Some(arg) = args.next() {
            let dir = if arg == "-I" {
                match args.next() {
                    Some(next) => next.as_str(),
                    None => break,
                }
            } else if let Some(rest) = arg.strip_prefix("-I") {
                rest
            } else {
                continue;
            };

            let dir = Path::new(dir);
            let dir = if dir.is_relative() { base.join(dir) } else { dir.to_path_buf() };
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }
}

/// Split a shell command line, honouring quotes and backslash escapes.
pub fn split_command_line(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_arg = true;
            }
            (Some(_), c) => current.push(c),
            (None, '"') | (None, '\'') => {
                quote = Some(c);
                in_arg = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}

/// Merged compilation databases.
#[derive(Debug, Clone, Default)]
pub struct CompilationDatabase {
    commands: Vec<CompileCommand>,
    files: Vec<PathBuf>,
    /// Extension-less paths of every file
    components: HashSet<PathBuf>,
    /// Parent and grandparent directory of every file
    packages: HashSet<PathBuf>,
}

impl CompilationDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a single `compile_commands.json`.
    pub fn from_file(path: &Path) -> Result<Self, CompilationDatabaseError> {
        let mut db = Self::new();
        db.add_compilation_database(path)?;
        Ok(db)
    }

    /// Merge the database at `path` into this one.
    pub fn add_compilation_database(&mut self, path: &Path) -> Result<(), CompilationDatabaseError> {
        use CompilationDatabaseErrorKind::*;

        let contents = std::fs::read_to_string(path)
            .map_err(|e| CompilationDatabaseError::new(ErrorLoadingFromFile, format!("{}: {}", path.display(), e)))?;
        let raw: Vec<RawCompileCommand> = serde_json::from_str(&contents)
            .map_err(|e| CompilationDatabaseError::new(ErrorLoadingFromFile, format!("{}: {}", path.display(), e)))?;

        if raw.is_empty() {
            return Err(CompilationDatabaseError::new(CompileCommandsContainsNoFiles, ""));
        }

        let build_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let commands: Vec<CompileCommand> = raw
            .into_iter()
            .filter_map(|raw| {
                let arguments = match (raw.arguments, raw.command) {
                    (Some(args), _) if !args.is_empty() => args,
                    (_, Some(command)) => split_command_line(&command),
                    _ => Vec::new(),
                };
                if arguments.is_empty() {
                    return None;
                }

                let mut directory = PathBuf::from(raw.directory);
                if directory.is_relative() {
                    directory = build_dir.join(directory);
                }
                Some(CompileCommand {
                    filename: directory.join(raw.file),
                    directory,
                    arguments,
                    output: raw.output,
                })
            })
            .collect();

        if commands.is_empty() {
            return Err(CompilationDatabaseError::new(CompileCommandsContainsNoCommands, ""));
        }

        let before = self.commands.len();
        self.add_commands(commands);
        tracing::info!(
            "Loaded {} compile commands from {}",
            self.commands.len() - before,
            path.display()
        );
        Ok(())
    }

    /// Add already resolved commands. Files that are not C or C++ are dropped.
    pub fn add_commands(&mut self, commands: Vec<CompileCommand>) {
        for mut cmd in commands {
            let ext = dotted_extension(&cmd.filename);
            if !is_cpp_extension(&ext) {
                tracing::debug!("Skipping non C++ entry {}", cmd.filename.display());
                continue;
            }

            let path = weakly_canonical(&cmd.filename);
            cmd.filename = path.clone();
            if !self.files.contains(&path) {
                self.index_path(&path);
                self.files.push(path);
            }
            self.commands.push(cmd);
        }
    }

    fn index_path(&mut self, path: &Path) {
        self.components.insert(path.with_extension(""));
        if let Some(pkg) = path.parent() {
            self.packages.insert(pkg.to_path_buf());
            if let Some(grp) = pkg.parent() {
                self.packages.insert(grp.to_path_buf());
            }
        }
    }

    /// Keep only the files for which `keep` holds.
    pub fn retain_files(&mut self, mut keep: impl FnMut(&Path) -> bool) {
        self.commands.retain(|c| keep(&c.filename));
        self.files = self.commands.iter().map(|c| c.filename.clone()).collect();
        self.files.dedup();
        self.components.clear();
        self.packages.clear();
        let files = std::mem::take(&mut self.files);
        for file in &files {
            self.index_path(file);
        }
        self.files = files;
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn commands(&self) -> &[CompileCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn compile_command(&self, file: &Path) -> Option<&CompileCommand> {
        self.commands.iter().find(|c| c.filename == file)
    }

    /// Whether the component of `path` (an absolute path) is built.
    ///
    /// Only the extension-less path is compared, so a header counts as
    /// contained when its source file is in the database.
    pub fn contains_file(&self, path: &Path) -> bool {
        if !categorise_path(path).is_cpp() {
            return false;
        }
        let path = weakly_canonical(path);
        self.components.contains(&path.with_extension(""))
    }

    /// Whether `path` (absolute) is the package or package group directory of
    /// some built file.
    pub fn contains_package(&self, path: &Path) -> bool {
        self.packages.contains(&weakly_canonical(path))
    }

    /// Longest common directory of all files.
    pub fn common_parent(&self) -> PathBuf {
        crate::paths::common_parent(&self.files)
    }
}
