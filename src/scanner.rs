//! Incremental filesystem scanner
//!
//! Gathers the files named by a compilation database, plus the header that goes
//! with each of them, and reconciles the object store with what is on disk:
//! - workers read and hash files in parallel, touching nothing shared but the
//!   progress channel
//! - the store is then updated under a single write lock, new packages and
//!   files are created, changed hashes recorded and vanished files removed
//!   with the cascading removal

use crate::classifier::{categorise_path, Classifier, PackageClaim, PackageEntry, HEADER_CANDIDATE_EXTENSIONS};
use crate::compile_db::CompilationDatabase;
use crate::ignore::IgnoreFilter;
use crate::kinds::{ErrorKind, FileType};
use crate::paths::{file_name_string, file_stem_string, generic_string, normalise_path, weakly_canonical};
use crate::store::{EntityRef, FileId, ObjectStore, PackageId, StoreData};
use crate::ui::{ProgressMessage, ProgressPhase};
use crate::{Error, Result};
use crossbeam::channel::{bounded, unbounded, Sender};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Difference between the store and the source tree, every list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IncrementalResult {
    pub new_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub deleted_files: Vec<String>,
    pub new_packages: Vec<String>,
    pub deleted_packages: Vec<String>,
}

impl IncrementalResult {
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty()
            && self.modified_files.is_empty()
            && self.deleted_files.is_empty()
            && self.new_packages.is_empty()
            && self.deleted_packages.is_empty()
    }

    fn finish(&mut self) {
        for list in [
            &mut self.new_files,
            &mut self.modified_files,
            &mut self.deleted_files,
            &mut self.new_packages,
            &mut self.deleted_packages,
        ] {
            list.sort();
            list.dedup();
        }
    }
}

/// A file found on disk by a worker.
#[derive(Debug, Clone)]
struct FoundFile {
    /// Path relative to the source prefix
    qualified_name: String,
    claim: PackageClaim,
    file_type: FileType,
    hash: String,
}

pub struct FilesystemScanner<'a> {
    store: &'a ObjectStore,
    prefix: PathBuf,
    compile_db: &'a CompilationDatabase,
    classifier: &'a Classifier,
    ignore: &'a IgnoreFilter,
    threads: usize,
    progress: Option<Sender<ProgressMessage>>,
}

impl<'a> FilesystemScanner<'a> {
    pub fn new(
        store: &'a ObjectStore,
        prefix: impl AsRef<Path>,
        compile_db: &'a CompilationDatabase,
        classifier: &'a Classifier,
        ignore: &'a IgnoreFilter,
    ) -> Self {
        Self {
            store,
            prefix: weakly_canonical(prefix.as_ref()),
            compile_db,
            classifier,
            ignore,
            threads: 1,
            progress: None,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_progress(mut self, progress: Sender<ProgressMessage>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Scan every file of the compilation database and update the store.
    pub fn scan_compilation_db(&self) -> Result<IncrementalResult> {
        let found = self.gather()?;

        self.send(ProgressMessage::Started {
            phase: ProgressPhase::Storing,
            total: found.len(),
        });
        let result = self.add_to_store(found);
        self.send(ProgressMessage::Finished {
            phase: ProgressPhase::Storing,
        });

        for file in &result.new_files {
            self.send(ProgressMessage::FileNew(file.clone()));
        }
        for file in &result.modified_files {
            self.send(ProgressMessage::FileModified(file.clone()));
        }
        for file in &result.deleted_files {
            self.send(ProgressMessage::FileDeleted(file.clone()));
        }

        info!(
            "Scan complete: {} new, {} modified, {} deleted files; {} new, {} deleted packages",
            result.new_files.len(),
            result.modified_files.len(),
            result.deleted_files.len(),
            result.new_packages.len(),
            result.deleted_packages.len()
        );
        Ok(result)
    }

    fn send(&self, msg: ProgressMessage) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(msg);
        }
    }

    // ========== Gathering ==========

    fn gather(&self) -> Result<Vec<FoundFile>> {
        let sources = self.compile_db.files();
        let workers = self.threads.min(sources.len()).max(1);
        self.send(ProgressMessage::Started {
            phase: ProgressPhase::Scanning,
            total: sources.len(),
        });

        let (path_tx, path_rx) = bounded::<&Path>(workers * 4);
        let (found_tx, found_rx) = unbounded::<FoundFile>();

        let found = crossbeam::scope(|s| {
            for _ in 0..workers {
                let rx = path_rx.clone();
                let tx = found_tx.clone();
                s.spawn(move |_| {
                    for source in rx {
                        for found in self.scan_source(source) {
                            if tx.send(found).is_err() {
                                return;
                            }
                        }
                        self.send(ProgressMessage::Progress {
                            phase: ProgressPhase::Scanning,
                            file: Some(generic_string(&normalise_path(source, &self.prefix))),
                        });
                    }
                });
            }
            drop(path_rx);
            drop(found_tx);

            for source in sources {
                if path_tx.send(source.as_path()).is_err() {
                    break;
                }
            }
            drop(path_tx);

            found_rx.iter().collect::<Vec<_>>()
        })
        .map_err(|_| Error::Scan("a scan worker panicked".to_string()))?;

        self.send(ProgressMessage::Finished {
            phase: ProgressPhase::Scanning,
        });
        debug!("Gathered {} files from {} sources", found.len(), sources.len());
        Ok(found)
    }

    /// The source file itself and its header, when either exists.
    fn scan_source(&self, source: &Path) -> Vec<FoundFile> {
        let mut found = Vec::with_capacity(2);
        found.extend(self.scan_path(source));
        if let Some(header) = self.find_header(source) {
            found.extend(self.scan_path(&header));
        }
        found
    }

    /// Headers are not in the compilation database. Look for one with the same
    /// stem next to the source, then in the `-I` directories of its command.
    fn find_header(&self, source: &Path) -> Option<PathBuf> {
        let parent = weakly_canonical(source.parent()?);
        let stem = file_stem_string(source);

        let mut dirs = vec![parent];
        if let Some(cmd) = self.compile_db.compile_command(source) {
            for dir in cmd.include_dirs() {
                if !dir.is_dir() {
                    continue;
                }
                let dir = std::fs::canonicalize(&dir).unwrap_or(dir);
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }

        dirs.iter()
            .flat_map(|dir| {
                HEADER_CANDIDATE_EXTENSIONS
                    .iter()
                    .map(|ext| dir.join(format!("{stem}{ext}")))
                    .collect::<Vec<_>>()
            })
            .find(|candidate| candidate.is_file())
    }

    fn scan_path(&self, path: &Path) -> Option<FoundFile> {
        if !path.is_file() {
            return None;
        }
        if self.ignore.is_ignored(path) {
            debug!("Ignoring {}", path.display());
            return None;
        }

        let relative = normalise_path(path, &self.prefix);
        let claim = self.classifier.classify(&relative)?;
        let hash = match std::fs::read(path) {
            Ok(contents) => blake3::hash(&contents).to_string(),
            Err(e) => {
                warn!("Could not hash {}: {}", path.display(), e);
                String::new()
            }
        };

        Some(FoundFile {
            qualified_name: generic_string(&relative),
            file_type: categorise_path(&relative),
            claim,
            hash,
        })
    }

    // ========== Reconciliation ==========

    fn add_to_store(&self, mut found: Vec<FoundFile>) -> IncrementalResult {
        found.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));
        found.dedup_by(|a, b| a.qualified_name == b.qualified_name);

        let mut data = self.store.write();
        let mut out = IncrementalResult::default();

        // Snapshot before anything is added, to find what vanished
        let known_packages: Vec<(PackageId, String)> = data
            .packages
            .ids()
            .into_iter()
            .map(|id| (id, data.package_name(id)))
            .collect();
        let known_files: Vec<(FileId, String)> = data
            .files
            .ids()
            .into_iter()
            .filter_map(|id| data.files.read(id).map(|f| (id, f.qualified_name.clone())))
            .collect();

        let mut seen_packages = HashSet::new();
        let mut seen_files = HashSet::new();

        for file in &found {
            for repository in &file.claim.repositories {
                data.get_or_add_repository(repository, "");
            }
            for entry in &file.claim.packages {
                add_package(&mut data, entry, &mut seen_packages, &mut out);
            }
        }

        for file in found {
            add_file(&mut data, file, &mut seen_files, &mut out);
        }

        let mut visited = HashSet::new();
        for (id, qualified_name) in &known_files {
            if seen_files.contains(id) || !self.compile_db.contains_file(&self.prefix.join(qualified_name)) {
                continue;
            }
            debug!("File deleted: {}", qualified_name);
            out.deleted_files.extend(data.remove_file(*id, &mut visited));
        }
        for (id, qualified_name) in &known_packages {
            if seen_packages.contains(id) || !self.compile_db.contains_package(&self.prefix.join(qualified_name)) {
                continue;
            }
            debug!("Package deleted: {}", qualified_name);
            out.deleted_files.extend(data.remove_package(*id, &mut visited));
        }
        out.deleted_packages = known_packages
            .into_iter()
            .filter(|(id, _)| visited.contains(&EntityRef::Package(*id)))
            .map(|(_, qualified_name)| qualified_name)
            .collect();

        out.finish();
        out
    }
}

fn add_package(
    data: &mut StoreData,
    entry: &PackageEntry,
    seen: &mut HashSet<PackageId>,
    out: &mut IncrementalResult,
) -> PackageId {
    if let Some(id) = data.get_package(&entry.qualified_name) {
        seen.insert(id);
        return id;
    }

    // Claims list parents first
    let parent = entry.parent.as_deref().and_then(|p| data.get_package(p));
    let repository = entry
        .repository
        .as_deref()
        .map(|r| data.get_or_add_repository(r, ""));

    let id = data.get_or_add_package(
        &entry.qualified_name,
        &entry.name,
        &entry.disk_path,
        parent,
        repository,
    );
    debug!("New package {}", entry.qualified_name);
    seen.insert(id);
    out.new_packages.push(entry.qualified_name.clone());
    id
}

fn add_file(data: &mut StoreData, file: FoundFile, seen: &mut HashSet<FileId>, out: &mut IncrementalResult) {
    if let Some(id) = data.get_file(&file.qualified_name) {
        seen.insert(id);
        if let Some(existing) = data.files.get_mut(id) {
            if existing.hash != file.hash {
                debug!("Found modified file {}", file.qualified_name);
                existing.hash = file.hash;
                out.modified_files.push(file.qualified_name);
            }
        }
        return;
    }

    let is_header = match file.file_type {
        FileType::Header => true,
        FileType::Source => false,
        FileType::KnownUnknown => return,
        FileType::UnknownUnknown => {
            data.get_or_add_error(ErrorKind::ParserError, "", "Unknown file extension", &file.qualified_name);
            return;
        }
    };

    let package = data.get_package(&file.claim.package);
    let component = data.get_or_add_component(
        &file.claim.component_qualified_name,
        &file.claim.component_name,
        package,
    );
    let name = file_name_string(Path::new(&file.qualified_name));
    data.get_or_add_file(
        &file.qualified_name,
        &name,
        is_header,
        &file.hash,
        package,
        Some(component),
    );
    out.new_files.push(file.qualified_name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_db::CompileCommand;
    use tempfile::TempDir;

    const ONEPKG: &[(&str, &str)] = &[
        ("groups/one/onepkg/onepkg_foo.h", "struct Foo {};\n"),
        ("groups/one/onepkg/onepkg_foo.cpp", "#include <onepkg_foo.h>\n"),
        ("groups/one/onepkg/onepkg_bar.h", "struct Bar {};\n"),
        ("groups/one/onepkg/onepkg_bar.cpp", "#include <onepkg_bar.h>\n"),
    ];

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            let root = weakly_canonical(dir.path());
            let fixture = Self { _dir: dir, root };
            for (path, contents) in files {
                fixture.write(path, contents);
            }
            fixture
        }

        fn write(&self, path: &str, contents: &str) {
            let path = self.root.join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }

        fn remove(&self, path: &str) {
            std::fs::remove_file(self.root.join(path)).unwrap();
        }

        /// One command per `(source, flags)` pair, flags separated by spaces.
        fn compile_db(&self, sources: &[(&str, &str)]) -> CompilationDatabase {
            let mut db = CompilationDatabase::new();
            db.add_commands(
                sources
                    .iter()
                    .map(|(source, flags)| {
                        let mut arguments = vec!["c++".to_string()];
                        arguments.extend(flags.split_whitespace().map(str::to_string));
                        arguments.extend(["-c".to_string(), source.to_string()]);
                        CompileCommand {
                            directory: self.root.clone(),
                            filename: self.root.join(source),
                            arguments,
                            output: None,
                        }
                    })
                    .collect(),
            );
            db
        }

        fn scan_with(&self, store: &ObjectStore, db: &CompilationDatabase, ignore: &IgnoreFilter) -> IncrementalResult {
            let classifier = Classifier::new(&self.root);
            FilesystemScanner::new(store, &self.root, db, &classifier, ignore)
                .with_threads(2)
                .scan_compilation_db()
                .unwrap()
        }

        fn scan(&self, store: &ObjectStore, db: &CompilationDatabase) -> IncrementalResult {
            self.scan_with(store, db, &IgnoreFilter::empty())
        }
    }

    fn onepkg_db(fixture: &Fixture) -> CompilationDatabase {
        fixture.compile_db(&[
            ("groups/one/onepkg/onepkg_foo.cpp", ""),
            ("groups/one/onepkg/onepkg_bar.cpp", ""),
        ])
    }

    #[test]
    fn test_scan_builds_package_hierarchy() {
        let fixture = Fixture::new(ONEPKG);
        let db = onepkg_db(&fixture);
        let store = ObjectStore::new();

        let result = fixture.scan(&store, &db);
        assert_eq!(
            result.new_files,
            vec![
                "groups/one/onepkg/onepkg_bar.cpp",
                "groups/one/onepkg/onepkg_bar.h",
                "groups/one/onepkg/onepkg_foo.cpp",
                "groups/one/onepkg/onepkg_foo.h",
            ]
        );
        assert_eq!(result.new_packages, vec!["groups/one", "groups/one/onepkg"]);
        assert!(result.deleted_files.is_empty());

        store.with_read(|data| {
            let group = data.get_package("groups/one").unwrap();
            let pkg = data.get_package("groups/one/onepkg").unwrap();
            assert_eq!(data.packages.read(pkg).unwrap().parent, Some(group));
            assert_eq!(data.packages.read(group).unwrap().children, vec![pkg]);

            let comp = data.get_component("groups/one/onepkg/onepkg_foo").unwrap();
            let comp = data.components.read(comp).unwrap();
            assert_eq!(comp.package, Some(pkg));
            let mut files: Vec<String> = comp
                .files
                .iter()
                .map(|&f| data.files.read(f).unwrap().name.clone())
                .collect();
            files.sort();
            assert_eq!(files, vec!["onepkg_foo.cpp", "onepkg_foo.h"]);

            let header = data.get_file("groups/one/onepkg/onepkg_foo.h").unwrap();
            let header = data.files.read(header).unwrap();
            assert!(header.is_header);
            assert_eq!(header.hash, blake3::hash(b"struct Foo {};\n").to_string());
        });
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let fixture = Fixture::new(ONEPKG);
        let db = onepkg_db(&fixture);
        let store = ObjectStore::new();

        fixture.scan(&store, &db);
        let files = store.file_names();
        let packages = store.package_names();

        let again = fixture.scan(&store, &db);
        assert!(again.is_empty(), "unexpected changes: {again:?}");
        assert_eq!(store.file_names(), files);
        assert_eq!(store.package_names(), packages);
    }

    #[test]
    fn test_modified_hash_is_detected() {
        let fixture = Fixture::new(ONEPKG);
        let db = onepkg_db(&fixture);
        let store = ObjectStore::new();
        fixture.scan(&store, &db);

        fixture.write("groups/one/onepkg/onepkg_bar.cpp", "#include <onepkg_bar.h>\nint x;\n");
        let result = fixture.scan(&store, &db);
        assert_eq!(result.modified_files, vec!["groups/one/onepkg/onepkg_bar.cpp"]);
        assert!(result.new_files.is_empty());

        let id = store.get_file("groups/one/onepkg/onepkg_bar.cpp").unwrap();
        let hash = store.read().files.read(id).unwrap().hash.clone();
        assert_eq!(hash, blake3::hash(b"#include <onepkg_bar.h>\nint x;\n").to_string());

        assert!(fixture.scan(&store, &db).modified_files.is_empty());
    }

    #[test]
    fn test_component_survives_while_header_remains() {
        let fixture = Fixture::new(ONEPKG);
        let db = onepkg_db(&fixture);
        let store = ObjectStore::new();
        fixture.scan(&store, &db);

        fixture.remove("groups/one/onepkg/onepkg_foo.cpp");
        let result = fixture.scan(&store, &db);
        assert_eq!(result.deleted_files, vec!["groups/one/onepkg/onepkg_foo.cpp"]);
        assert!(result.deleted_packages.is_empty());

        store.with_read(|data| {
            let comp = data.get_component("groups/one/onepkg/onepkg_foo").unwrap();
            assert_eq!(data.components.read(comp).unwrap().files.len(), 1);
            assert!(data.get_file("groups/one/onepkg/onepkg_foo.h").is_some());
        });
    }

    #[test]
    fn test_deletion_cascades_to_package_and_group() {
        let mut files = ONEPKG.to_vec();
        files.push(("groups/one/onetwo/onetwo_baz.cpp", "int baz;\n"));
        let fixture = Fixture::new(&files);
        let db = fixture.compile_db(&[
            ("groups/one/onepkg/onepkg_foo.cpp", ""),
            ("groups/one/onepkg/onepkg_bar.cpp", ""),
            ("groups/one/onetwo/onetwo_baz.cpp", ""),
        ]);
        let store = ObjectStore::new();
        fixture.scan(&store, &db);

        fixture.remove("groups/one/onetwo/onetwo_baz.cpp");
        let result = fixture.scan(&store, &db);
        assert_eq!(result.deleted_files, vec!["groups/one/onetwo/onetwo_baz.cpp"]);
        assert_eq!(result.deleted_packages, vec!["groups/one/onetwo"]);
        assert!(store.get_package("groups/one").is_some());

        for (path, _) in ONEPKG {
            fixture.remove(path);
        }
        let result = fixture.scan(&store, &db);
        assert_eq!(result.deleted_files.len(), 4);
        assert_eq!(result.deleted_packages, vec!["groups/one", "groups/one/onepkg"]);
        assert!(store.package_names().is_empty());
        assert!(store.read().components.is_empty());
    }

    #[test]
    fn test_header_found_through_include_dir() {
        let fixture = Fixture::new(&[
            ("groups/one/onepkg/onepkg_inc.cpp", "#include <onepkg_inc.h>\n"),
            ("include/onepkg_inc.h", "struct Inc {};\n"),
        ]);
        let db = fixture.compile_db(&[("groups/one/onepkg/onepkg_inc.cpp", "-I../../../include")]);
        let store = ObjectStore::new();

        let result = fixture.scan(&store, &db);
        assert_eq!(
            result.new_files,
            vec!["groups/one/onepkg/onepkg_inc.cpp", "include/onepkg_inc.h"]
        );
    }

    #[test]
    fn test_ignored_files_are_skipped() {
        let fixture = Fixture::new(ONEPKG);
        let db = onepkg_db(&fixture);
        let store = ObjectStore::new();
        let ignore = IgnoreFilter::new(&fixture.root, &["*_bar.*".to_string()]);

        let result = fixture.scan_with(&store, &db, &ignore);
        assert_eq!(
            result.new_files,
            vec!["groups/one/onepkg/onepkg_foo.cpp", "groups/one/onepkg/onepkg_foo.h"]
        );
    }

    #[test]
    fn test_unknown_extension_becomes_error() {
        let fixture = Fixture::new(&[]);
        let db = CompilationDatabase::new();
        let classifier = Classifier::new(&fixture.root);
        let ignore = IgnoreFilter::empty();
        let store = ObjectStore::new();
        let scanner = FilesystemScanner::new(&store, &fixture.root, &db, &classifier, &ignore);

        let found = FoundFile {
            qualified_name: "notes/README".to_string(),
            claim: classifier.classify(Path::new("notes/README")).unwrap(),
            file_type: categorise_path(Path::new("notes/README")),
            hash: String::new(),
        };
        let result = scanner.add_to_store(vec![found]);
        assert!(result.new_files.is_empty());
        store.with_read(|data| {
            assert!(data.files.is_empty());
            assert!(data.get_error("", "Unknown file extension", "notes/README").is_some());
        });
    }

    #[test]
    fn test_progress_messages_are_sent() {
        let fixture = Fixture::new(ONEPKG);
        let db = onepkg_db(&fixture);
        let store = ObjectStore::new();
        let classifier = Classifier::new(&fixture.root);
        let ignore = IgnoreFilter::empty();
        let (tx, rx) = unbounded();

        FilesystemScanner::new(&store, &fixture.root, &db, &classifier, &ignore)
            .with_progress(tx)
            .scan_compilation_db()
            .unwrap();

        let messages: Vec<ProgressMessage> = rx.try_iter().collect();
        let progressed = messages
            .iter()
            .filter(|m| matches!(m, ProgressMessage::Progress { phase: ProgressPhase::Scanning, .. }))
            .count();
        assert_eq!(progressed, 2);
        let new = messages
            .iter()
            .filter(|m| matches!(m, ProgressMessage::FileNew(_)))
            .count();
        assert_eq!(new, 4);
    }
}
