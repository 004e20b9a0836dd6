/// Stage of a scan reported to the progress display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Reading and hashing the files of the compilation database
    Scanning,
    /// Reconciling the object store
    Storing,
    /// Persisting the store to SQLite
    Writing,
}

#[derive(Clone, Debug)]
pub enum ProgressMessage {
    Started {
        phase: ProgressPhase,
        total: usize,
    },
    Progress {
        phase: ProgressPhase,
        file: Option<String>,
    },
    Finished {
        phase: ProgressPhase,
    },
    FileNew(String),
    FileModified(String),
    FileDeleted(String),
}
