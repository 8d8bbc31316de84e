//! Program artifacts: compiled programs persisted across process restarts.
//!
//! Each program is stored as one JSON document at
//! `<root>/stache/programs/Program<hash>.json`; the `stache.programs`
//! namespace maps onto the directory path. Writes use the atomic `.tmp` +
//! rename pattern and are skipped when an identical artifact already exists.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stache_core::{ContentHash, Instruction, Program, ProgramCache};

use crate::error::{io_err, StoreError};

/// Namespace programs are filed under, one directory per segment.
pub const NAMESPACE: &str = "stache.programs";

const PREFIX: &str = "Program";
const SUFFIX: &str = ".json";

/// On-disk artifact payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactFile {
    pub hash: ContentHash,
    pub persisted_at: DateTime<Utc>,
    pub instructions: Vec<Instruction>,
}

/// Outcome of persisting one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Artifact was written (new, or the existing file differed).
    Written { path: PathBuf },
    /// An identical artifact already exists.
    Unchanged { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path } | WriteResult::Unchanged { path } => path,
        }
    }
}

/// Directory holding artifacts under `root`.
///
/// `<root>/stache/programs`
pub fn namespace_dir(root: &Path) -> PathBuf {
    NAMESPACE
        .split('.')
        .fold(root.to_path_buf(), |dir, segment| dir.join(segment))
}

/// Artifact path for a program hash.
pub fn artifact_path(root: &Path, hash: &ContentHash) -> PathBuf {
    namespace_dir(root).join(format!("{PREFIX}{hash}{SUFFIX}"))
}

fn read_artifact(path: &Path) -> Result<ArtifactFile, StoreError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Persist `program` atomically.
pub fn persist(root: &Path, program: &Program) -> Result<WriteResult, StoreError> {
    let path = artifact_path(root, &program.hash());

    if path.exists() {
        match read_artifact(&path) {
            Ok(existing) if existing.instructions == program.instructions() => {
                tracing::debug!("unchanged: {}", path.display());
                return Ok(WriteResult::Unchanged { path });
            }
            Ok(_) => tracing::warn!("replacing stale artifact: {}", path.display()),
            Err(e) => tracing::warn!("replacing unreadable artifact {}: {e}", path.display()),
        }
    }

    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid artifact path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let artifact = ArtifactFile {
        hash: program.hash(),
        persisted_at: Utc::now(),
        instructions: program.instructions().to_vec(),
    };
    let json = serde_json::to_string_pretty(&artifact)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written { path })
}

/// Persist every program currently in `cache`.
pub fn persist_all(root: &Path, cache: &ProgramCache) -> Result<Vec<WriteResult>, StoreError> {
    cache
        .programs()
        .iter()
        .map(|program| persist(root, program))
        .collect()
}

/// Load the artifact for `hash`, re-hashing its instructions.
///
/// Returns `None` if no artifact exists.
pub fn load(root: &Path, hash: &ContentHash) -> Result<Option<Program>, StoreError> {
    let path = artifact_path(root, hash);
    if !path.exists() {
        return Ok(None);
    }
    let artifact = read_artifact(&path)?;
    let program = Program::new(artifact.instructions)?;
    // Report whichever hash disagrees: the re-hashed content first, then the
    // hash recorded in the file.
    let found = [program.hash(), artifact.hash]
        .into_iter()
        .find(|found| found != hash);
    if let Some(found) = found {
        return Err(StoreError::HashMismatch {
            path,
            expected: hash.to_string(),
            found: found.to_string(),
        });
    }
    Ok(Some(program))
}

/// Load every artifact under `root` into `cache`. Returns how many were
/// loaded; a missing artifact directory loads nothing.
pub fn warm(cache: &ProgramCache, root: &Path) -> Result<usize, StoreError> {
    let dir = namespace_dir(root);
    if !dir.exists() {
        return Ok(0);
    }

    let mut loaded = 0;
    let entries = std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(&dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(hex) = name
            .strip_prefix(PREFIX)
            .and_then(|rest| rest.strip_suffix(SUFFIX))
        else {
            continue;
        };
        let hash: ContentHash = hex
            .parse()
            .map_err(|_| StoreError::InvalidHash(name.clone()))?;
        if let Some(program) = load(root, &hash)? {
            cache.insert(program);
            loaded += 1;
        }
    }

    tracing::debug!(loaded, dir = %dir.display(), "warmed program cache");
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stache_core::Compiler;
    use tempfile::TempDir;

    fn program(source: &str) -> Program {
        let compiled = Compiler::new().compile(source).unwrap();
        (*compiled.program).clone()
    }

    #[test]
    fn artifact_path_mirrors_namespace() {
        let p = program("x");
        let path = artifact_path(Path::new("/out"), &p.hash());
        assert_eq!(
            path,
            PathBuf::from(format!("/out/stache/programs/Program{}.json", p.hash()))
        );
    }

    #[test]
    fn persist_then_load() {
        let tmp = TempDir::new().unwrap();
        let p = program("{{#a}}{{b}}{{/a}}");
        let written = persist(tmp.path(), &p).unwrap();
        assert!(matches!(written, WriteResult::Written { .. }));
        assert_eq!(load(tmp.path(), &p.hash()).unwrap(), Some(p));
    }

    #[test]
    fn second_persist_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let p = program("same");
        persist(tmp.path(), &p).unwrap();
        let again = persist(tmp.path(), &p).unwrap();
        assert_eq!(
            again,
            WriteResult::Unchanged {
                path: artifact_path(tmp.path(), &p.hash())
            }
        );
    }

    #[test]
    fn tmp_file_cleaned_up_after_persist() {
        let tmp = TempDir::new().unwrap();
        let p = program("clean");
        persist(tmp.path(), &p).unwrap();
        let tmp_path = artifact_path(tmp.path(), &p.hash()).with_extension("json.tmp");
        assert!(!tmp_path.exists(), "tmp file should be removed after atomic rename");
    }

    #[test]
    fn missing_artifact_loads_none() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(load(tmp.path(), &program("nothing").hash()).unwrap(), None);
    }

    #[test]
    fn tampered_artifact_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let original = program("original");
        persist(tmp.path(), &original).unwrap();

        let path = artifact_path(tmp.path(), &original.hash());
        let mut artifact = read_artifact(&path).unwrap();
        artifact.instructions = vec![Instruction::EmitLiteral("tampered".into())];
        std::fs::write(&path, serde_json::to_string(&artifact).unwrap()).unwrap();

        assert!(matches!(
            load(tmp.path(), &original.hash()),
            Err(StoreError::HashMismatch { .. })
        ));
    }

    #[test]
    fn mislabelled_artifact_reports_the_recorded_hash() {
        let tmp = TempDir::new().unwrap();
        let stored = program("stored");
        let other = program("other");
        persist(tmp.path(), &stored).unwrap();

        let path = artifact_path(tmp.path(), &stored.hash());
        let mut artifact = read_artifact(&path).unwrap();
        artifact.hash = other.hash();
        std::fs::write(&path, serde_json::to_string(&artifact).unwrap()).unwrap();

        match load(tmp.path(), &stored.hash()) {
            Err(StoreError::HashMismatch { expected, found, .. }) => {
                assert_eq!(expected, stored.hash().to_string());
                assert_eq!(found, other.hash().to_string());
            }
            result => panic!("expected hash mismatch, got {result:?}"),
        }
    }

    #[test]
    fn warm_without_directory_loads_nothing() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(warm(&ProgramCache::new(), tmp.path()).unwrap(), 0);
    }
}
