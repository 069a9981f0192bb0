use clap::ValueEnum;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

pub(crate) const DEFAULT_STORAGE_DIR: &str = "claude-code-storage";
pub(crate) const DEFAULT_INSTANCE_PREFIX: &str = "claude-instance";
pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 16;

/// How a creation conflict on the chosen identifier is resolved.
///
/// `BestEffort` scans for the highest identifier and reuses an existing
/// directory if another process got there first; the scan and the create are
/// not atomic. `Exclusive` treats `create_dir` as the claim and moves on to a
/// higher identifier whenever the claim fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Strategy {
    #[default]
    #[serde(alias = "best-effort")]
    BestEffort,
    Exclusive,
}

impl Strategy {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::BestEffort => "best_effort",
            Self::Exclusive => "exclusive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Instance {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    /// False when the directory was already present and reused.
    pub(crate) created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AllocationError {
    WorkingDirMissing(PathBuf),
    WorkingDirNotDirectory(PathBuf),
    NotADirectory(PathBuf),
    PermissionDenied { path: PathBuf, message: String },
    Io { path: PathBuf, message: String },
    Exhausted { base_dir: PathBuf, attempts: u32 },
    /// An existing instance already carries the largest representable id.
    IdOverflow { base_dir: PathBuf, highest: u64 },
}

impl AllocationError {
    fn from_io(path: &Path, err: &io::Error) -> Self {
        if err.kind() == ErrorKind::PermissionDenied {
            Self::PermissionDenied {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        }
    }

    // `create_dir*` report AlreadyExists for files as well as directories.
    fn from_create(path: &Path, err: &io::Error) -> Self {
        if err.kind() == ErrorKind::AlreadyExists && !path.is_dir() {
            Self::NotADirectory(path.to_path_buf())
        } else {
            Self::from_io(path, err)
        }
    }
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkingDirMissing(path) => {
                write!(f, "Working directory does not exist: {}", path.display())
            }
            Self::WorkingDirNotDirectory(path) => {
                write!(f, "Working directory is not a directory: {}", path.display())
            }
            Self::NotADirectory(path) => {
                write!(f, "Path exists but is not a directory: {}", path.display())
            }
            Self::PermissionDenied { path, message } => write!(
                f,
                "Permission denied creating directory {}: {}",
                path.display(),
                message
            ),
            Self::Io { path, message } => write!(
                f,
                "OS error creating directory {}: {}",
                path.display(),
                message
            ),
            Self::Exhausted { base_dir, attempts } => write!(
                f,
                "No free instance id under {} after {} attempts",
                base_dir.display(),
                attempts
            ),
            Self::IdOverflow { base_dir, highest } => write!(
                f,
                "Instance id overflow under {}: highest existing id is {}",
                base_dir.display(),
                highest
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Allocator {
    prefix: String,
    strategy: Strategy,
    max_attempts: u32,
    pattern: Regex,
}

impl Allocator {
    pub(crate) fn new(
        prefix: &str,
        strategy: Strategy,
        max_attempts: u32,
    ) -> Result<Self, String> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err("instance_prefix must not be empty".to_string());
        }
        if prefix.contains('/') || prefix.contains('\\') {
            return Err(format!(
                "instance_prefix must be a single path segment, got {:?}",
                prefix
            ));
        }
        let pattern = Regex::new(&format!("^{}-([0-9]+)$", regex::escape(prefix)))
            .map_err(|err| format!("Invalid instance_prefix {:?}: {}", prefix, err))?;
        Ok(Self {
            prefix: prefix.to_string(),
            strategy,
            max_attempts: max_attempts.max(1),
            pattern,
        })
    }

    pub(crate) fn instance_name(&self, id: u64) -> String {
        format!("{}-{}", self.prefix, id)
    }

    /// Identifier carried by `name`, if it is exactly `<prefix>-<digits>`.
    pub(crate) fn parse_instance_id(&self, name: &str) -> Option<u64> {
        let captures = self.pattern.captures(name)?;
        captures.get(1)?.as_str().parse().ok()
    }

    /// One past the highest identifier among the instance directories under
    /// `base_dir`, or 1 when there are none or `base_dir` does not exist yet.
    pub(crate) fn next_instance_id(&self, base_dir: &Path) -> Result<u64, AllocationError> {
        let metadata = match fs::metadata(base_dir) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(1),
            Err(err) => return Err(AllocationError::from_io(base_dir, &err)),
        };
        if !metadata.is_dir() {
            return Err(AllocationError::NotADirectory(base_dir.to_path_buf()));
        }

        let entries =
            fs::read_dir(base_dir).map_err(|err| AllocationError::from_io(base_dir, &err))?;
        let mut highest = 0u64;
        for entry in entries {
            let entry = entry.map_err(|err| AllocationError::from_io(base_dir, &err))?;
            if !entry.path().is_dir() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(id) = self.parse_instance_id(name) {
                highest = highest.max(id);
            }
        }

        highest
            .checked_add(1)
            .ok_or_else(|| AllocationError::IdOverflow {
                base_dir: base_dir.to_path_buf(),
                highest,
            })
    }

    pub(crate) fn allocate(&self, base_dir: &Path) -> Result<Instance, AllocationError> {
        self.allocate_impl(base_dir, |_| {})
    }

    #[cfg(test)]
    pub(crate) fn allocate_with_hook<F>(
        &self,
        base_dir: &Path,
        before_create: F,
    ) -> Result<Instance, AllocationError>
    where
        F: FnMut(&Path),
    {
        self.allocate_impl(base_dir, before_create)
    }

    fn allocate_impl<F>(
        &self,
        base_dir: &Path,
        mut before_create: F,
    ) -> Result<Instance, AllocationError>
    where
        F: FnMut(&Path),
    {
        fs::create_dir_all(base_dir)
            .map_err(|err| AllocationError::from_create(base_dir, &err))?;

        let attempts = match self.strategy {
            Strategy::BestEffort => 1,
            Strategy::Exclusive => self.max_attempts,
        };
        let mut floor = 1u64;
        for _ in 0..attempts {
            let id = self.next_instance_id(base_dir)?.max(floor);
            let name = self.instance_name(id);
            let path = base_dir.join(&name);
            before_create(&path);

            match fs::create_dir(&path) {
                Ok(()) => {
                    return Ok(Instance {
                        id,
                        name,
                        path,
                        created: true,
                    })
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if !path.is_dir() {
                        return Err(AllocationError::NotADirectory(path));
                    }
                    if self.strategy == Strategy::BestEffort {
                        return Ok(Instance {
                            id,
                            name,
                            path,
                            created: false,
                        });
                    }
                    floor = id.checked_add(1).ok_or_else(|| AllocationError::IdOverflow {
                        base_dir: base_dir.to_path_buf(),
                        highest: id,
                    })?;
                }
                Err(err) => return Err(AllocationError::from_io(&path, &err)),
            }
        }

        Err(AllocationError::Exhausted {
            base_dir: base_dir.to_path_buf(),
            attempts,
        })
    }

    /// Allocates under `<cwd>/<storage_dir>` after checking that `cwd` is a
    /// usable directory.
    pub(crate) fn prepare(
        &self,
        cwd: &Path,
        storage_dir: &Path,
    ) -> Result<Instance, AllocationError> {
        match fs::metadata(cwd) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(AllocationError::WorkingDirNotDirectory(cwd.to_path_buf())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(AllocationError::WorkingDirMissing(cwd.to_path_buf()))
            }
            Err(err) => return Err(AllocationError::from_io(cwd, &err)),
        }
        self.allocate(&cwd.join(storage_dir))
    }
}
