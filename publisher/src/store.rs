//! Persistent Target list
//!
//! Targets live in `influxdb-targets.json` inside the configuration
//! directory. Readers take a cheap [`Arc`] snapshot; every mutation builds a
//! new list, swaps it in and saves.
//!
//! Older installations kept Targets in `influxdb-legacy-targets.json` with
//! camel case keys and plaintext secrets. They are imported once, the first
//! time the store is opened, and the `migrated` flag keeps it that way.

use crate::error::ConfigError;
use crate::target::{Consistency, Secret, Target};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const STORE_FILE: &str = "influxdb-targets.json";
pub const LEGACY_FILE: &str = "influxdb-legacy-targets.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    migrated: bool,
    #[serde(default)]
    targets: Vec<Target>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTarget {
    description: String,
    url: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    database: String,
    #[serde(default)]
    organization: Option<String>,
    #[serde(default)]
    retention_policy: Option<String>,
    #[serde(default)]
    consistency: Option<Consistency>,
    #[serde(default)]
    expose_exceptions: bool,
    #[serde(default)]
    using_jenkins_proxy: bool,
    #[serde(default)]
    global_listener: bool,
    #[serde(default)]
    global_listener_filter: Option<String>,
    #[serde(default)]
    job_scheduled_time_as_timestamp: bool,
}

impl From<LegacyTarget> for Target {
    fn from(legacy: LegacyTarget) -> Self {
        let secret = |value: Option<String>| value.filter(|v| !v.is_empty()).map(Secret::from);
        Target {
            description: legacy.description,
            url: legacy.url,
            username: legacy.username.filter(|u| !u.is_empty()),
            password: secret(legacy.password),
            token: secret(legacy.token),
            database: legacy.database,
            organization: legacy.organization,
            retention_policy: legacy.retention_policy,
            consistency: legacy.consistency,
            expose_exceptions: legacy.expose_exceptions,
            use_proxy: legacy.using_jenkins_proxy,
            global_listener: legacy.global_listener,
            global_listener_filter: legacy.global_listener_filter,
            job_scheduled_time_as_timestamp: legacy.job_scheduled_time_as_timestamp,
        }
    }
}

#[derive(Debug)]
struct State {
    migrated: bool,
    targets: Arc<Vec<Target>>,
}

/// Target configuration service
#[derive(Debug)]
pub struct TargetStore {
    dir: PathBuf,
    state: RwLock<State>,
}

impl TargetStore {
    /// Load the store from `dir` and run the legacy migration if it never ran
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let store = Self {
            dir: dir.into(),
            state: RwLock::new(State {
                migrated: false,
                targets: Arc::new(Vec::new()),
            }),
        };
        store.load()?;
        store.migrate_legacy()?;
        Ok(store)
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STORE_FILE)
    }

    /// Re-read the store file, replacing the in-memory list
    pub fn load(&self) -> Result<(), ConfigError> {
        let path = self.path();
        let file: StoreFile = match read_json(&path)? {
            Some(file) => file,
            None => {
                debug!(path = %path.display(), "No target store yet");
                StoreFile::default()
            }
        };

        info!(path = %path.display(), targets = file.targets.len(), "Loaded targets");
        let mut state = self.state.write();
        state.migrated = file.migrated;
        state.targets = Arc::new(file.targets);
        Ok(())
    }

    /// Write the current list to disk, readable by the owner only
    pub fn save(&self) -> Result<(), ConfigError> {
        let state = self.state.read();
        let file = StoreFile {
            migrated: state.migrated,
            targets: state.targets.as_ref().clone(),
        };
        drop(state);
        self.write(&file)
    }

    fn write(&self, file: &StoreFile) -> Result<(), ConfigError> {
        let path = self.path();
        let io_err = |source: io::Error| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).truncate(true).create(true);

        // Secrets are only encoded, keep the file private
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut f = options.open(&path).map_err(io_err)?;
        serde_json::to_writer_pretty(&mut f, file).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })?;
        f.write_all(b"\n").map_err(io_err)?;
        Ok(())
    }

    /// Import Targets from the legacy file, at most once per store.
    ///
    /// Returns how many Targets were imported. Descriptions already present
    /// and invalid legacy entries are skipped.
    pub fn migrate_legacy(&self) -> Result<usize, ConfigError> {
        if self.state.read().migrated {
            return Ok(0);
        }

        let legacy_path = self.dir.join(LEGACY_FILE);
        let legacy: Vec<LegacyTarget> = read_json(&legacy_path)?.unwrap_or_default();

        let mut imported = 0;
        {
            let mut state = self.state.write();
            let mut targets = state.targets.as_ref().clone();
            for target in legacy.into_iter().map(Target::from) {
                if let Err(e) = target.validate() {
                    warn!(error = %e, "Skipping legacy target");
                    continue;
                }
                if targets.iter().any(|t| t.description == target.description) {
                    debug!(destination = %target.description, "Legacy target already present");
                    continue;
                }
                targets.push(target);
                imported += 1;
            }
            state.targets = Arc::new(targets);
            state.migrated = true;
        }

        self.save()?;
        if imported > 0 {
            info!(imported, path = %legacy_path.display(), "Migrated legacy targets");
        }
        Ok(imported)
    }

    pub fn is_migrated(&self) -> bool {
        self.state.read().migrated
    }

    /// Current Target list, unaffected by later mutations
    pub fn snapshot(&self) -> Arc<Vec<Target>> {
        Arc::clone(&self.state.read().targets)
    }

    pub fn get(&self, description: &str) -> Option<Target> {
        self.state
            .read()
            .targets
            .iter()
            .find(|t| t.description == description)
            .cloned()
    }

    /// Append a new Target
    pub fn add(&self, target: Target) -> Result<(), ConfigError> {
        target.validate()?;
        self.mutate(|targets| {
            if targets.iter().any(|t| t.description == target.description) {
                return Err(ConfigError::DuplicateTarget(target.description.clone()));
            }
            targets.push(target);
            Ok(())
        })
    }

    /// Replace the Target with the same description
    pub fn replace(&self, target: Target) -> Result<(), ConfigError> {
        target.validate()?;
        self.mutate(|targets| {
            let slot = targets
                .iter_mut()
                .find(|t| t.description == target.description)
                .ok_or_else(|| ConfigError::UnknownTarget(target.description.clone()))?;
            *slot = target;
            Ok(())
        })
    }

    pub fn remove(&self, description: &str) -> Result<Target, ConfigError> {
        let mut removed = None;
        self.mutate(|targets| {
            let index = targets
                .iter()
                .position(|t| t.description == description)
                .ok_or_else(|| ConfigError::UnknownTarget(description.to_string()))?;
            removed = Some(targets.remove(index));
            Ok(())
        })?;
        removed.ok_or_else(|| ConfigError::UnknownTarget(description.to_string()))
    }

    fn mutate<F>(&self, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut Vec<Target>) -> Result<(), ConfigError>,
    {
        {
            let mut state = self.state.write();
            let mut targets = state.targets.as_ref().clone();
            f(&mut targets)?;
            state.targets = Arc::new(targets);
        }
        self.save()
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, ConfigError> {
    let f = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };
    serde_json::from_reader(io::BufReader::new(f))
        .map(Some)
        .map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
}
