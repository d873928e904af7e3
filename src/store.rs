// This file contains the config store: reading, locking and atomically rewriting an
// environment's config file.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::{Config, ConfigState};
use crate::environment::ConfigContext;
use crate::ini::{self, OptionMap, ParseError};
use crate::report::OperationReport;


const LOCK_ATTEMPTS: u32 = 20;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(250);


#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}\n{source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}\n{source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("{} is not correctly formatted: {source}", .path.display())]
    Parse { path: PathBuf, source: ParseError },

    #[error("{} has invalid settings:\n  {}", .path.display(), .problems.join("\n  "))]
    Schema { path: PathBuf, problems: Vec<String> },

    #[error("environment {0} is not initialised (run ngscloud init first)")]
    NotInitialized(String),

    #[error("refusing to write {}, these settings would not read back:\n  {}", .path.display(),
            .problems.join("\n  "))]
    Unwritable { path: PathBuf, problems: Vec<String> },

    #[error("{} is locked by another ngscloud process, try again later", .path.display())]
    Locked { path: PathBuf },

    #[error("failed to lock {}\n{source}", .path.display())]
    Lock { path: PathBuf, source: Errno },
}


/// Held for the whole read-modify-write of a config file. Dropping it releases the lock.
pub struct StoreLock {
    _flock: Flock<File>,
}


pub struct ConfigStore {
    context: ConfigContext,
    lock_attempts: u32,
}

impl ConfigStore {
    pub fn new(context: ConfigContext) -> Self {
        ConfigStore { context, lock_attempts: LOCK_ATTEMPTS }
    }

    /// Sets how many times `lock` tries before giving up with `StoreError::Locked`.
    pub fn with_lock_attempts(mut self, attempts: u32) -> Self {
        self.lock_attempts = attempts.max(1);
        self
    }

    pub fn context(&self) -> &ConfigContext {
        &self.context
    }

    pub fn path(&self) -> PathBuf {
        self.context.config_file()
    }

    /// Reads the raw INI document. A missing file reads the same as an empty one.
    pub fn load(&self) -> Result<OptionMap, StoreError> {
        let path = self.path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(OptionMap::new()),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        ini::parse(&text).map_err(|source| StoreError::Parse { path, source })
    }

    /// Writes the whole document to a temporary file next to the config file and renames it
    /// into place, so readers only ever see the old file or the new one. A document that
    /// wouldn't parse back to the same options is refused and the file is left alone.
    pub fn save(&self, options: &OptionMap) -> Result<(), StoreError> {
        let path = self.path();
        let problems = ini::unwritable(options);
        if !problems.is_empty() {
            return Err(StoreError::Unwritable { path, problems });
        }
        let write_error = |source| StoreError::Write { path: path.clone(), source };
        let dir = self.context.config_dir();
        fs::create_dir_all(dir).map_err(write_error)?;
        let mut temp = NamedTempFile::new_in(dir).map_err(write_error)?;
        temp.write_all(ini::to_string(options).as_bytes()).map_err(write_error)?;
        temp.as_file().sync_all().map_err(write_error)?;
        temp.persist(&path).map_err(|e| write_error(e.error))?;
        Ok(())
    }

    pub fn load_config(&self) -> Result<ConfigState, StoreError> {
        let options = self.load()?;
        if options.is_empty() {
            return Ok(ConfigState::NotInitialized);
        }
        Config::from_options(&options)
            .map(ConfigState::Loaded)
            .map_err(|problems| StoreError::Schema { path: self.path(), problems })
    }

    pub fn require_config(&self) -> Result<Config, StoreError> {
        match self.load_config()? {
            ConfigState::Loaded(config) => Ok(config),
            ConfigState::NotInitialized => {
                Err(StoreError::NotInitialized(self.context.environment().to_string()))
            }
        }
    }

    pub fn save_config(&self, config: &Config) -> Result<(), StoreError> {
        self.save(&config.to_options())
    }

    pub fn lock(&self) -> Result<StoreLock, StoreError> {
        // Takes an exclusive advisory lock on the environment's lock file. If another process
        // holds it, this retries for a while and then gives up rather than waiting forever.
        let path = self.context.lock_file();
        fs::create_dir_all(self.context.config_dir())
            .map_err(|source| StoreError::Write { path: path.clone(), source })?;
        let mut file = OpenOptions::new().create(true).truncate(false).write(true).open(&path)
            .map_err(|source| StoreError::Write { path: path.clone(), source })?;
        let attempts = self.lock_attempts;
        for attempt in 1..=attempts {
            match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(flock) => return Ok(StoreLock { _flock: flock }),
                Err((f, errno)) if errno == Errno::EWOULDBLOCK => {
                    file = f;
                    if attempt < attempts {
                        sleep(LOCK_RETRY_DELAY);
                    }
                }
                Err((_, source)) => return Err(StoreError::Lock { path, source }),
            }
        }
        Err(StoreError::Locked { path })
    }

    /// Runs one config-changing operation: lock, load, change a copy in memory, and save once.
    /// Nothing is written if the operation reports failure or changes nothing.
    pub fn modify<F>(&self, operation: F) -> Result<OperationReport, StoreError>
            where F: FnOnce(&mut Config) -> OperationReport {
        let _lock = self.lock()?;
        let original = self.require_config()?;
        let mut config = original.clone();
        let report = operation(&mut config);
        if report.success && config != original {
            self.save_config(&config)?;
        }
        Ok(report)
    }

    pub fn exists(&self) -> bool {
        self.path().is_file()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::read_to_string;
    use tempfile::tempdir;
    use crate::tests::{make_test_file, test_config_text, test_store};

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(ConfigContext::new(dir.path(), "exp").unwrap());
        assert!(!store.exists());
        assert!(store.load().unwrap().is_empty());
        assert!(matches!(store.load_config().unwrap(), ConfigState::NotInitialized));
        assert!(matches!(store.require_config(), Err(StoreError::NotInitialized(_))));
    }

    #[test]
    fn test_load_blank_file() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(ConfigContext::new(dir.path(), "exp").unwrap());
        make_test_file(&store.path(), "\n\n");
        assert!(store.load().unwrap().is_empty());
        assert!(matches!(store.load_config().unwrap(), ConfigState::NotInitialized));
    }

    #[test]
    fn test_parse_error_names_line() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(ConfigContext::new(dir.path(), "exp").unwrap());
        make_test_file(&store.path(), "[global]\nenvironment = exp\nbad line\n");
        match store.load() {
            Err(StoreError::Parse { source, .. }) => assert_eq!(source.line, 3),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_error() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(ConfigContext::new(dir.path(), "exp").unwrap());
        make_test_file(&store.path(), "[global]\nenvironment = exp\n");
        match store.load_config() {
            Err(StoreError::Schema { problems, .. }) => assert!(problems.len() > 1),
            other => panic!("expected a schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path(), &test_config_text("V1", "", &[("V1", "vol-1", "/mnt")]));
        let before = read_to_string(store.path()).unwrap();
        store.save(&store.load().unwrap()).unwrap();
        assert_eq!(read_to_string(store.path()).unwrap(), before);
        let config = store.require_config().unwrap();
        store.save_config(&config).unwrap();
        assert_eq!(read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_save_creates_directory() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(ConfigContext::new(&dir.path().join("a/b"), "exp").unwrap());
        let mut options = OptionMap::new();
        options.set("global", "environment", "exp");
        store.save(&options).unwrap();
        assert_eq!(read_to_string(store.path()).unwrap(), "[global]\nenvironment = exp\n\n");
    }

    #[test]
    fn test_save_refuses_line_breaks() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path(), &test_config_text("V1", "", &[("V1", "vol-1", "/mnt")]));
        let before = read_to_string(store.path()).unwrap();
        let mut options = store.load().unwrap();
        options.set("volume V1", "mount_path", "/mnt/a\n[global]");
        match store.save(&options) {
            Err(StoreError::Unwritable { problems, .. }) => assert_eq!(problems.len(), 1),
            other => panic!("expected an unwritable error, got {:?}", other),
        }
        assert_eq!(read_to_string(store.path()).unwrap(), before);
        assert!(store.require_config().is_ok());
    }

    #[test]
    fn test_lock_is_exclusive() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path(), &test_config_text("", "", &[])).with_lock_attempts(1);
        let held = store.lock().unwrap();
        assert!(matches!(store.lock(), Err(StoreError::Locked { .. })));
        drop(held);
        assert!(store.lock().is_ok());
    }

    #[test]
    fn test_modify_fails_while_locked() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path(), &test_config_text("", "", &[])).with_lock_attempts(2);
        let before = read_to_string(store.path()).unwrap();
        let _held = store.lock().unwrap();
        let result = store.modify(|config| {
            config.contact.email = "changed@example.com".to_string();
            OperationReport::new()
        });
        assert!(matches!(result, Err(StoreError::Locked { .. })));
        assert_eq!(read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_modify_saves_only_on_success() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path(), &test_config_text("", "", &[]));
        let before = read_to_string(store.path()).unwrap();

        let report = store.modify(|config| {
            config.contact.email = "changed@example.com".to_string();
            let mut report = OperationReport::new();
            report.success = false;
            report
        }).unwrap();
        assert!(!report.success);
        assert_eq!(read_to_string(store.path()).unwrap(), before);

        store.modify(|config| {
            config.contact.email = "changed@example.com".to_string();
            OperationReport::new()
        }).unwrap();
        assert_eq!(store.require_config().unwrap().contact.email, "changed@example.com");
    }

    #[test]
    fn test_modify_requires_initialised_environment() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(ConfigContext::new(dir.path(), "exp").unwrap());
        let result = store.modify(|_| OperationReport::new());
        assert!(matches!(result, Err(StoreError::NotInitialized(_))));
    }
}
