// This file contains the configuration context (which directory and which environment a command
// works on) and the list of known environments.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::store::StoreError;


const ENVIRONMENTS_FILENAME: &str = "environments.txt";


pub fn default_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NGSCLOUD_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".ngscloud").join("config"),
        Err(_)   => PathBuf::from(".ngscloud").join("config"),
    }
}


/// Everything needed to find an environment's files. Passed explicitly to the store so that no
/// command depends on a process-wide "current environment".
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigContext {
    config_dir: PathBuf,
    environment: String,
}

impl ConfigContext {
    pub fn new(config_dir: &Path, environment: &str) -> Result<Self, String> {
        check_environment_name(environment)?;
        Ok(ConfigContext { config_dir: config_dir.to_path_buf(),
                           environment: environment.to_string() })
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(format!("{}-ngscloud-config.txt", self.environment))
    }

    pub fn lock_file(&self) -> PathBuf {
        self.config_dir.join(format!("{}-ngscloud-config.lock", self.environment))
    }

    pub fn keypairs_dir(&self) -> PathBuf {
        self.config_dir.join("keypairs")
    }

    pub fn keypair_file(&self, key_name: &str, region: &str) -> PathBuf {
        // Key pairs are regional in EC2, so the region is part of the file name.
        self.keypairs_dir().join(format!("{}-{}-{}.pem", self.environment, key_name, region))
    }
}


pub fn check_environment_name(name: &str) -> Result<(), String> {
    let re = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap();
    if re.is_match(name) {
        Ok(())
    } else {
        Err(format!("'{}' is not a valid environment name (use letters, digits, '-' and '_')",
                    name))
    }
}


#[derive(Debug, PartialEq)]
pub enum EnvironmentList {
    NotInitialized,
    Loaded(Vec<String>),
}


pub fn environments_file(config_dir: &Path) -> PathBuf {
    config_dir.join(ENVIRONMENTS_FILENAME)
}


pub fn load_environments(config_dir: &Path) -> Result<EnvironmentList, StoreError> {
    let path = environments_file(config_dir);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(EnvironmentList::NotInitialized),
        Err(source) => return Err(StoreError::Read { path, source }),
    };
    let names = text.lines().map(|l| l.trim()).filter(|l| !l.is_empty())
                    .map(|l| l.to_string()).collect();
    Ok(EnvironmentList::Loaded(names))
}


pub fn add_environment(config_dir: &Path, name: &str) -> Result<bool, StoreError> {
    // Appends the name to the environment list unless it is already there. Returns whether it
    // was added.
    if let EnvironmentList::Loaded(names) = load_environments(config_dir)? {
        if names.iter().any(|n| n == name) {
            return Ok(false);
        }
    }
    let path = environments_file(config_dir);
    fs::create_dir_all(config_dir)
        .map_err(|source| StoreError::Write { path: path.clone(), source })?;
    let mut file = OpenOptions::new().create(true).append(true).open(&path)
        .map_err(|source| StoreError::Write { path: path.clone(), source })?;
    writeln!(file, "{}", name).map_err(|source| StoreError::Write { path, source })?;
    Ok(true)
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths() {
        let context = ConfigContext::new(Path::new("/cfg"), "exp").unwrap();
        assert_eq!(context.environment(), "exp");
        assert_eq!(context.config_file(), PathBuf::from("/cfg/exp-ngscloud-config.txt"));
        assert_eq!(context.lock_file(), PathBuf::from("/cfg/exp-ngscloud-config.lock"));
        assert_eq!(context.keypair_file("NGScloudKey", "eu-west-1"),
                   PathBuf::from("/cfg/keypairs/exp-NGScloudKey-eu-west-1.pem"));
    }

    #[test]
    fn test_check_environment_name() {
        assert!(check_environment_name("exp").is_ok());
        assert!(check_environment_name("lab_2-prod").is_ok());
        assert!(check_environment_name("").is_err());
        assert!(check_environment_name("-exp").is_err());
        assert!(check_environment_name("a b").is_err());
        assert!(check_environment_name("../etc").is_err());
        assert!(ConfigContext::new(Path::new("/cfg"), "a/b").is_err());
    }

    #[test]
    fn test_environment_list() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join("config");
        assert_eq!(load_environments(&config_dir).unwrap(), EnvironmentList::NotInitialized);
        assert!(add_environment(&config_dir, "exp").unwrap());
        assert!(add_environment(&config_dir, "prod").unwrap());
        assert!(!add_environment(&config_dir, "exp").unwrap());
        assert_eq!(load_environments(&config_dir).unwrap(),
                   EnvironmentList::Loaded(vec!["exp".to_string(), "prod".to_string()]));
    }

    #[test]
    fn test_empty_environment_list_is_loaded() {
        let dir = tempdir().unwrap();
        fs::write(environments_file(dir.path()), "").unwrap();
        assert_eq!(load_environments(dir.path()).unwrap(), EnvironmentList::Loaded(vec![]));
    }
}
