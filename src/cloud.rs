// This file contains the cloud lookups that the config operations depend on: which machine image
// to use in a region and which volumes exist in a zone.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;
use thiserror::Error;

use crate::misc::spinner;


const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);


#[derive(Debug, Error)]
pub enum CloudError {
    #[error("cloud request timed out: {0}")]
    Timeout(String),

    #[error("cloud request failed: {0}")]
    Request(String),

    #[error("failed to read inventory {}\n{source}", .path.display())]
    InventoryRead { path: PathBuf, source: io::Error },

    #[error("inventory {} is not correctly formatted\n{source}", .path.display())]
    InventoryFormat { path: PathBuf, source: serde_yaml::Error },
}

impl CloudError {
    /// Only timeouts are worth another try. Anything else will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, CloudError::Timeout(_))
    }
}


/// The read-only cloud queries ngscloud makes. Implementations talking to a real provider are
/// expected to put a deadline on each request and report it as CloudError::Timeout.
pub trait Cloud {
    /// The machine image to use for cluster nodes in the region, if one is published there.
    fn resolve_image_id(&self, region: &str) -> Result<Option<String>, CloudError>;

    /// Every volume currently in the zone, as volume name -> volume id.
    fn list_existing_volumes(&self, zone: &str) -> Result<BTreeMap<String, String>, CloudError>;

    fn resolve_volume_id(&self, name: &str, zone: &str) -> Result<Option<String>, CloudError> {
        Ok(self.list_existing_volumes(zone)?.remove(name))
    }
}


/// A description of the cloud read from a YAML file, e.g.:
///
/// ```yaml
/// images:
///   eu-west-1: ami-0e1f2a3b
/// volumes:
///   eu-west-1a:
///     reads: vol-0a1b2c3d
/// ```
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Inventory {
    #[serde(default)]
    pub images: BTreeMap<String, String>,
    #[serde(default)]
    pub volumes: BTreeMap<String, BTreeMap<String, String>>,
}


pub struct InventoryCloud {
    inventory: Inventory,
}

impl InventoryCloud {
    pub fn new(inventory: Inventory) -> Self {
        InventoryCloud { inventory }
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, CloudError> {
        let text = fs::read_to_string(path)
            .map_err(|source| CloudError::InventoryRead { path: path.to_path_buf(), source })?;
        let inventory = serde_yaml::from_str(&text)
            .map_err(|source| CloudError::InventoryFormat { path: path.to_path_buf(), source })?;
        Ok(InventoryCloud::new(inventory))
    }
}

impl Cloud for InventoryCloud {
    fn resolve_image_id(&self, region: &str) -> Result<Option<String>, CloudError> {
        Ok(self.inventory.images.get(region).cloned())
    }

    fn list_existing_volumes(&self, zone: &str) -> Result<BTreeMap<String, String>, CloudError> {
        Ok(self.inventory.volumes.get(zone).cloned().unwrap_or_default())
    }
}


pub fn with_retries<T, F>(description: &str, call: F) -> Result<T, CloudError>
        where F: FnMut() -> Result<T, CloudError> {
    retry(description, RETRY_ATTEMPTS, RETRY_DELAY, call)
}


fn retry<T, F>(description: &str, attempts: u32, delay: Duration, mut call: F)
        -> Result<T, CloudError>
        where F: FnMut() -> Result<T, CloudError> {
    // Repeats an idempotent (describe/list) request while it fails with a transient error. Never
    // use this for requests that change anything in the cloud.
    let pb = spinner(description);
    let mut attempt = 1;
    let result = loop {
        match call() {
            Err(e) if e.is_transient() && attempt < attempts => {
                pb.set_message(format!("{} (attempt {} failed: {})", description, attempt, e));
                attempt += 1;
                sleep(delay);
            }
            other => break other,
        }
    };
    pb.finish_and_clear();
    result
}
