// This file contains the code for the ngscloud review subcommand, which removes volumes from the
// configuration when they no longer exist in the cloud.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cloud::{with_retries, Cloud};
use crate::config::Config;
use crate::log::{section_header, explanation, ProgressLog};
use crate::misc::{load_inventory, open_store, plural, quit_with_error};
use crate::report::{cli_log, finish_operation, OperationReport};
use crate::store::{ConfigStore, StoreError};


pub fn review(config_dir: PathBuf, environment: String, zone: Option<String>, inventory: PathBuf,
              report_file: Option<PathBuf>) {
    let store = open_store(&config_dir, &environment);
    let cloud = load_inventory(&inventory);
    let zone = match zone {
        Some(zone) => zone,
        None => store.require_config().unwrap_or_else(|e| quit_with_error(&e.to_string()))
                     .global.current_zone,
    };
    starting_message();
    print_settings(&config_dir, &environment, &zone, &inventory);
    let mut log = cli_log(report_file);
    let report = review_links(&store, &cloud, &zone, &mut log)
        .unwrap_or_else(|e| quit_with_error(&e.to_string()));
    finish_operation(&report, log);
}


fn starting_message() {
    section_header("Starting ngscloud review");
    explanation("This command compares the configured volumes with the volumes that currently \
                 exist in the zone. Any configured volume that no longer exists is removed from \
                 every cluster template and from the configuration.");
}


fn print_settings(config_dir: &Path, environment: &str, zone: &str, inventory: &Path) {
    eprintln!("Settings:");
    eprintln!("  --config_dir {}", config_dir.display());
    eprintln!("  --environment {}", environment);
    eprintln!("  --zone {}", zone);
    eprintln!("  --inventory {}", inventory.display());
    eprintln!();
}


pub fn review_links(store: &ConfigStore, cloud: &dyn Cloud, zone: &str, log: &mut ProgressLog)
        -> Result<OperationReport, StoreError> {
    store.modify(|config| {
        // The cloud is asked once, and every removal below is decided against that one answer.
        log.attempt(&format!("Listing volumes in zone {}", zone));
        let existing = match with_retries(&format!("listing volumes in {}", zone),
                                          || cloud.list_existing_volumes(zone)) {
            Ok(existing) => existing,
            Err(e) => {
                let mut report = OperationReport::new();
                report.fail(log, e.to_string());
                return report;
            }
        };
        log.done(&format!("{} in zone {}", plural(existing.len(), "volume"), zone));
        apply_review(config, &existing, log)
    })
}


fn apply_review(config: &mut Config, existing: &BTreeMap<String, String>, log: &mut ProgressLog)
        -> OperationReport {
    let mut report = OperationReport::new();
    log.attempt("Reviewing linked volumes");

    let missing: Vec<String> = config.volumes.keys()
        .filter(|name| !existing.contains_key(*name)).cloned().collect();
    for name in &missing {
        for (template_name, template) in config.templates.iter_mut() {
            if template.links(name) {
                template.volumes.retain(|v| v != name);
                log.done(&format!("volume {} removed from template {}", name, template_name));
            }
        }
        config.volumes.remove(name);
        log.done(&format!("volume {} no longer exists and has been removed from the \
                           configuration", name));
    }

    // Links to volumes without a [volume] section can't be attached, so they go too.
    let volumes = &config.volumes;
    for (template_name, template) in config.templates.iter_mut() {
        let (kept, dangling): (Vec<String>, Vec<String>) = template.volumes.drain(..)
            .partition(|v| volumes.contains_key(v));
        template.volumes = kept;
        for name in dangling {
            report.warn(log, format!("template {} linked to volume {}, which has no \
                                      configuration, and the link has been removed",
                                     template_name, name));
        }
    }

    if missing.is_empty() && report.warnings.is_empty() {
        log.info("all linked volumes exist");
    }
    report
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::read_to_string;
    use tempfile::tempdir;
    use crate::cloud::CloudError;
    use crate::tests::{quiet_log, test_cloud, test_config_text, test_store};

    struct BrokenCloud;

    impl Cloud for BrokenCloud {
        fn resolve_image_id(&self, _region: &str) -> Result<Option<String>, CloudError> {
            Err(CloudError::Request("access denied".to_string()))
        }
        fn list_existing_volumes(&self, _zone: &str)
                -> Result<BTreeMap<String, String>, CloudError> {
            Err(CloudError::Request("access denied".to_string()))
        }
    }

    #[test]
    fn test_review_removes_missing_volume() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path(),
                               &test_config_text("V1, V3", "V3", &[("V1", "vol-1", "/a"),
                                                                   ("V3", "vol-3", "/c")]));
        let report = review_links(&store, &test_cloud(), "eu-west-1a", &mut quiet_log()).unwrap();
        assert!(report.success);
        let config = store.require_config().unwrap();
        assert_eq!(config.get_linked_volumes("T1").unwrap(), &["V1"]);
        assert!(config.get_linked_volumes("T2").unwrap().is_empty());
        assert_eq!(config.get_volumes().keys().collect::<Vec<_>>(), vec!["V1"]);
        assert_eq!(config.volumes["V1"].volume_id, "vol-1");
    }

    #[test]
    fn test_review_zone_scoped() {
        // V2 exists in eu-west-1a but not in us-east-1a, so reviewing us-east-1a removes it.
        let dir = tempdir().unwrap();
        let store = test_store(dir.path(),
                               &test_config_text("V1", "V1, V2", &[("V1", "vol-1", "/a"),
                                                                   ("V2", "vol-2", "/b")]));
        review_links(&store, &test_cloud(), "us-east-1a", &mut quiet_log()).unwrap();
        let config = store.require_config().unwrap();
        assert_eq!(config.get_linked_volumes("T1").unwrap(), &["V1"]);
        assert_eq!(config.get_linked_volumes("T2").unwrap(), &["V1"]);
        assert!(!config.volumes.contains_key("V2"));
    }

    #[test]
    fn test_review_nothing_to_do() {
        let dir = tempdir().unwrap();
        let text = test_config_text("V1", "V2", &[("V1", "vol-1", "/a"), ("V2", "vol-2", "/b")]);
        let store = test_store(dir.path(), &text);
        let report = review_links(&store, &test_cloud(), "eu-west-1a", &mut quiet_log()).unwrap();
        assert!(report.success);
        assert!(report.warnings.is_empty());
        assert_eq!(read_to_string(store.path()).unwrap(), text);
    }

    #[test]
    fn test_review_prunes_dangling_links() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path(), &test_config_text("V1, V2", "", &[("V1", "vol-1", "/a")]));
        let report = review_links(&store, &test_cloud(), "eu-west-1a", &mut quiet_log()).unwrap();
        assert_eq!(report.warnings.len(), 1);
        let config = store.require_config().unwrap();
        assert_eq!(config.get_linked_volumes("T1").unwrap(), &["V1"]);
        assert!(config.integrity_problems().is_empty());
    }

    #[test]
    fn test_review_cloud_failure_changes_nothing() {
        let dir = tempdir().unwrap();
        let text = test_config_text("V1", "", &[("V1", "vol-1", "/a")]);
        let store = test_store(dir.path(), &text);
        let report = review_links(&store, &BrokenCloud, "eu-west-1a", &mut quiet_log()).unwrap();
        assert!(!report.success);
        assert_eq!(report.errors, vec!["cloud request failed: access denied"]);
        assert_eq!(read_to_string(store.path()).unwrap(), text);
    }
}
