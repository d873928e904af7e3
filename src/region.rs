// This file contains the code for the ngscloud region subcommand, which moves an environment to a
// different AWS region and/or zone.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use regex::Regex;
use std::path::{Path, PathBuf};

use crate::cloud::{with_retries, Cloud};
use crate::config::Config;
use crate::environment::ConfigContext;
use crate::ini::check_value;
use crate::log::{section_header, explanation, ProgressLog};
use crate::misc::{load_inventory, open_store, plural, quit_with_error};
use crate::report::{cli_log, finish_operation, OperationReport};
use crate::store::{ConfigStore, StoreError};


pub fn region(config_dir: PathBuf, environment: String, region: String, zone: String,
              inventory: PathBuf, report_file: Option<PathBuf>) {
    let store = open_store(&config_dir, &environment);
    let cloud = load_inventory(&inventory);
    starting_message();
    print_settings(&config_dir, &environment, &region, &zone, &inventory);
    let mut log = cli_log(report_file);
    let report = update_region_zone(&store, &cloud, &region, &zone, &mut log)
        .unwrap_or_else(|e| quit_with_error(&e.to_string()));
    finish_operation(&report, log);
}


fn starting_message() {
    section_header("Starting ngscloud region");
    explanation("This command sets the environment's current region and zone. Changing the \
                 region also points every cluster template at the machine image for the new \
                 region and removes all volume links, because volumes only exist in the zone \
                 where they were created.");
}


fn print_settings(config_dir: &Path, environment: &str, region: &str, zone: &str,
                  inventory: &Path) {
    eprintln!("Settings:");
    eprintln!("  --config_dir {}", config_dir.display());
    eprintln!("  --environment {}", environment);
    eprintln!("  --region {}", region);
    eprintln!("  --zone {}", zone);
    eprintln!("  --inventory {}", inventory.display());
    eprintln!();
}


pub fn update_region_zone(store: &ConfigStore, cloud: &dyn Cloud, new_region: &str,
                          new_zone: &str, log: &mut ProgressLog)
        -> Result<OperationReport, StoreError> {
    let context = store.context();
    store.modify(|config| apply_region_zone(config, context, cloud, new_region, new_zone, log))
}


fn apply_region_zone(config: &mut Config, context: &ConfigContext, cloud: &dyn Cloud,
                     new_region: &str, new_zone: &str, log: &mut ProgressLog)
        -> OperationReport {
    let mut report = OperationReport::new();
    log.attempt(&format!("Moving environment {} to region {}, zone {}",
                         context.environment(), new_region, new_zone));

    if !zone_in_region(new_zone, new_region) {
        report.fail(log, format!("zone {} is not in region {}", new_zone, new_region));
        return report;
    }
    let region_changed = new_region != config.global.current_region;

    // The image lookup happens before anything is changed: if the new region has no image,
    // the environment stays exactly as it was.
    let mut new_image_id = None;
    if region_changed {
        log.attempt(&format!("Looking up the machine image for region {}", new_region));
        match with_retries(&format!("looking up image in {}", new_region),
                           || cloud.resolve_image_id(new_region)) {
            Ok(Some(image_id)) => {
                log.done(&format!("image {}", image_id));
                new_image_id = Some(image_id);
            }
            Ok(None) => {
                report.fail(log, format!("no machine image is available in region {}",
                                         new_region));
                return report;
            }
            Err(e) => {
                report.fail(log, e.to_string());
                return report;
            }
        }
    }

    config.global.current_region = new_region.to_string();
    config.global.current_zone = new_zone.to_string();
    log.done(&format!("current region {} and zone {}", new_region, new_zone));
    for (key_name, key) in config.keys.iter_mut() {
        key.key_location = context.keypair_file(key_name, new_region).display().to_string();
        log.done(&format!("key {} is now {}", key_name, key.key_location));
    }

    if let Some(image_id) = new_image_id {
        // Volumes belong to a zone in the old region, so every link is dropped without
        // looking at the individual volumes.
        for (name, template) in config.templates.iter_mut() {
            template.master_image_id = image_id.clone();
            template.node_image_id = image_id.clone();
            template.volumes.clear();
            log.done(&format!("template {} now uses image {} and has no linked volumes",
                              name, image_id));
        }
        if !config.volumes.is_empty() {
            log.done(&format!("removed {} from the configuration",
                              plural(config.volumes.len(), "volume")));
            config.volumes.clear();
        }
    }
    report
}


pub fn zone_in_region(zone: &str, region: &str) -> bool {
    // AWS zone names are the region name followed by a single letter, e.g. eu-west-1a.
    let re = Regex::new(&format!("^{}[a-z]$", regex::escape(region))).unwrap();
    !region.is_empty() && check_value(region).is_ok() && re.is_match(zone)
}
