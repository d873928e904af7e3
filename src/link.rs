// This file contains the code for the ngscloud link subcommand, which links a volume to one
// cluster template or to all of them.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use crate::cloud::{with_retries, Cloud};
use crate::config::{Config, TemplateTarget, Volume};
use crate::ini::check_value;
use crate::log::{section_header, explanation, ProgressLog};
use crate::misc::{load_inventory, open_store, quit_with_error};
use crate::report::{cli_log, finish_operation, OperationReport};
use crate::store::{ConfigStore, StoreError};


pub fn link(config_dir: PathBuf, environment: String, template: String, mount_path: String,
            volume: String, inventory: PathBuf, report_file: Option<PathBuf>) {
    let store = open_store(&config_dir, &environment);
    let cloud = load_inventory(&inventory);
    let target = TemplateTarget::parse(&template);
    starting_message();
    print_settings(&config_dir, &environment, &target, &mount_path, &volume, &inventory);
    let mut log = cli_log(report_file);
    let report = link_volume(&store, &cloud, &target, &mount_path, &volume, &mut log)
        .unwrap_or_else(|e| quit_with_error(&e.to_string()));
    finish_operation(&report, log);
}


fn starting_message() {
    section_header("Starting ngscloud link");
    explanation("This command links a volume to cluster templates, so the volume is attached \
                 and mounted whenever a cluster is started from one of those templates.");
}


fn print_settings(config_dir: &Path, environment: &str, target: &TemplateTarget,
                  mount_path: &str, volume: &str, inventory: &Path) {
    eprintln!("Settings:");
    eprintln!("  --config_dir {}", config_dir.display());
    eprintln!("  --environment {}", environment);
    eprintln!("  --template {}", target.as_arg());
    eprintln!("  --mount_path {}", mount_path);
    eprintln!("  --volume {}", volume);
    eprintln!("  --inventory {}", inventory.display());
    eprintln!();
}


pub fn link_volume(store: &ConfigStore, cloud: &dyn Cloud, target: &TemplateTarget,
                   mount_path: &str, volume_name: &str, log: &mut ProgressLog)
        -> Result<OperationReport, StoreError> {
    store.modify(|config| apply_link(config, cloud, target, mount_path, volume_name, log))
}


fn apply_link(config: &mut Config, cloud: &dyn Cloud, target: &TemplateTarget, mount_path: &str,
              volume_name: &str, log: &mut ProgressLog) -> OperationReport {
    // Any error here leaves the report unsuccessful, and ConfigStore::modify then discards every
    // change, so a link either happens completely or not at all.
    let mut report = OperationReport::new();
    let volume_name = volume_name.trim();
    let mount_path = mount_path.trim();
    log.attempt(&format!("Linking volume {} to {}", volume_name, target));

    if volume_name.is_empty() || volume_name.contains(',') {
        report.fail(log, format!("'{}' is not a valid volume name", volume_name));
        return report;
    }
    if let Err(e) = check_value(volume_name) {
        report.fail(log, format!("volume name {:?} {}", volume_name, e));
        return report;
    }
    if let Err(e) = check_value(mount_path) {
        report.fail(log, format!("mount path {:?} {}", mount_path, e));
        return report;
    }
    if !mount_path.starts_with('/') {
        report.fail(log, format!("mount path {} is not an absolute path", mount_path));
        return report;
    }
    let template_names = match config.resolve_target(target) {
        Ok(names) => names,
        Err(e)    => { report.fail(log, e); return report; }
    };

    match config.volumes.get(volume_name) {
        Some(existing) if existing.mount_path != mount_path => {
            report.fail(log, format!("volume {} is already mounted at {} and cannot also be \
                                      mounted at {}", volume_name, existing.mount_path,
                                     mount_path));
            return report;
        }
        Some(_) => {}
        None => {
            let zone = config.global.current_zone.clone();
            log.attempt(&format!("Looking up volume {} in zone {}", volume_name, zone));
            let lookup = with_retries(&format!("looking up volume {}", volume_name),
                                      || cloud.resolve_volume_id(volume_name, &zone));
            match lookup {
                Ok(Some(volume_id)) => {
                    log.done(&format!("found {} ({})", volume_name, volume_id));
                    config.volumes.insert(volume_name.to_string(),
                                          Volume { volume_id,
                                                   mount_path: mount_path.to_string() });
                }
                Ok(None) => {
                    report.fail(log, format!("volume {} does not exist in zone {}",
                                             volume_name, zone));
                    return report;
                }
                Err(e) => {
                    report.fail(log, e.to_string());
                    return report;
                }
            }
        }
    }

    for name in &template_names {
        let Some(template) = config.templates.get_mut(name) else { continue; };
        if template.links(volume_name) {
            report.warn(log, format!("volume {} is already linked to template {}",
                                     volume_name, name));
        } else {
            template.volumes.push(volume_name.to_string());
            log.done(&format!("volume {} linked to template {}", volume_name, name));
        }
    }
    report
}
