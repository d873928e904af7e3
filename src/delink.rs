// This file contains the code for the ngscloud delink subcommand, which removes a volume from
// one cluster template or from all of them.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use crate::config::{Config, TemplateTarget};
use crate::log::{section_header, explanation, ProgressLog};
use crate::misc::{open_store, plural, quit_with_error};
use crate::report::{cli_log, finish_operation, OperationReport};
use crate::store::{ConfigStore, StoreError};


pub fn delink(config_dir: PathBuf, environment: String, template: String, volume: String,
              report_file: Option<PathBuf>) {
    let store = open_store(&config_dir, &environment);
    let target = TemplateTarget::parse(&template);
    starting_message();
    print_settings(&config_dir, &environment, &target, &volume);
    let mut log = cli_log(report_file);
    let report = delink_volume(&store, &target, &volume, &mut log)
        .unwrap_or_else(|e| quit_with_error(&e.to_string()));
    finish_operation(&report, log);
}


fn starting_message() {
    section_header("Starting ngscloud delink");
    explanation("This command removes a volume from cluster templates. Once no template links \
                 to the volume, it is removed from the configuration (the volume itself is not \
                 deleted from the cloud).");
}


fn print_settings(config_dir: &Path, environment: &str, target: &TemplateTarget, volume: &str) {
    eprintln!("Settings:");
    eprintln!("  --config_dir {}", config_dir.display());
    eprintln!("  --environment {}", environment);
    eprintln!("  --template {}", target.as_arg());
    eprintln!("  --volume {}", volume);
    eprintln!();
}


pub fn delink_volume(store: &ConfigStore, target: &TemplateTarget, volume_name: &str,
                     log: &mut ProgressLog) -> Result<OperationReport, StoreError> {
    store.modify(|config| apply_delink(config, target, volume_name, log))
}


fn apply_delink(config: &mut Config, target: &TemplateTarget, volume_name: &str,
                log: &mut ProgressLog) -> OperationReport {
    let mut report = OperationReport::new();
    log.attempt(&format!("Removing volume {} from {}", volume_name, target));

    if !config.volumes.contains_key(volume_name) {
        report.warn(log, format!("volume {} is not in the configuration, nothing to do",
                                 volume_name));
        return report;
    }
    let template_names = match config.resolve_target(target) {
        Ok(names) => names,
        Err(e)    => { report.fail(log, e); return report; }
    };

    for name in &template_names {
        let Some(template) = config.templates.get_mut(name) else { continue; };
        if template.links(volume_name) {
            template.volumes.retain(|v| v != volume_name);
            log.done(&format!("volume {} removed from template {}", volume_name, name));
        } else {
            report.warn(log, format!("volume {} is not linked to template {}",
                                     volume_name, name));
        }
    }

    // Check every template, not just the targets, before deciding whether the volume is gone.
    let remaining = config.volume_references(volume_name);
    if remaining.is_empty() {
        config.volumes.remove(volume_name);
        log.done(&format!("volume {} is no longer linked to any template and has been removed \
                           from the configuration", volume_name));
    } else {
        log.info(&format!("volume {} is still linked to {}", volume_name,
                          plural(remaining.len(), "template")));
    }
    report
}
