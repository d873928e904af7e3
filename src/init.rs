// This file contains the code for the ngscloud init subcommand, which creates the configuration
// file of a new environment with all of its cluster templates.

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
use crate::config::{AwsCredentials, BioinfoApp, ClusterTemplate, Config, ConfigState,
                    ContactInfo, GlobalSettings, KeyPair, KEY_NAME};
use crate::connection::check_email;
use crate::environment::{add_environment, ConfigContext};
use crate::ini::check_value;
use crate::log::{section_header, explanation, ProgressLog};
use crate::misc::{load_inventory, open_store, plural, quit_with_error};
use crate::region::zone_in_region;
use crate::report::{cli_log, finish_operation, OperationReport};
use crate::store::{ConfigStore, StoreError};


// Instance type, vCPUs, memory (GiB) and use of every template an environment starts with.
const INSTANCE_TYPES: &[(&str, u32, &str, &str)] = &[
    ("t2.micro",    1, "1",    "general purpose"),
    ("t2.small",    1, "2",    "general purpose"),
    ("t2.medium",   2, "4",    "general purpose"),
    ("m3.medium",   1, "3.75", "general purpose"),
    ("m3.large",    2, "7.5",  "general purpose"),
    ("m3.xlarge",   4, "15",   "general purpose"),
    ("m3.2xlarge",  8, "30",   "general purpose"),
    ("c3.large",    2, "3.75", "compute optimized"),
    ("c3.xlarge",   4, "7.5",  "compute optimized"),
    ("c3.2xlarge",  8, "15",   "compute optimized"),
    ("c3.4xlarge", 16, "30",   "compute optimized"),
    ("c3.8xlarge", 32, "60",   "compute optimized"),
    ("r3.large",    2, "15.25", "memory optimized"),
    ("r3.xlarge",   4, "30.5",  "memory optimized"),
    ("r3.2xlarge",  8, "61",    "memory optimized"),
    ("r3.4xlarge", 16, "122",   "memory optimized"),
    ("r3.8xlarge", 32, "244",   "memory optimized"),
];

const DEFAULT_INSTANCE_TYPE: &str = "c3.large";
const VOLUME_CREATOR_INSTANCE_TYPE: (&str, u32, &str) = ("t2.nano", 1, "0.5");

const CLUSTER_USER: &str = "sgeadmin";
const CLUSTER_SHELL: &str = "bash";

// Name, version and download page of the bioinformatics applications ngscloud can install.
const BIOINFO_APPS: &[(&str, &str, &str)] = &[
    ("busco",            "3.0.2",  "https://anaconda.org/bioconda/busco"),
    ("detonate",         "1.11",   "https://anaconda.org/bioconda/detonate"),
    ("fastqc",           "0.11.8", "https://anaconda.org/bioconda/fastqc"),
    ("miniconda3",       "4.5.12", "https://repo.continuum.io/miniconda"),
    ("rnaquast",         "1.5.1",  "https://anaconda.org/bioconda/rnaquast"),
    ("soapdenovo-trans", "1.04",   "https://anaconda.org/bioconda/soapdenovo-trans"),
    ("star",             "2.6.1b", "https://anaconda.org/bioconda/star"),
    ("transabyss",       "2.0.1",  "https://anaconda.org/bioconda/transabyss"),
    ("transrate",        "1.0.3",  "https://anaconda.org/bioconda/transrate"),
    ("trinity",          "2.8.4",  "https://anaconda.org/bioconda/trinity"),
];


/// What a new environment needs that ngscloud can't work out for itself.
#[derive(Clone, Debug)]
pub struct InitSettings {
    pub region: String,
    pub zone: String,
    pub user_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub email: String,
}


pub fn init(config_dir: PathBuf, environment: String, settings: InitSettings, inventory: PathBuf,
            report_file: Option<PathBuf>) {
    let store = open_store(&config_dir, &environment);
    let cloud = load_inventory(&inventory);
    starting_message();
    print_settings(&config_dir, &environment, &settings, &inventory);
    let mut log = cli_log(report_file);
    let report = init_environment(&store, &cloud, &settings, &mut log)
        .unwrap_or_else(|e| quit_with_error(&e.to_string()));
    finish_operation(&report, log);
}


fn starting_message() {
    section_header("Starting ngscloud init");
    explanation("This command creates the configuration of a new environment: AWS connection \
                 data, a key pair, one cluster template per supported instance type, the volume \
                 creator template and the bioinformatics applications.");
}


fn print_settings(config_dir: &Path, environment: &str, settings: &InitSettings,
                  inventory: &Path) {
    eprintln!("Settings:");
    eprintln!("  --config_dir {}", config_dir.display());
    eprintln!("  --environment {}", environment);
    eprintln!("  --region {}", settings.region);
    eprintln!("  --zone {}", settings.zone);
    eprintln!("  --user_id {}", settings.user_id);
    eprintln!("  --access_key_id {}", settings.access_key_id);
    eprintln!("  --secret_access_key ********");
    eprintln!("  --email {}", settings.email);
    eprintln!("  --inventory {}", inventory.display());
    eprintln!();
}


pub fn init_environment(store: &ConfigStore, cloud: &dyn Cloud, settings: &InitSettings,
                        log: &mut ProgressLog) -> Result<OperationReport, StoreError> {
    let mut report = OperationReport::new();
    let context = store.context();
    let _lock = store.lock()?;

    log.attempt(&format!("Creating environment {}", context.environment()));
    if let ConfigState::Loaded(_) = store.load_config()? {
        report.fail(log, format!("environment {} already exists ({})",
                                 context.environment(), store.path().display()));
        return Ok(report);
    }
    if !zone_in_region(&settings.zone, &settings.region) {
        report.fail(log, format!("zone {} is not in region {}", settings.zone, settings.region));
    }
    if let Err(e) = check_email(&settings.email) {
        report.fail(log, e);
    }
    for (name, value) in [("AWS user id", &settings.user_id),
                          ("AWS access key id", &settings.access_key_id),
                          ("AWS secret access key", &settings.secret_access_key)] {
        let value = value.trim();
        if value.is_empty() {
            report.fail(log, format!("{} cannot be empty", name));
        } else if let Err(e) = check_value(value) {
            report.fail(log, format!("{} {}", name, e));
        }
    }
    if !report.success {
        return Ok(report);
    }

    log.attempt(&format!("Looking up the machine image for region {}", settings.region));
    let image_id = match with_retries(&format!("looking up image in {}", settings.region),
                                      || cloud.resolve_image_id(&settings.region)) {
        Ok(Some(image_id)) => image_id,
        Ok(None) => {
            report.fail(log, format!("no machine image is available in region {}",
                                     settings.region));
            return Ok(report);
        }
        Err(e) => {
            report.fail(log, e.to_string());
            return Ok(report);
        }
    };
    log.done(&format!("image {}", image_id));

    let config = new_config(context, settings, &image_id);
    store.save_config(&config)?;
    log.done(&format!("{} written to {}", plural(config.templates.len(), "cluster template"),
                      store.path().display()));
    if add_environment(context.config_dir(), context.environment())? {
        log.done(&format!("environment {} added to the environment list",
                          context.environment()));
    } else {
        log.info(&format!("environment {} was already in the environment list",
                          context.environment()));
    }
    Ok(report)
}


fn new_config(context: &ConfigContext, settings: &InitSettings, image_id: &str) -> Config {
    let env = context.environment();
    let global = GlobalSettings {
        default_template: format!("{}-{}", env, DEFAULT_INSTANCE_TYPE),
        environment: env.to_string(),
        current_region: settings.region.clone(),
        current_zone: settings.zone.clone(),
    };
    let aws = AwsCredentials {
        user_id: settings.user_id.trim().to_string(),
        access_key_id: settings.access_key_id.trim().to_string(),
        secret_access_key: settings.secret_access_key.trim().to_string(),
    };
    let contact = ContactInfo { email: settings.email.trim().to_string() };
    let mut config = Config::new(global, aws, contact);

    let key_location = context.keypair_file(KEY_NAME, &settings.region);
    config.keys.insert(KEY_NAME.to_string(),
                       KeyPair { key_location: key_location.display().to_string() });

    for (instance_type, vcpu, memory, usage) in INSTANCE_TYPES {
        config.templates.insert(format!("{}-{}", env, instance_type),
                                new_template(instance_type, *vcpu, memory, usage, image_id));
    }
    let (instance_type, vcpu, memory) = VOLUME_CREATOR_INSTANCE_TYPE;
    let volume_creator = config.volume_creator_name();
    config.templates.insert(volume_creator,
                            new_template(instance_type, vcpu, memory, "volume creator",
                                         image_id));

    for (name, version, url) in BIOINFO_APPS {
        config.apps.insert(name.to_string(),
                           BioinfoApp { version: version.to_string(), url: url.to_string() });
    }
    config
}


fn new_template(instance_type: &str, vcpu: u32, memory: &str, usage: &str, image_id: &str)
        -> ClusterTemplate {
    ClusterTemplate {
        description: format!("{} - {} vCPU - {} GiB", instance_type, vcpu, memory),
        vcpu: vcpu.to_string(),
        memory: memory.to_string(),
        usage: usage.to_string(),
        generation: "current".to_string(),
        keyname: KEY_NAME.to_string(),
        cluster_size: "1".to_string(),
        cluster_user: CLUSTER_USER.to_string(),
        cluster_shell: CLUSTER_SHELL.to_string(),
        master_image_id: image_id.to_string(),
        master_instance_type: instance_type.to_string(),
        node_image_id: image_id.to_string(),
        node_instance_type: instance_type.to_string(),
        volumes: Vec::new(),
    }
}
