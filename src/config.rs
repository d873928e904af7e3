// This file contains the typed model of an ngscloud config file. The INI document is parsed once
// into a Config, with every format problem collected up front, and the rest of ngscloud works on
// the Config.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::ini::{OptionMap, Section};


pub const GLOBAL_SECTION: &str = "global";
pub const AWS_SECTION: &str = "aws info";
pub const CONTACT_SECTION: &str = "contact info";
pub const KEY_PREFIX: &str = "key ";
pub const CLUSTER_PREFIX: &str = "cluster ";
pub const VOLUME_PREFIX: &str = "volume ";
pub const APP_PREFIX: &str = "bioinfoapp ";

pub const KEY_NAME: &str = "NGScloudKey";


#[derive(Clone, Debug, PartialEq)]
pub struct GlobalSettings {
    pub default_template: String,
    pub environment: String,
    pub current_region: String,
    pub current_zone: String,
}


#[derive(Clone, Debug, PartialEq)]
pub struct AwsCredentials {
    pub user_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}


#[derive(Clone, Debug, PartialEq)]
pub struct ContactInfo {
    pub email: String,
}


#[derive(Clone, Debug, PartialEq)]
pub struct KeyPair {
    pub key_location: String,
}


#[derive(Clone, Debug, PartialEq)]
pub struct ClusterTemplate {
    pub description: String,
    pub vcpu: String,  // whole number, checked on load but kept as written
    pub memory: String,  // GiB, checked to be numeric but kept as written
    pub usage: String,
    pub generation: String,
    pub keyname: String,
    pub cluster_size: String,  // whole number, as vcpu
    pub cluster_user: String,
    pub cluster_shell: String,
    pub master_image_id: String,
    pub master_instance_type: String,
    pub node_image_id: String,
    pub node_instance_type: String,
    pub volumes: Vec<String>,
}

impl ClusterTemplate {
    pub fn links(&self, volume_name: &str) -> bool {
        self.volumes.iter().any(|v| v == volume_name)
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    pub volume_id: String,
    pub mount_path: String,
}


#[derive(Clone, Debug, PartialEq)]
pub struct BioinfoApp {
    pub version: String,
    pub url: String,
}


/// What is on disk for an environment. A missing (or blank) config file is NotInitialized,
/// which is deliberately different from a Config that happens to have no templates.
#[derive(Debug)]
pub enum ConfigState {
    NotInitialized,
    Loaded(Config),
}


/// Which templates a link/delink applies to.
#[derive(Clone, Debug, PartialEq)]
pub enum TemplateTarget {
    All,
    Named(String),
}

impl TemplateTarget {
    pub fn parse(text: &str) -> Self {
        if text.eq_ignore_ascii_case("all") { TemplateTarget::All }
                                       else { TemplateTarget::Named(text.to_string()) }
    }

    pub fn as_arg(&self) -> &str {
        match self {
            TemplateTarget::All         => "all",
            TemplateTarget::Named(name) => name,
        }
    }
}

impl fmt::Display for TemplateTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TemplateTarget::All         => write!(f, "all templates"),
            TemplateTarget::Named(name) => write!(f, "template {}", name),
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub global: GlobalSettings,
    pub aws: AwsCredentials,
    pub contact: ContactInfo,
    pub keys: BTreeMap<String, KeyPair>,
    pub templates: BTreeMap<String, ClusterTemplate>,
    pub volumes: BTreeMap<String, Volume>,
    pub apps: BTreeMap<String, BioinfoApp>,

    // Sections and keys that ngscloud doesn't model. They are carried along so that saving a
    // loaded config never loses anything.
    unmodelled: OptionMap,
}

impl Config {
    pub fn new(global: GlobalSettings, aws: AwsCredentials, contact: ContactInfo) -> Self {
        Config {
            global, aws, contact,
            keys: BTreeMap::new(),
            templates: BTreeMap::new(),
            volumes: BTreeMap::new(),
            apps: BTreeMap::new(),
            unmodelled: OptionMap::new(),
        }
    }

    pub fn from_options(options: &OptionMap) -> Result<Self, Vec<String>> {
        let mut problems = Vec::new();
        let mut unmodelled = OptionMap::new();

        let empty = Section::new();
        for name in [GLOBAL_SECTION, AWS_SECTION, CONTACT_SECTION] {
            if options.section(name).is_none() {
                problems.push(format!("missing [{}] section", name));
            }
        }

        let mut r = SectionReader::new(GLOBAL_SECTION,
                                       options.section(GLOBAL_SECTION).unwrap_or(&empty));
        let global = GlobalSettings {
            default_template: r.string("default_template", &mut problems),
            environment: r.string("environment", &mut problems),
            current_region: r.string("current_region", &mut problems),
            current_zone: r.string("current_zone", &mut problems),
        };
        r.finish(&mut unmodelled);

        let mut r = SectionReader::new(AWS_SECTION,
                                       options.section(AWS_SECTION).unwrap_or(&empty));
        let aws = AwsCredentials {
            user_id: r.string("aws_user_id", &mut problems),
            access_key_id: r.string("aws_access_key_id", &mut problems),
            secret_access_key: r.string("aws_secret_access_key", &mut problems),
        };
        r.finish(&mut unmodelled);

        let mut r = SectionReader::new(CONTACT_SECTION,
                                       options.section(CONTACT_SECTION).unwrap_or(&empty));
        let contact = ContactInfo { email: r.string("email", &mut problems) };
        r.finish(&mut unmodelled);

        let mut config = Config::new(global, aws, contact);

        for (name, section) in options.with_prefix(KEY_PREFIX) {
            let mut r = SectionReader::new(&format!("{}{}", KEY_PREFIX, name), section);
            let key = KeyPair { key_location: r.string("key_location", &mut problems) };
            r.finish(&mut unmodelled);
            config.keys.insert(name.to_string(), key);
        }

        for (name, section) in options.with_prefix(CLUSTER_PREFIX) {
            let full_name = format!("{}{}", CLUSTER_PREFIX, name);
            let mut r = SectionReader::new(&full_name, section);
            let template = ClusterTemplate {
                description: r.string("description", &mut problems),
                vcpu: r.number("vcpu", &mut problems),
                memory: r.string("memory", &mut problems),
                usage: r.string("use", &mut problems),
                generation: r.string("generation", &mut problems),
                keyname: r.string("keyname", &mut problems),
                cluster_size: r.number("cluster_size", &mut problems),
                cluster_user: r.string("cluster_user", &mut problems),
                cluster_shell: r.string("cluster_shell", &mut problems),
                master_image_id: r.string("master_image_id", &mut problems),
                master_instance_type: r.string("master_instance_type", &mut problems),
                node_image_id: r.string("node_image_id", &mut problems),
                node_instance_type: r.string("node_instance_type", &mut problems),
                volumes: parse_volume_list(&r.string("volumes", &mut problems)),
            };
            r.finish(&mut unmodelled);
            if !template.memory.is_empty() && template.memory.parse::<f64>().is_err() {
                problems.push(format!("[{}] memory must be a number, found '{}'",
                                      full_name, template.memory));
            }
            let mut seen = HashSet::new();
            for volume in &template.volumes {
                if !seen.insert(volume) {
                    problems.push(format!("[{}] lists volume {} more than once",
                                          full_name, volume));
                }
            }
            config.templates.insert(name.to_string(), template);
        }

        for (name, section) in options.with_prefix(VOLUME_PREFIX) {
            let mut r = SectionReader::new(&format!("{}{}", VOLUME_PREFIX, name), section);
            let volume = Volume {
                volume_id: r.string("volume_id", &mut problems),
                mount_path: r.string("mount_path", &mut problems),
            };
            r.finish(&mut unmodelled);
            config.volumes.insert(name.to_string(), volume);
        }

        for (name, section) in options.with_prefix(APP_PREFIX) {
            let mut r = SectionReader::new(&format!("{}{}", APP_PREFIX, name), section);
            let app = BioinfoApp {
                version: r.string("version", &mut problems),
                url: r.string("url", &mut problems),
            };
            r.finish(&mut unmodelled);
            config.apps.insert(name.to_string(), app);
        }

        for (name, section) in options.sections() {
            if !is_modelled_section(name) {
                unmodelled.insert_section(name, section.clone());
            }
        }
        config.unmodelled = unmodelled;

        if problems.is_empty() { Ok(config) } else { Err(problems) }
    }

    pub fn to_options(&self) -> OptionMap {
        let mut map = OptionMap::new();

        let g = &self.global;
        map.set(GLOBAL_SECTION, "default_template", &g.default_template);
        map.set(GLOBAL_SECTION, "environment", &g.environment);
        map.set(GLOBAL_SECTION, "current_region", &g.current_region);
        map.set(GLOBAL_SECTION, "current_zone", &g.current_zone);

        map.set(AWS_SECTION, "aws_user_id", &self.aws.user_id);
        map.set(AWS_SECTION, "aws_access_key_id", &self.aws.access_key_id);
        map.set(AWS_SECTION, "aws_secret_access_key", &self.aws.secret_access_key);

        map.set(CONTACT_SECTION, "email", &self.contact.email);

        for (name, key) in &self.keys {
            map.set(&format!("{}{}", KEY_PREFIX, name), "key_location", &key.key_location);
        }

        for (name, t) in &self.templates {
            let section = format!("{}{}", CLUSTER_PREFIX, name);
            map.set(&section, "description", &t.description);
            map.set(&section, "vcpu", &t.vcpu);
            map.set(&section, "memory", &t.memory);
            map.set(&section, "use", &t.usage);
            map.set(&section, "generation", &t.generation);
            map.set(&section, "keyname", &t.keyname);
            map.set(&section, "cluster_size", &t.cluster_size);
            map.set(&section, "cluster_user", &t.cluster_user);
            map.set(&section, "cluster_shell", &t.cluster_shell);
            map.set(&section, "master_image_id", &t.master_image_id);
            map.set(&section, "master_instance_type", &t.master_instance_type);
            map.set(&section, "node_image_id", &t.node_image_id);
            map.set(&section, "node_instance_type", &t.node_instance_type);
            map.set(&section, "volumes", &format_volume_list(&t.volumes));
        }

        for (name, v) in &self.volumes {
            let section = format!("{}{}", VOLUME_PREFIX, name);
            map.set(&section, "volume_id", &v.volume_id);
            map.set(&section, "mount_path", &v.mount_path);
        }

        for (name, app) in &self.apps {
            let section = format!("{}{}", APP_PREFIX, name);
            map.set(&section, "version", &app.version);
            map.set(&section, "url", &app.url);
        }

        // Leftover keys of a modelled section only come back if that section still exists
        // (e.g. a deleted volume must stay deleted).
        for (name, section) in self.unmodelled.sections() {
            if is_modelled_section(name) && map.section(name).is_none() {
                continue;
            }
            for (key, value) in section.iter() {
                map.set(name, key, value);
            }
        }
        map
    }

    pub fn volume_creator_name(&self) -> String {
        format!("{}-volume-creator", self.global.environment)
    }

    pub fn is_volume_creator(&self, template_name: &str) -> bool {
        template_name == self.volume_creator_name()
    }

    pub fn get_template_names(&self, include_volume_creator: bool) -> Vec<String> {
        // BTreeMap keys are already in lexicographic order.
        self.templates.keys()
            .filter(|name| include_volume_creator || !self.is_volume_creator(name))
            .cloned().collect()
    }

    pub fn get_volumes(&self) -> &BTreeMap<String, Volume> {
        &self.volumes
    }

    pub fn get_linked_volumes(&self, template_name: &str) -> Option<&[String]> {
        self.templates.get(template_name).map(|t| t.volumes.as_slice())
    }

    pub fn resolve_target(&self, target: &TemplateTarget) -> Result<Vec<String>, String> {
        // The volume creator never takes part in linking, so it can't be a target.
        match target {
            TemplateTarget::All => Ok(self.get_template_names(false)),
            TemplateTarget::Named(name) => {
                if self.is_volume_creator(name) {
                    Err(format!("{} is the volume creator template and cannot have linked \
                                 volumes", name))
                } else if !self.templates.contains_key(name) {
                    Err(format!("template {} does not exist", name))
                } else {
                    Ok(vec![name.clone()])
                }
            }
        }
    }

    pub fn volume_references(&self, volume_name: &str) -> Vec<String> {
        // Names of all templates (volume creator included) whose volumes list the given volume.
        self.templates.iter().filter(|(_, t)| t.links(volume_name))
            .map(|(name, _)| name.clone()).collect()
    }

    pub fn integrity_problems(&self) -> Vec<String> {
        // A volume section should exist if and only if some template links to it.
        let mut problems = Vec::new();
        for name in self.volumes.keys() {
            if self.volume_references(name).is_empty() {
                problems.push(format!("volume {} is not linked to any template", name));
            }
        }
        for (template_name, template) in &self.templates {
            for volume in &template.volumes {
                if !self.volumes.contains_key(volume) {
                    problems.push(format!("template {} links to volume {} which has no \
                                           [volume {}] section", template_name, volume, volume));
                }
            }
        }
        problems
    }
}


pub fn parse_volume_list(text: &str) -> Vec<String> {
    text.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).map(|s| s.to_string()).collect()
}


pub fn format_volume_list(volumes: &[String]) -> String {
    volumes.join(", ")
}


fn is_modelled_section(name: &str) -> bool {
    name == GLOBAL_SECTION || name == AWS_SECTION || name == CONTACT_SECTION ||
        [KEY_PREFIX, CLUSTER_PREFIX, VOLUME_PREFIX, APP_PREFIX].iter().any(|p| name.starts_with(p))
}


// Takes keys out of a copy of one section, recording a problem for each missing or malformed
// value. Whatever is left at the end goes to the unmodelled map.
struct SectionReader {
    name: String,
    remaining: Section,
}

impl SectionReader {
    fn new(name: &str, section: &Section) -> Self {
        SectionReader { name: name.to_string(), remaining: section.clone() }
    }

    fn string(&mut self, key: &str, problems: &mut Vec<String>) -> String {
        match self.remaining.remove(key) {
            Some(value) => value,
            None => {
                problems.push(format!("[{}] is missing {}", self.name, key));
                String::new()
            }
        }
    }

    fn number(&mut self, key: &str, problems: &mut Vec<String>) -> String {
        let Some(value) = self.remaining.remove(key) else {
            problems.push(format!("[{}] is missing {}", self.name, key));
            return String::new();
        };
        if value.parse::<u32>().is_err() {
            problems.push(format!("[{}] {} must be a whole number, found '{}'",
                                  self.name, key, value));
        }
        value
    }

    fn finish(self, unmodelled: &mut OptionMap) {
        if !self.remaining.is_empty() {
            unmodelled.insert_section(&self.name, self.remaining);
        }
    }
}
