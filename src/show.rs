// This file contains the code for the ngscloud show subcommand, which prints parts of an
// environment's configuration to stdout.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use clap::ValueEnum;
use std::path::PathBuf;

use crate::config::{format_volume_list, Config};
use crate::environment::{load_environments, EnvironmentList};
use crate::misc::{open_store, quit_with_error};


#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[value(rename_all = "snake_case")]
pub enum ShowItem {
    /// Cluster templates available for linking
    Templates,

    /// The template used to create volumes
    VolumeCreator,

    /// Volumes and where they are mounted
    Volumes,

    /// Volumes linked to each template
    Links,

    /// Every environment in the config directory
    Environments,

    /// Bioinformatics applications
    Apps,
}


pub fn show(config_dir: PathBuf, environment: Option<String>, item: ShowItem) {
    // Listings go to stdout without any narration so they can be piped.
    let lines = if item == ShowItem::Environments {
        match load_environments(&config_dir) {
            Ok(list) => environment_lines(&list),
            Err(e)   => quit_with_error(&e.to_string()),
        }
    } else {
        let Some(environment) = environment else {
            quit_with_error("--environment is required to show this item");
        };
        let store = open_store(&config_dir, &environment);
        let config = store.require_config().unwrap_or_else(|e| quit_with_error(&e.to_string()));
        config_lines(&config, &item)
    };
    for line in lines {
        println!("{}", line);
    }
}


fn config_lines(config: &Config, item: &ShowItem) -> Vec<String> {
    match item {
        ShowItem::Templates     => template_lines(config),
        ShowItem::VolumeCreator => volume_creator_lines(config),
        ShowItem::Volumes       => volume_lines(config),
        ShowItem::Links         => link_lines(config),
        ShowItem::Apps          => app_lines(config),
        ShowItem::Environments  => Vec::new(),
    }
}


fn template_lines(config: &Config) -> Vec<String> {
    config.get_template_names(false).into_iter().map(|name| {
        let template = &config.templates[&name];
        let default = if name == config.global.default_template { "\t(default)" } else { "" };
        format!("{}\t{}{}", name, template.description, default)
    }).collect()
}


fn volume_creator_lines(config: &Config) -> Vec<String> {
    let name = config.volume_creator_name();
    match config.templates.get(&name) {
        Some(template) => vec![format!("{}\t{}", name, template.description)],
        None           => Vec::new(),
    }
}


fn volume_lines(config: &Config) -> Vec<String> {
    config.get_volumes().iter()
        .map(|(name, volume)| format!("{}\t{}\t{}", name, volume.volume_id, volume.mount_path))
        .collect()
}


fn link_lines(config: &Config) -> Vec<String> {
    config.get_template_names(false).into_iter().map(|name| {
        let volumes = config.get_linked_volumes(&name).unwrap_or_default();
        format!("{}\t{}", name, format_volume_list(volumes))
    }).collect()
}


fn app_lines(config: &Config) -> Vec<String> {
    config.apps.iter().map(|(name, app)| format!("{}\t{}\t{}", name, app.version, app.url))
        .collect()
}


fn environment_lines(list: &EnvironmentList) -> Vec<String> {
    match list {
        EnvironmentList::Loaded(names) => names.clone(),
        EnvironmentList::NotInitialized => Vec::new(),
    }
}
