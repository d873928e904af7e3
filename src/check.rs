// This file contains the code for the ngscloud check subcommand, which looks for volume sections
// and volume links that disagree with each other.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::log::{section_header, explanation};
use crate::misc::{open_store, plural, quit_with_error};


pub fn check(config_dir: PathBuf, environment: String) {
    let store = open_store(&config_dir, &environment);
    starting_message();
    print_settings(&config_dir, &environment);
    let config = store.require_config().unwrap_or_else(|e| quit_with_error(&e.to_string()));
    let problems = all_problems(&config);
    for problem in &problems {
        eprintln!("  {} {}", "PROBLEM:".red().bold(), problem);
    }
    if !problems.is_empty() {
        quit_with_error(&format!("{} found, run ngscloud review to repair links",
                                 plural(problems.len(), "problem")));
    }
    section_header("Finished!");
    eprintln!("{}", format!("{} is consistent", store.path().display()).green().bold());
    eprintln!();
}


fn starting_message() {
    section_header("Starting ngscloud check");
    explanation("This command checks that every volume in the configuration is linked to at \
                 least one cluster template and that every linked volume has a configuration.");
}


fn print_settings(config_dir: &Path, environment: &str) {
    eprintln!("Settings:");
    eprintln!("  --config_dir {}", config_dir.display());
    eprintln!("  --environment {}", environment);
    eprintln!();
}


fn all_problems(config: &Config) -> Vec<String> {
    let mut problems = config.integrity_problems();
    if !config.templates.contains_key(&config.global.default_template) {
        problems.push(format!("default template {} does not exist",
                              config.global.default_template));
    }
    for (name, template) in &config.templates {
        if !config.keys.contains_key(&template.keyname) {
            problems.push(format!("template {} uses key {} which has no [key {}] section",
                                  name, template.keyname, template.keyname));
        }
    }
    problems
}
