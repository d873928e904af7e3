// This file contains miscellaneous functions used by various parts of ngscloud.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cloud::InventoryCloud;
use crate::environment::{default_config_dir, ConfigContext};
use crate::store::ConfigStore;


pub fn check_if_file_exists(filename: &Path) {
    // Quits with an error if the given path is not an existing file.
    if !filename.exists() {
        quit_with_error(&format!("file does not exist: {}", filename.display()));
    }
    if !filename.is_file() {
        quit_with_error(&format!("{} is not a file", filename.display()));
    }
}


pub fn check_if_dir_is_not_dir(dir: &Path) {
    // Quits with an error if the given path exists but is not a directory (not existing is okay).
    if dir.exists() && !dir.is_dir() {
        quit_with_error(&format!("{} exists but is not a directory", dir.display()));
    }
}


#[cfg(not(test))]
pub fn quit_with_error(text: &str) -> ! {
    // For friendly error messages, this function normally just prints the error and quits.
    eprintln!();
    eprintln!("Error: {}", text);
    std::process::exit(1);
}
#[cfg(test)]
pub fn quit_with_error(text: &str) -> ! {
    // But when running unit tests, this function instead panics so I can catch it for the test.
    panic!("{}", text);
}


pub fn config_dir_or_default(config_dir: Option<PathBuf>) -> PathBuf {
    let config_dir = config_dir.unwrap_or_else(default_config_dir);
    check_if_dir_is_not_dir(&config_dir);
    config_dir
}


pub fn open_store(config_dir: &Path, environment: &str) -> ConfigStore {
    match ConfigContext::new(config_dir, environment) {
        Ok(context) => ConfigStore::new(context),
        Err(e)      => quit_with_error(&e),
    }
}


pub fn load_inventory(inventory: &Path) -> InventoryCloud {
    check_if_file_exists(inventory);
    InventoryCloud::from_yaml_file(inventory).unwrap_or_else(|e| quit_with_error(&e.to_string()))
}


pub fn plural(count: usize, word: &str) -> String {
    if count == 1 { format!("{} {}", count, word) } else { format!("{} {}s", count, word) }
}


pub fn spinner(message: &str) -> ProgressBar {
    if cfg!(test) {
        ProgressBar::hidden() // don't show a spinner during unit tests
    } else {
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])  // dots3 from github.com/sindresorhus/cli-spinners
                .template("{spinner} {msg}").unwrap(),
        );
        pb.set_message(message.to_string());
        pb
    }
}
