// This file contains the structured result returned by every config-changing operation.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::log::{section_header, ProgressLog};
use crate::misc::quit_with_error;


/// Warnings don't stop an operation. An error means the operation was abandoned and nothing was
/// saved.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OperationReport {
    pub success: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Default for OperationReport {
    fn default() -> Self {
        OperationReport { success: true, warnings: Vec::new(), errors: Vec::new() }
    }
}

impl OperationReport {
    pub fn new() -> Self { Self::default() }

    pub fn warn(&mut self, log: &mut ProgressLog, text: String) {
        log.warning(&text);
        self.warnings.push(text);
    }

    pub fn fail(&mut self, log: &mut ProgressLog, text: String) {
        log.error(&text);
        self.errors.push(text);
        self.success = false;
    }

    pub fn save_to_yaml(&self, filename: &Path) -> io::Result<()> {
        let yaml_string = serde_yaml::to_string(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(filename)?;
        file.write_all(yaml_string.as_bytes())?;
        Ok(())
    }
}


pub fn cli_log(report_file: Option<PathBuf>) -> ProgressLog<'static> {
    // The progress log for subcommands run from the command line: narration goes to stderr and,
    // if asked for, the finished report is saved as YAML.
    ProgressLog::stderr().on_finish(move |report| {
        if let Some(report_file) = report_file {
            if let Err(e) = report.save_to_yaml(&report_file) {
                quit_with_error(&format!("failed to write {}\n{}", report_file.display(), e));
            }
        }
    })
}


pub fn finish_operation(report: &OperationReport, log: ProgressLog) {
    // Shared ending for the config-changing subcommands: run the log's completion callback and
    // then either summarise or quit with the errors.
    log.finish(report);
    if !report.success {
        quit_with_error(&report.errors.join("\n"));
    }
    section_header("Finished!");
    if report.warnings.is_empty() {
        eprintln!("{}", "Configuration updated without warnings".green().bold());
    } else {
        eprintln!("{}", format!("Configuration updated with {} warning{}",
                                report.warnings.len(),
                                if report.warnings.len() == 1 { "" } else { "s" })
                        .yellow().bold());
    }
    eprintln!();
}
