// This file contains functions for writing ngscloud's stderr output: section headers,
// explanations and the running progress log of config-changing operations.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use chrono::Local;
use colored::Colorize;
use std::io::{self, Write};
use textwrap::fill;

use crate::report::OperationReport;


pub fn section_header(text: &str) {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let date = format!("({})", now);
    eprintln!();
    eprintln!("{} {}", text.bold().bright_yellow().underline(), date.dimmed());
}


pub fn explanation(text: &str) {
    let width = match term_size::dimensions() {
        Some((w, _)) => w.min(100),
        None         => 80,
    };
    eprintln!("{}", fill(text, width).dimmed());
    eprintln!();
}


/// An append-only text sink that operations narrate their progress into: first what is being
/// attempted, then how it went. The CLI points it at stderr, tests at a buffer.
pub struct ProgressLog<'a> {
    out: Box<dyn Write + 'a>,
    on_finish: Option<Box<dyn FnOnce(&OperationReport) + 'a>>,
}

impl<'a> ProgressLog<'a> {
    pub fn new<W: Write + 'a>(out: W) -> Self {
        ProgressLog { out: Box::new(out), on_finish: None }
    }

    pub fn stderr() -> ProgressLog<'static> {
        ProgressLog::new(io::stderr())
    }

    /// Sets a callback to run once the operation's report is complete (see finish).
    pub fn on_finish<F: FnOnce(&OperationReport) + 'a>(mut self, callback: F) -> Self {
        self.on_finish = Some(Box::new(callback));
        self
    }

    pub fn attempt(&mut self, text: &str) {
        self.line(&format!("{}...", text));
    }

    pub fn done(&mut self, text: &str) {
        self.line(&format!("  {} {}", "ok".green(), text));
    }

    pub fn info(&mut self, text: &str) {
        self.line(&format!("  {}", text));
    }

    pub fn warning(&mut self, text: &str) {
        self.line(&format!("  {} {}", "WARNING:".yellow(), text));
    }

    pub fn error(&mut self, text: &str) {
        self.line(&format!("  {} {}", "ERROR:".red().bold(), text));
    }

    pub fn finish(mut self, report: &OperationReport) {
        if let Some(callback) = self.on_finish.take() {
            callback(report);
        }
    }

    fn line(&mut self, text: &str) {
        // A broken log sink shouldn't stop a config change half way.
        let _ = writeln!(self.out, "{}", text);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_progress_log() {
        let mut buffer = Vec::new();
        {
            let mut log = ProgressLog::new(&mut buffer);
            log.attempt("Linking V1 to T1");
            log.done("V1 linked to T1");
            log.warning("V1 is already linked to T2");
            log.error("something broke");
        }
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Linking V1 to T1...");
        assert!(lines[1].contains("V1 linked to T1"));
        assert!(lines[2].contains("WARNING:"));
        assert!(lines[3].contains("something broke"));
    }

    #[test]
    fn test_finish_callback() {
        let calls = Cell::new(0);
        let mut report = OperationReport::new();
        report.errors.push("x".to_string());
        let log = ProgressLog::new(io::sink()).on_finish(|r| {
            assert_eq!(r.errors, vec!["x"]);
            calls.set(calls.get() + 1);
        });
        log.finish(&report);
        assert_eq!(calls.get(), 1);

        ProgressLog::new(io::sink()).finish(&report);  // no callback is fine
    }
}
