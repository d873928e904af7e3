// This file contains the code for the ngscloud connection subcommand, which updates the AWS
// credentials and contact e-mail address of an environment.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::ini::check_value;
use crate::log::{section_header, explanation, ProgressLog};
use crate::misc::{open_store, quit_with_error};
use crate::report::{cli_log, finish_operation, OperationReport};
use crate::store::{ConfigStore, StoreError};


#[derive(Clone, Debug, Default)]
pub struct ConnectionUpdate {
    pub user_id: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub email: Option<String>,
}

impl ConnectionUpdate {
    fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.access_key_id.is_none() &&
            self.secret_access_key.is_none() && self.email.is_none()
    }
}


pub fn connection(config_dir: PathBuf, environment: String, update: ConnectionUpdate,
                  report_file: Option<PathBuf>) {
    let store = open_store(&config_dir, &environment);
    starting_message();
    print_settings(&config_dir, &environment, &update);
    let mut log = cli_log(report_file);
    let report = update_connection(&store, &update, &mut log)
        .unwrap_or_else(|e| quit_with_error(&e.to_string()));
    finish_operation(&report, log);
}


fn starting_message() {
    section_header("Starting ngscloud connection");
    explanation("This command updates the AWS credentials that ngscloud connects with and the \
                 contact e-mail address of the environment. Settings that aren't given are \
                 left as they are.");
}


fn print_settings(config_dir: &Path, environment: &str, update: &ConnectionUpdate) {
    eprintln!("Settings:");
    eprintln!("  --config_dir {}", config_dir.display());
    eprintln!("  --environment {}", environment);
    if let Some(user_id) = &update.user_id {
        eprintln!("  --user_id {}", user_id);
    }
    if let Some(access_key_id) = &update.access_key_id {
        eprintln!("  --access_key_id {}", access_key_id);
    }
    if update.secret_access_key.is_some() {
        eprintln!("  --secret_access_key ********");
    }
    if let Some(email) = &update.email {
        eprintln!("  --email {}", email);
    }
    eprintln!();
}


pub fn update_connection(store: &ConfigStore, update: &ConnectionUpdate, log: &mut ProgressLog)
        -> Result<OperationReport, StoreError> {
    store.modify(|config| apply_connection(config, update, log))
}


fn apply_connection(config: &mut Config, update: &ConnectionUpdate, log: &mut ProgressLog)
        -> OperationReport {
    let mut report = OperationReport::new();
    log.attempt("Updating connection data");

    if update.is_empty() {
        report.fail(log, "no connection settings were given".to_string());
        return report;
    }
    for (name, value) in [("AWS user id", &update.user_id),
                          ("AWS access key id", &update.access_key_id),
                          ("AWS secret access key", &update.secret_access_key)] {
        let Some(value) = value.as_deref().map(str::trim) else { continue; };
        if value.is_empty() {
            report.fail(log, format!("{} cannot be empty", name));
        } else if let Err(e) = check_value(value) {
            report.fail(log, format!("{} {}", name, e));
        }
    }
    if let Some(email) = &update.email {
        if let Err(e) = check_email(email) {
            report.fail(log, e);
        }
    }
    if !report.success {
        return report;
    }

    if let Some(user_id) = &update.user_id {
        config.aws.user_id = user_id.trim().to_string();
        log.done("AWS user id updated");
    }
    if let Some(access_key_id) = &update.access_key_id {
        config.aws.access_key_id = access_key_id.trim().to_string();
        log.done("AWS access key id updated");
    }
    if let Some(secret_access_key) = &update.secret_access_key {
        config.aws.secret_access_key = secret_access_key.trim().to_string();
        log.done("AWS secret access key updated");
    }
    if let Some(email) = &update.email {
        config.contact.email = email.trim().to_string();
        log.done(&format!("contact e-mail is now {}", config.contact.email));
    }
    report
}


pub fn check_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    check_value(email).map_err(|e| format!("e-mail address {:?} {}", email, e))?;
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(format!("'{}' is not a valid e-mail address", email)),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::read_to_string;
    use tempfile::tempdir;
    use crate::tests::{quiet_log, test_config_text, test_store};

    #[test]
    fn test_check_email() {
        assert!(check_email("someone@example.com").is_ok());
        assert!(check_email(" someone@example.com ").is_ok());
        assert!(check_email("someone").is_err());
        assert!(check_email("@example.com").is_err());
        assert!(check_email("someone@").is_err());
        assert_eq!(check_email("someone@example.com\n[global]").unwrap_err(),
                   "e-mail address \"someone@example.com\\n[global]\" contains a line break");
    }

    #[test]
    fn test_update_some_fields() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path(), &test_config_text("", "", &[]));
        let update = ConnectionUpdate { access_key_id: Some("AKIANEW".to_string()),
                                        email: Some("other@example.org".to_string()),
                                        ..Default::default() };
        let report = update_connection(&store, &update, &mut quiet_log()).unwrap();
        assert!(report.success);
        let config = store.require_config().unwrap();
        assert_eq!(config.aws.access_key_id, "AKIANEW");
        assert_eq!(config.aws.user_id, "123456789012");
        assert_eq!(config.aws.secret_access_key, "secretEXAMPLE");
        assert_eq!(config.contact.email, "other@example.org");
    }

    #[test]
    fn test_nothing_to_update() {
        let dir = tempdir().unwrap();
        let text = test_config_text("", "", &[]);
        let store = test_store(dir.path(), &text);
        let report = update_connection(&store, &ConnectionUpdate::default(),
                                       &mut quiet_log()).unwrap();
        assert!(!report.success);
        assert_eq!(read_to_string(store.path()).unwrap(), text);
    }

    #[test]
    fn test_line_breaks_change_nothing() {
        let dir = tempdir().unwrap();
        let text = test_config_text("", "", &[]);
        let store = test_store(dir.path(), &text);
        let update = ConnectionUpdate { access_key_id: Some("AKIA\nNEW".to_string()),
                                        email: Some("a@b.org\n[aws info]".to_string()),
                                        ..Default::default() };
        let report = update_connection(&store, &update, &mut quiet_log()).unwrap();
        assert!(!report.success);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.contains(&"AWS access key id contains a line break".to_string()));
        assert_eq!(read_to_string(store.path()).unwrap(), text);
    }

    #[test]
    fn test_bad_values_change_nothing() {
        let dir = tempdir().unwrap();
        let text = test_config_text("", "", &[]);
        let store = test_store(dir.path(), &text);
        let update = ConnectionUpdate { user_id: Some("999".to_string()),
                                        secret_access_key: Some("  ".to_string()),
                                        email: Some("nobody".to_string()),
                                        ..Default::default() };
        let report = update_connection(&store, &update, &mut quiet_log()).unwrap();
        assert!(!report.success);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(read_to_string(store.path()).unwrap(), text);
    }
}
