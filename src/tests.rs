// This file contains some high-level tests for ngscloud and functions common to other tests.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use maplit::btreemap;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tempfile::tempdir;

use crate::cloud::{Inventory, InventoryCloud};
use crate::config::{Config, TemplateTarget};
use crate::delink::delink_volume;
use crate::environment::ConfigContext;
use crate::link::link_volume;
use crate::log::ProgressLog;
use crate::region::update_region_zone;
use crate::review::review_links;
use crate::store::ConfigStore;


pub const TEST_IMAGE: &str = "ami-0e1f2a3b";


pub fn make_test_file(file_path: &Path, contents: &str) {
    let mut file = File::create(file_path).unwrap();
    write!(file, "{}", contents).unwrap();
}


fn template_text(name: &str, vcpu: u32, memory: &str, usage: &str, instance_type: &str,
                 volumes: &str) -> String {
    format!("[cluster {}]\n\
             description = {} - {} vCPU - {} GiB\n\
             vcpu = {}\n\
             memory = {}\n\
             use = {}\n\
             generation = current\n\
             keyname = NGScloudKey\n\
             cluster_size = 1\n\
             cluster_user = sgeadmin\n\
             cluster_shell = bash\n\
             master_image_id = {}\n\
             master_instance_type = {}\n\
             node_image_id = {}\n\
             node_instance_type = {}\n\
             volumes = {}\n\n",
            name, instance_type, vcpu, memory, vcpu, memory, usage,
            TEST_IMAGE, instance_type, TEST_IMAGE, instance_type, volumes)
}


pub fn test_config_text(t1_volumes: &str, t2_volumes: &str,
                        volumes: &[(&str, &str, &str)]) -> String {
    // A config for environment "exp" in eu-west-1a with two ordinary templates (T1 and T2), the
    // volume creator and the given volume sections (name, volume id, mount path). The text is
    // in the same form ngscloud writes, so saving it unchanged gives back identical text.
    let mut text = String::new();
    text.push_str("[global]\n\
                   default_template = T1\n\
                   environment = exp\n\
                   current_region = eu-west-1\n\
                   current_zone = eu-west-1a\n\n\
                   [aws info]\n\
                   aws_user_id = 123456789012\n\
                   aws_access_key_id = AKIAEXAMPLE\n\
                   aws_secret_access_key = secretEXAMPLE\n\n\
                   [contact info]\n\
                   email = someone@example.com\n\n\
                   [key NGScloudKey]\n\
                   key_location = /tmp/keypairs/exp-NGScloudKey-eu-west-1.pem\n\n");
    text.push_str(&template_text("T1", 1, "1", "general purpose", "t2.micro", t1_volumes));
    text.push_str(&template_text("T2", 2, "3.75", "compute optimized", "c3.large", t2_volumes));
    text.push_str(&template_text("exp-volume-creator", 1, "0.5", "volume creator", "t2.nano",
                                 ""));
    for (name, volume_id, mount_path) in volumes {
        text.push_str(&format!("[volume {}]\nvolume_id = {}\nmount_path = {}\n\n",
                               name, volume_id, mount_path));
    }
    text.push_str("[bioinfoapp trinity]\n\
                   version = 2.8.5\n\
                   url = https://anaconda.org/bioconda/trinity\n\n");
    text
}


pub fn test_store(config_dir: &Path, text: &str) -> ConfigStore {
    let store = ConfigStore::new(ConfigContext::new(config_dir, "exp").unwrap());
    make_test_file(&store.path(), text);
    store
}


pub fn test_cloud() -> InventoryCloud {
    // Images in two regions, and volumes V1 and V2 in eu-west-1a.
    InventoryCloud::new(Inventory {
        images: btreemap!{"eu-west-1".to_string() => TEST_IMAGE.to_string(),
                          "us-east-1".to_string() => "ami-9a8b7c6d".to_string()},
        volumes: btreemap!{"eu-west-1a".to_string() => btreemap!{
                               "V1".to_string() => "vol-1".to_string(),
                               "V2".to_string() => "vol-2".to_string()},
                           "us-east-1a".to_string() => btreemap!{
                               "V1".to_string() => "vol-us-1".to_string()}},
    })
}


pub fn quiet_log() -> ProgressLog<'static> {
    ProgressLog::new(io::sink())
}


fn assert_existence_invariant(config: &Config) {
    // A volume section exists if and only if some template links to it.
    assert!(config.integrity_problems().is_empty(), "{:?}", config.integrity_problems());
}


#[test]
fn test_link_delink_scenario() {
    let dir = tempdir().unwrap();
    let store = test_store(dir.path(), &test_config_text("", "", &[]));
    let cloud = test_cloud();
    let mut log = quiet_log();

    let report = link_volume(&store, &cloud, &TemplateTarget::All, "/mnt/data", "V1",
                             &mut log).unwrap();
    assert!(report.success);
    let config = store.require_config().unwrap();
    assert_eq!(config.get_linked_volumes("T1").unwrap(), &["V1"]);
    assert_eq!(config.get_linked_volumes("T2").unwrap(), &["V1"]);
    assert!(config.get_linked_volumes("exp-volume-creator").unwrap().is_empty());
    assert_eq!(config.volumes["V1"].mount_path, "/mnt/data");
    assert_eq!(config.volumes["V1"].volume_id, "vol-1");
    assert_existence_invariant(&config);

    delink_volume(&store, &TemplateTarget::parse("T1"), "V1", &mut log).unwrap();
    let config = store.require_config().unwrap();
    assert!(config.get_linked_volumes("T1").unwrap().is_empty());
    assert_eq!(config.get_linked_volumes("T2").unwrap(), &["V1"]);
    assert!(config.volumes.contains_key("V1"));
    assert_existence_invariant(&config);

    delink_volume(&store, &TemplateTarget::parse("T2"), "V1", &mut log).unwrap();
    let config = store.require_config().unwrap();
    assert!(!config.volumes.contains_key("V1"));
    assert_existence_invariant(&config);
}


#[test]
fn test_invariant_over_operation_sequence() {
    let dir = tempdir().unwrap();
    let store = test_store(dir.path(), &test_config_text("", "", &[]));
    let cloud = test_cloud();
    let mut log = quiet_log();
    let t1 = TemplateTarget::parse("T1");
    let t2 = TemplateTarget::parse("T2");

    link_volume(&store, &cloud, &t1, "/mnt/a", "V1", &mut log).unwrap();
    assert_existence_invariant(&store.require_config().unwrap());
    link_volume(&store, &cloud, &t2, "/mnt/b", "V2", &mut log).unwrap();
    assert_existence_invariant(&store.require_config().unwrap());
    link_volume(&store, &cloud, &t2, "/mnt/b", "V1", &mut log).unwrap();  // wrong path, rejected
    assert_existence_invariant(&store.require_config().unwrap());
    delink_volume(&store, &TemplateTarget::All, "V2", &mut log).unwrap();
    assert_existence_invariant(&store.require_config().unwrap());
    link_volume(&store, &cloud, &TemplateTarget::All, "/mnt/b", "V2", &mut log).unwrap();
    assert_existence_invariant(&store.require_config().unwrap());
    review_links(&store, &cloud, "eu-west-1a", &mut log).unwrap();
    assert_existence_invariant(&store.require_config().unwrap());
    update_region_zone(&store, &cloud, "us-east-1", "us-east-1a", &mut log).unwrap();
    let config = store.require_config().unwrap();
    assert_existence_invariant(&config);
    assert!(config.volumes.is_empty());
}


#[test]
fn test_hand_edited_numbers_survive_link() {
    let dir = tempdir().unwrap();
    let text = test_config_text("", "", &[]).replace("vcpu = 2\n", "vcpu = 02\n");
    let store = test_store(dir.path(), &text);
    link_volume(&store, &test_cloud(), &TemplateTarget::parse("T1"), "/mnt/a", "V1",
                &mut quiet_log()).unwrap();
    let after = std::fs::read_to_string(store.path()).unwrap();
    assert!(after.contains("vcpu = 02\n"));
    assert!(after.contains("volumes = V1\n"));
}
