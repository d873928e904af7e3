// This is the main file of ngscloud and where execution starts. It mainly handles the CLI and
// then calls into other files to run whichever subcommand the user chose.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use std::path::PathBuf;
use clap::{Parser, Subcommand, crate_version};

mod check;
mod cloud;
mod config;
mod connection;
mod delink;
mod environment;
mod ini;
mod init;
mod link;
mod log;
mod misc;
mod region;
mod report;
mod review;
mod show;
mod store;

#[cfg(test)]
mod tests;

use crate::connection::ConnectionUpdate;
use crate::init::InitSettings;
use crate::misc::config_dir_or_default;
use crate::show::ShowItem;

#[derive(Parser)]
#[clap(name = "ngscloud",
       version = concat!("v", crate_version!()),
       about = "configuration store for EC2 clusters running RNA-seq pipelines")]
#[command(author, version, long_about = None, disable_help_subcommand = true,
          propagate_version = true)]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {

    /// check that volume sections and volume links agree
    Check {
        /// Directory of config files [default: $NGSCLOUD_CONFIG_DIR or ~/.ngscloud/config]
        #[clap(long = "config_dir")]
        config_dir: Option<PathBuf>,

        /// Environment name (required)
        #[clap(short = 'e', long = "environment", required = true)]
        environment: String,
    },

    /// update AWS credentials and contact e-mail
    Connection {
        /// Directory of config files [default: $NGSCLOUD_CONFIG_DIR or ~/.ngscloud/config]
        #[clap(long = "config_dir")]
        config_dir: Option<PathBuf>,

        /// Environment name (required)
        #[clap(short = 'e', long = "environment", required = true)]
        environment: String,

        /// AWS user id
        #[clap(long = "user_id")]
        user_id: Option<String>,

        /// AWS access key id
        #[clap(long = "access_key_id")]
        access_key_id: Option<String>,

        /// AWS secret access key
        #[clap(long = "secret_access_key")]
        secret_access_key: Option<String>,

        /// Contact e-mail address
        #[clap(long = "email")]
        email: Option<String>,

        /// Save the operation's warnings and errors to this YAML file
        #[clap(long = "report")]
        report: Option<PathBuf>,
    },

    /// remove a volume from cluster templates
    Delink {
        /// Directory of config files [default: $NGSCLOUD_CONFIG_DIR or ~/.ngscloud/config]
        #[clap(long = "config_dir")]
        config_dir: Option<PathBuf>,

        /// Environment name (required)
        #[clap(short = 'e', long = "environment", required = true)]
        environment: String,

        /// Cluster template name, or "all" for every template (required)
        #[clap(short = 't', long = "template", required = true)]
        template: String,

        /// Volume name (required)
        #[clap(short = 'v', long = "volume", required = true)]
        volume: String,

        /// Save the operation's warnings and errors to this YAML file
        #[clap(long = "report")]
        report: Option<PathBuf>,
    },

    /// create the configuration of a new environment
    Init {
        /// Directory of config files [default: $NGSCLOUD_CONFIG_DIR or ~/.ngscloud/config]
        #[clap(long = "config_dir")]
        config_dir: Option<PathBuf>,

        /// Environment name (required)
        #[clap(short = 'e', long = "environment", required = true)]
        environment: String,

        /// AWS region, e.g. eu-west-1 (required)
        #[clap(short = 'r', long = "region", required = true)]
        region: String,

        /// AWS zone in the region, e.g. eu-west-1a (required)
        #[clap(short = 'z', long = "zone", required = true)]
        zone: String,

        /// AWS user id (required)
        #[clap(long = "user_id", required = true)]
        user_id: String,

        /// AWS access key id (required)
        #[clap(long = "access_key_id", required = true)]
        access_key_id: String,

        /// AWS secret access key (required)
        #[clap(long = "secret_access_key", required = true)]
        secret_access_key: String,

        /// Contact e-mail address (required)
        #[clap(long = "email", required = true)]
        email: String,

        /// YAML file describing the images and volumes in the cloud (required)
        #[clap(short = 'i', long = "inventory", required = true)]
        inventory: PathBuf,

        /// Save the operation's warnings and errors to this YAML file
        #[clap(long = "report")]
        report: Option<PathBuf>,
    },

    /// link a volume to cluster templates
    Link {
        /// Directory of config files [default: $NGSCLOUD_CONFIG_DIR or ~/.ngscloud/config]
        #[clap(long = "config_dir")]
        config_dir: Option<PathBuf>,

        /// Environment name (required)
        #[clap(short = 'e', long = "environment", required = true)]
        environment: String,

        /// Cluster template name, or "all" for every template (required)
        #[clap(short = 't', long = "template", required = true)]
        template: String,

        /// Absolute path where the volume is mounted on cluster nodes (required)
        #[clap(short = 'm', long = "mount_path", required = true)]
        mount_path: String,

        /// Volume name (required)
        #[clap(short = 'v', long = "volume", required = true)]
        volume: String,

        /// YAML file describing the images and volumes in the cloud (required)
        #[clap(short = 'i', long = "inventory", required = true)]
        inventory: PathBuf,

        /// Save the operation's warnings and errors to this YAML file
        #[clap(long = "report")]
        report: Option<PathBuf>,
    },

    /// change the environment's region and/or zone
    Region {
        /// Directory of config files [default: $NGSCLOUD_CONFIG_DIR or ~/.ngscloud/config]
        #[clap(long = "config_dir")]
        config_dir: Option<PathBuf>,

        /// Environment name (required)
        #[clap(short = 'e', long = "environment", required = true)]
        environment: String,

        /// New AWS region (required)
        #[clap(short = 'r', long = "region", required = true)]
        region: String,

        /// New AWS zone in the region (required)
        #[clap(short = 'z', long = "zone", required = true)]
        zone: String,

        /// YAML file describing the images and volumes in the cloud (required)
        #[clap(short = 'i', long = "inventory", required = true)]
        inventory: PathBuf,

        /// Save the operation's warnings and errors to this YAML file
        #[clap(long = "report")]
        report: Option<PathBuf>,
    },

    /// remove volumes that no longer exist in the cloud
    Review {
        /// Directory of config files [default: $NGSCLOUD_CONFIG_DIR or ~/.ngscloud/config]
        #[clap(long = "config_dir")]
        config_dir: Option<PathBuf>,

        /// Environment name (required)
        #[clap(short = 'e', long = "environment", required = true)]
        environment: String,

        /// AWS zone to look for volumes in [default: the environment's current zone]
        #[clap(short = 'z', long = "zone")]
        zone: Option<String>,

        /// YAML file describing the images and volumes in the cloud (required)
        #[clap(short = 'i', long = "inventory", required = true)]
        inventory: PathBuf,

        /// Save the operation's warnings and errors to this YAML file
        #[clap(long = "report")]
        report: Option<PathBuf>,
    },

    /// print part of an environment's configuration
    Show {
        /// Directory of config files [default: $NGSCLOUD_CONFIG_DIR or ~/.ngscloud/config]
        #[clap(long = "config_dir")]
        config_dir: Option<PathBuf>,

        /// Environment name (required for everything except environments)
        #[clap(short = 'e', long = "environment")]
        environment: Option<String>,

        /// What to show
        #[clap(value_enum)]
        item: ShowItem,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Check { config_dir, environment }) => {
            check::check(config_dir_or_default(config_dir), environment);
        },
        Some(Commands::Connection { config_dir, environment, user_id, access_key_id,
                                    secret_access_key, email, report }) => {
            let update = ConnectionUpdate { user_id, access_key_id, secret_access_key, email };
            connection::connection(config_dir_or_default(config_dir), environment, update, report);
        },
        Some(Commands::Delink { config_dir, environment, template, volume, report }) => {
            delink::delink(config_dir_or_default(config_dir), environment, template, volume,
                           report);
        },
        Some(Commands::Init { config_dir, environment, region, zone, user_id, access_key_id,
                              secret_access_key, email, inventory, report }) => {
            let settings = InitSettings { region, zone, user_id, access_key_id,
                                          secret_access_key, email };
            init::init(config_dir_or_default(config_dir), environment, settings, inventory,
                       report);
        },
        Some(Commands::Link { config_dir, environment, template, mount_path, volume, inventory,
                              report }) => {
            link::link(config_dir_or_default(config_dir), environment, template, mount_path,
                       volume, inventory, report);
        },
        Some(Commands::Region { config_dir, environment, region, zone, inventory, report }) => {
            region::region(config_dir_or_default(config_dir), environment, region, zone,
                           inventory, report);
        },
        Some(Commands::Review { config_dir, environment, zone, inventory, report }) => {
            review::review(config_dir_or_default(config_dir), environment, zone, inventory,
                           report);
        },
        Some(Commands::Show { config_dir, environment, item }) => {
            show::show(config_dir_or_default(config_dir), environment, item);
        },
        None => {}
    }
}
