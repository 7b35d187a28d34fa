//! Command-line interface definitions for the `packet-tester` binary.
//!
//! This module only depends on clap so the build script can include it
//! verbatim when generating the manual page. Semantic validation lives in
//! [`crate::config`].

use clap::Parser;

/// Environment variable consulted when `--api_key` is omitted.
pub const API_KEY_ENV: &str = "PACKET_TOKEN";

/// Environment variable consulted when `--org_id` is omitted.
pub const ORG_ID_ENV: &str = "PACKET_ORG_ID";

/// Project name used when `--project_name` is omitted.
pub const DEFAULT_PROJECT_NAME: &str = "packet_device_tester";

/// Usage synopsis printed alongside argument errors.
pub const USAGE: &str = concat!(
    "Usage: packet-tester --facility <facility_list> --plan <device_plan> --os <operating_system>\n",
    "                     [--quantity <number>] [--api_key <api_key>] [--org_id <org_id>]\n",
    "                     [--project_name <project_name>] [--poll_interval <seconds>]\n",
    "                     [--max_wait <seconds>]",
);

/// Raw arguments accepted by `packet-tester`.
///
/// Required values are modelled as options so that missing flags surface as
/// the tool's own usage error rather than clap's.
#[derive(Clone, Debug, Default, Parser)]
#[command(
    name = "packet-tester",
    version,
    about = "Provision Packet devices, time how long they take to become active, then tear them down"
)]
pub struct Cli {
    /// List of facilities to deploy servers. Example: ewr1,sjc1
    #[arg(long = "facility", value_name = "FACILITY_LIST")]
    pub facility: Option<String>,
    /// Device plan to deploy. Example: c3.small.x86
    #[arg(long = "plan", value_name = "PLAN")]
    pub plan: Option<String>,
    /// Operating system to deploy on the device. Example: ubuntu_18_04
    #[arg(long = "os", value_name = "OS")]
    pub os: Option<String>,
    /// Number of devices to deploy per facility. Example: 100
    #[arg(long = "quantity", value_name = "NUMBER", default_value = "1")]
    pub quantity: String,
    /// Packet API key.
    #[arg(long = "api_key", value_name = "API_KEY", env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,
    /// Packet organization ID.
    #[arg(long = "org_id", value_name = "ORG_ID", env = ORG_ID_ENV)]
    pub org_id: Option<String>,
    /// Project name to be created. Example: my-best-project
    #[arg(long = "project_name", value_name = "NAME", default_value = DEFAULT_PROJECT_NAME)]
    pub project_name: String,
    /// Seconds to sleep between polling passes.
    #[arg(long = "poll_interval", value_name = "SECONDS", default_value_t = 1)]
    pub poll_interval: u64,
    /// Give up polling after this many seconds. Polls forever when omitted.
    #[arg(long = "max_wait", value_name = "SECONDS")]
    pub max_wait: Option<u64>,
}
