//! CLI argument parsing with clap.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "asnlist")]
#[command(
    author,
    version,
    about = "Sync a RouterOS firewall address-list with the IPv4 prefixes announced by ASNs"
)]
pub struct Cli {
    /// IP or DNS name of the RouterOS device
    #[arg(long)]
    pub router: Option<String>,

    /// API user on the device
    #[arg(long)]
    pub user: Option<String>,

    /// API password
    #[arg(long, env = "ASNLIST_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// API port (default 8728, or 8729 with --ssl)
    #[arg(long)]
    pub port: Option<u16>,

    /// Connect to the API-SSL service
    #[arg(long)]
    pub ssl: bool,

    /// Accept self-signed or mismatched device certificates
    #[arg(long, requires = "ssl")]
    pub tls_insecure: bool,

    /// Address-list name to maintain
    #[arg(long)]
    pub list: Option<String>,

    /// ASNs to sync, comma separated
    #[arg(long = "asn", visible_alias = "ASN", value_delimiter = ',')]
    pub asns: Vec<String>,

    /// Verbose mode (debug output)
    #[arg(short, long)]
    pub verbose: bool,

    /// Cache time-to-live in seconds
    #[arg(long = "cachettl")]
    pub cache_ttl: Option<u64>,

    /// Directory holding the per-ASN cache files
    #[arg(long = "cachepath")]
    pub cache_path: Option<PathBuf>,

    /// YAML config file; command-line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Prefix lookup service base URL
    #[arg(long)]
    pub api_url: Option<String>,

    /// Lookup request timeout in seconds
    #[arg(long)]
    pub fetch_timeout: Option<u64>,

    /// Bound on device connect and each device command, in seconds
    #[arg(long)]
    pub device_timeout: Option<u64>,

    /// Compute and log the changes without touching the address-list
    #[arg(long)]
    pub dry_run: bool,
}
