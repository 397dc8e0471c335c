//! # asnlist - ASN-driven RouterOS address-lists
//!
//! Keeps a firewall address-list on a RouterOS device in sync with the IPv4
//! prefixes currently announced by one or more Autonomous Systems.
//!
//! Every entry the tool manages carries the comment `ASN<number>`. Only
//! entries with that comment, in the configured list, are ever read or
//! changed for that ASN; anything else on the device is left alone.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        asnlist                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap) + Config (serde_yaml)                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  commands::sync - one pass, ASN by ASN                      │
//! │    ├── CacheStore: {cachepath}/{asn}.asn, mtime freshness   │
//! │    ├── PrefixFetcher (reqwest + rustls): refresh if stale   │
//! │    ├── reconcile::diff: ordered multiset difference         │
//! │    └── DeviceSync: list, remove, add, always disconnect     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  device::routeros (tokio + native-tls)                      │
//! │    └── RouterOS API sentences over TCP or TLS               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use asnlist::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config {
//!         router: "192.0.2.1".to_string(),
//!         user: "api".to_string(),
//!         list: "cdn".to_string(),
//!         asns: vec!["13335".to_string()],
//!         ..Config::default()
//!     };
//!     config.validate()?;
//!
//!     let summary = asnlist::commands::sync::run(&config).await?;
//!     for (asn, error) in &summary.failures {
//!         eprintln!("ASN {} skipped: {}", asn, error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cache`] - Per-ASN prefix files and their freshness
//! - [`cli`] - Command-line interface definitions
//! - [`commands`] - The sync pass
//! - [`config`] - Configuration parsing and validation
//! - [`device`] - Address-list sessions and the RouterOS API client
//! - [`error`] - Error taxonomy
//! - [`fetcher`] - HTTP client for the prefix lookup service
//! - [`fs_abstraction`] - Filesystem seam for testing
//! - [`lock`] - File locking for concurrent execution prevention
//! - [`reconcile`] - Add/remove computation
//! - [`utils`] - Formatting helpers
//! - [`validation`] - ASN, prefix and URL checks

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod device;
pub mod error;
pub mod fetcher;
pub mod fs_abstraction;
pub mod lock;
pub mod reconcile;
pub mod utils;
pub mod validation;

pub use cli::Cli;
pub use config::Config;
pub use error::SyncError;
