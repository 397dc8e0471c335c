//! Sync command implementation.
//!
//! One pass over the configured ASNs, in order. Each ASN goes through
//! freshness check, refresh when stale, cache load, then a device session
//! that lists, diffs and applies. A failure aborts that ASN only.

use anyhow::{Context, Result};
use std::fmt;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::device::{DeviceConnector, DeviceSync, RouterOsConnector, TaggedList};
use crate::error::SyncError;
use crate::fetcher::{refresh, PrefixFetcher, PrefixSource};
use crate::fs_abstraction::FileSystem;
use crate::lock::LockGuard;
use crate::reconcile::diff;
use crate::utils::format_count;

/// Outcome of one successfully processed ASN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsnReport {
    pub asn: String,
    /// The cache was refreshed from the lookup service during this run
    pub refreshed: bool,
    /// Prefixes in the cache
    pub desired: usize,
    pub removed: usize,
    pub added: usize,
    /// Changes were computed but not applied
    pub dry_run: bool,
}

impl fmt::Display for AsnReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "would " } else { "" };
        write!(
            f,
            "ASN {}: {} prefixes{}, {}remove {}, {}add {}",
            self.asn,
            format_count(self.desired),
            if self.refreshed { " (refreshed)" } else { "" },
            verb,
            self.removed,
            verb,
            self.added
        )
    }
}

/// Result of a whole run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<AsnReport>,
    /// ASNs skipped this run, with the error that stopped them
    pub failures: Vec<(String, SyncError)>,
}

impl RunSummary {
    pub fn total_removed(&self) -> usize {
        self.reports.iter().map(|r| r.removed).sum()
    }

    pub fn total_added(&self) -> usize {
        self.reports.iter().map(|r| r.added).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run the sync command against the configured device and lookup service
pub async fn run(config: &Config) -> Result<RunSummary> {
    let cache = CacheStore::new(&config.cache_path, config.cache_ttl());
    cache
        .ensure_dir()
        .context("Failed to prepare cache directory")?;
    let _lock = LockGuard::acquire(cache.dir())?;

    let fetcher = PrefixFetcher::new(config)?;
    let connector = RouterOsConnector::from_config(config);

    Ok(run_with(config, &cache, &fetcher, &connector).await)
}

/// Process every configured ASN with the given collaborators
pub async fn run_with<F, S>(
    config: &Config,
    cache: &CacheStore<F>,
    source: &S,
    connector: &dyn DeviceConnector,
) -> RunSummary
where
    F: FileSystem,
    S: PrefixSource + ?Sized,
{
    let mut summary = RunSummary::default();

    for asn in &config.asns {
        match sync_asn(config, asn, cache, source, connector).await {
            Ok(report) => {
                info!("{}", report);
                summary.reports.push(report);
            }
            Err(e) => {
                warn!("ASN {} skipped: {}", asn, e);
                summary.failures.push((asn.clone(), e));
            }
        }
    }

    info!(
        "{} of {} ASNs synchronized to list '{}': {} removed, {} added{}",
        summary.reports.len(),
        config.asns.len(),
        config.list,
        summary.total_removed(),
        summary.total_added(),
        if config.dry_run { " (dry run)" } else { "" }
    );
    summary
}

/// Bring the device entries tagged for `asn` in line with its cached prefixes
pub async fn sync_asn<F, S>(
    config: &Config,
    asn: &str,
    cache: &CacheStore<F>,
    source: &S,
    connector: &dyn DeviceConnector,
) -> Result<AsnReport, SyncError>
where
    F: FileSystem,
    S: PrefixSource + ?Sized,
{
    let refreshed = if cache.is_fresh(asn) {
        debug!("ASN {}: using cached prefixes", asn);
        false
    } else {
        debug!(
            "ASN {}: cache stale or missing (ttl {}s), refreshing",
            asn,
            cache.ttl().as_secs()
        );
        refresh(source, asn, cache).await?;
        true
    };

    let desired = cache.load(asn)?;
    let scope = TaggedList::for_asn(&config.list, asn);

    let mut session = DeviceSync::connect(connector).await?;
    let outcome = reconcile_on_device(&mut session, &scope, &desired, config.dry_run).await;
    match session.disconnect().await {
        Ok(state) => debug!("ASN {}: session ended {:?}", asn, state),
        Err(e) => debug!("ASN {}: disconnect failed: {}", asn, e),
    }
    let (removed, added) = outcome?;

    Ok(AsnReport {
        asn: asn.to_string(),
        refreshed,
        desired: desired.len(),
        removed,
        added,
        dry_run: config.dry_run,
    })
}

/// List, diff, then apply removals before additions
async fn reconcile_on_device(
    session: &mut DeviceSync,
    scope: &TaggedList,
    desired: &[String],
    dry_run: bool,
) -> Result<(usize, usize), SyncError> {
    let current = session.list_tagged(scope).await?;
    let plan = diff(&current, desired);
    debug!(
        "{}: {} on device, {} desired, {} to remove, {} to add",
        scope,
        current.len(),
        desired.len(),
        plan.to_remove.len(),
        plan.to_add.len()
    );

    if dry_run {
        for address in &plan.to_remove {
            info!("[dry-run] would remove {} from {}", address, scope);
        }
        for address in &plan.to_add {
            info!("[dry-run] would add {} to {}", address, scope);
        }
        return Ok((plan.to_remove.len(), plan.to_add.len()));
    }

    let removed = session.apply_removals(scope, &plan.to_remove).await?;
    let added = session.apply_additions(scope, &plan.to_add).await?;
    Ok((removed, added))
}
