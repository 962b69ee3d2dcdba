//! Aggregate statistics over the stored corpus
//!
//! Reads only storage counts and site rows; the "indexing" flag is
//! derived from site statuses rather than the in-process run state, so
//! it stays correct across restarts.

use crate::storage::{SiteStatus, Storage};
use crate::LemmexError;
use serde::Serialize;

/// Corpus-wide counters
#[derive(Debug, Clone, Serialize)]
pub struct TotalStatistics {
    pub sites: u64,
    pub pages: u64,
    pub lemmas: u64,
    pub indexing: bool,
}

/// Per-site counters and status
#[derive(Debug, Clone, Serialize)]
pub struct SiteStatistics {
    pub url: String,
    pub name: String,
    pub status: String,
    #[serde(rename = "statusTime")]
    pub status_time: String,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub pages: u64,
    pub lemmas: u64,
}

/// The full statistics document the CLI prints
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    pub total: TotalStatistics,
    pub sites: Vec<SiteStatistics>,
}

/// Assembles the statistics document from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<StatisticsReport, LemmexError> {
    let site_rows = storage.list_sites()?;

    let mut sites = Vec::with_capacity(site_rows.len());
    let mut indexing = false;
    for site in &site_rows {
        if site.status == SiteStatus::Indexing {
            indexing = true;
        }
        sites.push(SiteStatistics {
            url: site.url.clone(),
            name: site.name.clone(),
            status: site.status.to_db_string().to_string(),
            status_time: site.status_time.clone(),
            last_error: site.last_error.clone(),
            pages: storage.count_pages_by_site(site.id)?,
            lemmas: storage.count_lemmas_by_site(site.id)?,
        });
    }

    let total = TotalStatistics {
        sites: storage.count_sites()?,
        pages: storage.count_all_pages()?,
        lemmas: storage.count_all_lemmas()?,
        indexing,
    };

    Ok(StatisticsReport { total, sites })
}
