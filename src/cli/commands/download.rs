//! Local single-domain download.

use console::style;

use crate::config::Settings;
use crate::fetcher::ReportFetcher;
use crate::models::DownloadJob;
use crate::server::{build_fetcher, build_site_directory};
use crate::storage::ReportStore;

use super::output::ConsoleProgress;

/// Download one report, taking missing parameters from the site directory.
pub async fn cmd_download(
    settings: &Settings,
    domain: &str,
    language: Option<&str>,
    visitors: Option<u64>,
) -> anyhow::Result<()> {
    let job = match (language, visitors) {
        (Some(language), Some(visitors)) => DownloadJob::new(domain, Some(language), visitors),
        _ => {
            let sites = build_site_directory(settings);
            match sites.find_by_domain(domain).await? {
                Some(site) => {
                    let language = language
                        .map(str::to_string)
                        .unwrap_or_else(|| site.report_language());
                    DownloadJob::new(domain, Some(&language), visitors.unwrap_or(site.monthly))
                }
                None if language.is_some() || visitors.is_some() => {
                    DownloadJob::new(domain, language, visitors.unwrap_or(0))
                }
                None => anyhow::bail!(
                    "Site not found: {} (pass --language and --visitors to download anyway)",
                    domain
                ),
            }
        }
    };

    println!(
        "{} Downloading report for {} (language {}, > {} visitors)",
        style("→").cyan(),
        style(&job.domain_name).bold(),
        job.language,
        job.monthly_visitor_threshold
    );

    let fetcher = build_fetcher(settings, ReportStore::new(settings.reports_dir.clone()));
    match fetcher.fetch(&job, &ConsoleProgress).await {
        Ok(path) => {
            println!("{} Saved {}", style("✓").green(), path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            Err(e.into())
        }
    }
}
