//! Analytics report URLs.

use serde::Serialize;

use crate::models::DownloadJob;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Filter {
    search: &'static str,
    intent_positions: [u8; 0],
    advanced: Advanced,
}

#[derive(Serialize)]
struct Advanced {
    #[serde(rename = "0")]
    first: Rule,
}

#[derive(Serialize)]
struct Rule {
    inc: bool,
    fld: &'static str,
    cri: &'static str,
    val: u64,
}

/// Filter keeping only pages whose monthly traffic exceeds `threshold`.
pub fn traffic_filter(threshold: u64) -> String {
    let filter = Filter {
        search: "",
        intent_positions: [],
        advanced: Advanced {
            first: Rule {
                inc: true,
                fld: "tf",
                cri: ">",
                val: threshold,
            },
        },
    };
    serde_json::to_string(&filter).unwrap_or_default()
}

/// Organic pages report URL for `job` in month `month` (`YYYYMM`).
pub fn report_url(base: &str, job: &DownloadJob, month: &str) -> String {
    format!(
        "{}?filter={}&db={}&q={}&searchType=domain&date={}",
        base,
        urlencoding::encode(&traffic_filter(job.monthly_visitor_threshold)),
        urlencoding::encode(&job.language),
        urlencoding::encode(&job.domain_name),
        month
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_keeps_key_order() {
        assert_eq!(
            traffic_filter(1000),
            r#"{"search":"","intentPositions":[],"advanced":{"0":{"inc":true,"fld":"tf","cri":">","val":1000}}}"#
        );
    }

    #[test]
    fn test_report_url() {
        let job = DownloadJob::new("example.com", Some("DE"), 250);
        let url = report_url(
            "https://sr.toolsminati.com/analytics/organic/pages/",
            &job,
            "202409",
        );
        assert_eq!(
            url,
            "https://sr.toolsminati.com/analytics/organic/pages/?filter=\
             %7B%22search%22%3A%22%22%2C%22intentPositions%22%3A%5B%5D%2C%22advanced%22%3A\
             %7B%220%22%3A%7B%22inc%22%3Atrue%2C%22fld%22%3A%22tf%22%2C%22cri%22%3A%22%3E%22\
             %2C%22val%22%3A250%7D%7D%7D&db=de&q=example.com&searchType=domain&date=202409"
        );
    }
}
