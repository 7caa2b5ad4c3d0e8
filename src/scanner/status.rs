//! Progress records from `--stats-every`

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static TASK_PROGRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<taskprogress .+/>").expect("valid progress regex"));
static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([a-z]+)="([^"]+)""#).expect("valid attribute regex"));

/// Latest progress report of a running scan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanStatus {
    pub task: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub percent: Option<f64>,
    /// Hosts still to be scanned by the task
    pub remaining: Option<u64>,
    /// Estimated completion time
    pub etc: Option<DateTime<Utc>>,
}

impl ScanStatus {
    /// Extract the last `<taskprogress>` record from raw nmap output
    ///
    /// Output may be partial; `None` until a complete record has arrived.
    /// Attributes that do not parse are left empty.
    pub fn from_output(output: &str) -> Option<Self> {
        let record = TASK_PROGRESS.find_iter(output).last()?;

        let mut status = ScanStatus::default();
        for caps in ATTRIBUTE.captures_iter(record.as_str()) {
            let value = &caps[2];
            match &caps[1] {
                "task" => status.task = Some(value.to_string()),
                "time" => status.time = timestamp(value),
                "percent" => status.percent = value.parse().ok(),
                "remaining" => status.remaining = value.parse().ok(),
                "etc" => status.etc = timestamp(value),
                _ => {}
            }
        }

        Some(status)
    }

    pub fn is_complete(&self) -> bool {
        self.percent.map_or(false, |p| p >= 100.0)
    }
}

fn timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_record_wins() {
        let output = concat!(
            "<nmaprun>\n",
            "<taskprogress task=\"Ping Scan\" time=\"1700000001\" percent=\"100.00\" etc=\"1700000001\"/>\n",
            "<taskbegin task=\"SYN Stealth Scan\" time=\"1700000002\"/>\n",
            "<taskprogress task=\"SYN Stealth Scan\" time=\"1700000005\" percent=\"42.10\" remaining=\"7\" etc=\"1700000012\"/>\n",
        );
        let status = ScanStatus::from_output(output).unwrap();
        assert_eq!(status.task.as_deref(), Some("SYN Stealth Scan"));
        assert_eq!(status.percent, Some(42.10));
        assert_eq!(status.remaining, Some(7));
        assert_eq!(status.time.unwrap().timestamp(), 1_700_000_005);
        assert_eq!(status.etc.unwrap().timestamp(), 1_700_000_012);
        assert!(!status.is_complete());
    }

    #[test]
    fn test_no_record_yet() {
        assert_eq!(ScanStatus::from_output("<nmaprun scanner=\"nmap\">"), None);
        // split across two reads
        assert_eq!(ScanStatus::from_output("<taskprogress task=\"Ping"), None);
    }

    #[test]
    fn test_bad_values_left_empty() {
        let status =
            ScanStatus::from_output(r#"<taskprogress task="Ping Scan" percent="lots" time="x"/>"#)
                .unwrap();
        assert_eq!(status.task.as_deref(), Some("Ping Scan"));
        assert_eq!(status.percent, None);
        assert_eq!(status.time, None);
    }
}
