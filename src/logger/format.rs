//! Access log line formatting
//!
//! Formats: `combined`, `common`, `json`, or a custom pattern with
//! `$variable` placeholders.

use chrono::{DateTime, Local};
use serde_json::json;

const CLF_TIME: &str = "%d/%b/%Y:%H:%M:%S %z";

/// One served request
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub remote_addr: String,
    pub time: DateTime<Local>,
    pub method: String,
    /// Path as received, before any prefix stripping
    pub path: String,
    pub query: Option<String>,
    pub http_version: String,
    pub status: u16,
    pub body_bytes: usize,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    /// `app` when the adapter answered, `server` for responses the host
    /// produced itself
    pub handled_by: &'static str,
    pub request_time_us: u64,
}

impl AccessLogEntry {
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            query: None,
            http_version: "1.1".to_string(),
            status: 200,
            body_bytes: 0,
            referer: None,
            user_agent: None,
            handled_by: "app",
            request_time_us: 0,
        }
    }

    pub fn format(&self, format: &str) -> String {
        match format {
            "combined" => format!(
                "{} \"{}\" \"{}\"",
                self.common_line(),
                self.referer.as_deref().unwrap_or("-"),
                self.user_agent.as_deref().unwrap_or("-"),
            ),
            "common" => self.common_line(),
            "json" => self.json_line(),
            pattern => self.custom_line(pattern),
        }
    }

    fn request_uri(&self) -> String {
        match &self.query {
            Some(q) if !q.is_empty() => format!("{}?{q}", self.path),
            _ => self.path.clone(),
        }
    }

    fn request_line(&self) -> String {
        format!(
            "{} {} HTTP/{}",
            self.method,
            self.request_uri(),
            self.http_version
        )
    }

    fn common_line(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.remote_addr,
            self.time.format(CLF_TIME),
            self.request_line(),
            self.status,
            self.body_bytes,
        )
    }

    fn json_line(&self) -> String {
        json!({
            "remote_addr": self.remote_addr,
            "time": self.time.to_rfc3339(),
            "method": self.method,
            "path": self.path,
            "query": self.query,
            "http_version": self.http_version,
            "status": self.status,
            "body_bytes": self.body_bytes,
            "referer": self.referer,
            "user_agent": self.user_agent,
            "handled_by": self.handled_by,
            "request_time_us": self.request_time_us,
        })
        .to_string()
    }

    /// Substitute `$variable` placeholders. Longer names are replaced first
    /// so `$request_time` is not eaten by `$request`.
    fn custom_line(&self, pattern: &str) -> String {
        #[allow(clippy::cast_precision_loss)]
        let seconds = self.request_time_us as f64 / 1_000_000.0;
        let vars = [
            ("$remote_addr", self.remote_addr.clone()),
            ("$time_local", self.time.format(CLF_TIME).to_string()),
            ("$time_iso8601", self.time.to_rfc3339()),
            ("$request_time", format!("{seconds:.3}")),
            ("$request_method", self.method.clone()),
            ("$request_uri", self.request_uri()),
            ("$request", self.request_line()),
            ("$status", self.status.to_string()),
            ("$body_bytes_sent", self.body_bytes.to_string()),
            ("$http_referer", self.referer.clone().unwrap_or_else(|| "-".into())),
            ("$http_user_agent", self.user_agent.clone().unwrap_or_else(|| "-".into())),
            ("$handled_by", self.handled_by.to_string()),
        ];

        vars.iter()
            .fold(pattern.to_string(), |line, (name, value)| line.replace(name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> AccessLogEntry {
        let mut entry = AccessLogEntry::new(
            "10.0.0.7".to_string(),
            "GET".to_string(),
            "/svc/items".to_string(),
        );
        entry.query = Some("page=2".to_string());
        entry.status = 201;
        entry.body_bytes = 42;
        entry.referer = Some("https://example.com".to_string());
        entry.user_agent = Some("curl/8.0".to_string());
        entry.handled_by = "server";
        entry.request_time_us = 2500;
        entry
    }

    #[test]
    fn test_common_format() {
        let line = entry().format("common");
        assert!(line.starts_with("10.0.0.7 - - ["));
        assert!(line.ends_with("\"GET /svc/items?page=2 HTTP/1.1\" 201 42"));
        assert!(!line.contains("curl"));
    }

    #[test]
    fn test_combined_format_adds_referer_and_agent() {
        let line = entry().format("combined");
        assert!(line.ends_with("201 42 \"https://example.com\" \"curl/8.0\""));
    }

    #[test]
    fn test_json_format_is_valid_json() {
        let line = entry().format("json");
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["status"], 201);
        assert_eq!(value["path"], "/svc/items");
        assert_eq!(value["handled_by"], "server");
    }

    #[test]
    fn test_custom_format() {
        let line = entry().format("$request_method $request_uri $status $request_time $handled_by");
        assert_eq!(line, "GET /svc/items?page=2 201 0.003 server");
    }

    #[test]
    fn test_missing_optional_fields() {
        let entry = AccessLogEntry::new("::1".into(), "HEAD".into(), "/".into());
        assert_eq!(entry.format("$http_referer|$http_user_agent"), "-|-");
        assert!(entry.format("common").contains("\"HEAD / HTTP/1.1\""));
    }
}
