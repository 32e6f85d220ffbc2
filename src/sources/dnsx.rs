//! dnsx: active resolution of the deduplicated domain list. The tool's JSON
//! output is re-shaped into the sink's `dns:` record form, one line per
//! resolved record.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SourceError;
use crate::sink::ToolSender;

use super::command::{require_binary, stream_lines, CommandSpec};
use super::{Source, SourceContext};

/// The subset of dnsx JSON output the adapter consumes.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DnsxLine {
    host: String,
    a: Vec<String>,
    aaaa: Vec<String>,
    cname: Vec<String>,
    ptr: Vec<String>,
}

/// Translate one dnsx JSON line into zero or more `dns:` sink lines.
fn to_dns_lines(raw: &str) -> Vec<String> {
    let Ok(parsed) = serde_json::from_str::<DnsxLine>(raw) else {
        return Vec::new();
    };
    if parsed.host.is_empty() {
        return Vec::new();
    }

    let mut lines = Vec::new();
    let mut emit = |record_type: &str, value: &str| {
        let record = serde_json::json!({
            "host": parsed.host,
            "type": record_type,
            "value": value,
            "raw": raw,
            "ptr": parsed.ptr,
        });
        lines.push(format!("active:dns:{record}"));
    };
    for value in &parsed.a {
        emit("A", value);
    }
    for value in &parsed.aaaa {
        emit("AAAA", value);
    }
    for value in &parsed.cname {
        emit("CNAME", value);
    }
    lines
}

pub struct Dnsx;

#[async_trait]
impl Source for Dnsx {
    fn name(&self) -> &'static str {
        "dnsx"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        require_binary("dnsx")?;

        let domains = ctx.domain_list();
        if domains.is_empty() {
            return Ok(());
        }

        let spec = CommandSpec::new("dnsx")
            .args(["-silent", "-a", "-aaaa", "-cname", "-resp", "-json"])
            .stdin(domains.join("\n") + "\n");
        stream_lines(&spec, out, to_dns_lines).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dnsx_json_fans_out_per_record() {
        let raw = r#"{"host":"a.example.com","a":["1.2.3.4","5.6.7.8"],"cname":["edge.example.com"]}"#;
        let lines = to_dns_lines(raw);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("active:dns:"));
        assert!(lines[0].contains("\"type\":\"A\""));
        assert!(lines[2].contains("\"type\":\"CNAME\""));
    }

    #[test]
    fn malformed_dnsx_line_is_dropped() {
        assert!(to_dns_lines("not json").is_empty());
        assert!(to_dns_lines("{}").is_empty());
    }
}
