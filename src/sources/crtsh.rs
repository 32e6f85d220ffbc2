//! crt.sh: certificate transparency lookup over HTTP.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SourceError;
use crate::handlers::CertificateRecord;
use crate::sink::ToolSender;

use super::{Source, SourceContext};

const CRTSH_ENDPOINT: &str = "https://crt.sh/";

/// One crt.sh JSON entry.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CrtshEntry {
    common_name: String,
    /// Newline-separated SAN list.
    name_value: String,
    issuer_name: String,
    not_before: String,
    not_after: String,
    serial_number: String,
}

impl CrtshEntry {
    fn into_record(self) -> CertificateRecord {
        let dns_names: Vec<String> = self
            .name_value
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect();
        CertificateRecord {
            source: "crtsh".to_string(),
            common_name: self.common_name,
            dns_names,
            issuer: self.issuer_name,
            not_before: self.not_before,
            not_after: self.not_after,
            serial_number: self.serial_number,
            ..Default::default()
        }
    }
}

pub struct Crtsh;

#[async_trait]
impl Source for Crtsh {
    fn name(&self) -> &'static str {
        "crtsh"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        let query = format!("%.{}", ctx.target);
        let response = ctx
            .http
            .get(CRTSH_ENDPOINT)
            .query(&[("q", query.as_str()), ("output", "json")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint: CRTSH_ENDPOINT.to_string(),
                status: status.as_u16(),
            });
        }

        let entries: Vec<CrtshEntry> = response.json().await?;
        tracing::debug!(count = entries.len(), "crt.sh entries");

        for entry in entries {
            let record = entry.into_record();
            out.send(&format!("cert:{}", record.canonical_json())).await;
        }
        Ok(())
    }
}
