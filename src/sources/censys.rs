//! Censys certificate search over the v2 API with basic authentication.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SourceError;
use crate::handlers::CertificateRecord;
use crate::sink::ToolSender;

use super::{Source, SourceContext};

const CENSYS_ENDPOINT: &str = "https://search.censys.io/api/v2/certificates/search";
const PER_PAGE: u32 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CensysResponse {
    result: CensysResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CensysResult {
    hits: Vec<CensysHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CensysHit {
    names: Vec<String>,
    fingerprint_sha256: String,
    parsed: CensysParsed,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CensysParsed {
    subject_dn: String,
    issuer_dn: String,
    serial_number: String,
    validity_period: CensysValidity,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CensysValidity {
    not_before: String,
    not_after: String,
}

impl CensysHit {
    fn into_record(self) -> CertificateRecord {
        let common_name = self
            .parsed
            .subject_dn
            .split(',')
            .filter_map(|part| part.trim().strip_prefix("CN="))
            .next()
            .unwrap_or_default()
            .to_string();
        CertificateRecord {
            source: "censys".to_string(),
            common_name,
            dns_names: self.names,
            subject: self.parsed.subject_dn,
            issuer: self.parsed.issuer_dn,
            not_before: self.parsed.validity_period.not_before,
            not_after: self.parsed.validity_period.not_after,
            serial_number: self.parsed.serial_number,
            fingerprint_sha256: self.fingerprint_sha256,
            ..Default::default()
        }
    }
}

pub struct Censys;

#[async_trait]
impl Source for Censys {
    fn name(&self) -> &'static str {
        "censys"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        let (Some(api_id), Some(api_secret)) = (
            ctx.censys_api_id.as_deref(),
            ctx.censys_api_secret.as_deref(),
        ) else {
            return Err(SourceError::MissingCredentials {
                what: "censys API id/secret".to_string(),
            });
        };

        let query = format!("names: {}", ctx.target);
        let response = ctx
            .http
            .get(CENSYS_ENDPOINT)
            .basic_auth(api_id, Some(api_secret))
            .query(&[("q", query.as_str()), ("per_page", &PER_PAGE.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint: CENSYS_ENDPOINT.to_string(),
                status: status.as_u16(),
            });
        }

        let parsed: CensysResponse = response.json().await?;
        tracing::debug!(count = parsed.result.hits.len(), "censys hits");

        for hit in parsed.result.hits {
            let record = hit.into_record();
            out.send(&format!("cert:{}", record.canonical_json())).await;
        }
        Ok(())
    }
}
