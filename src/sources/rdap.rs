//! RDAP registration data for the target domain. Passive only.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SourceError;
use crate::sink::ToolSender;

use super::{Source, SourceContext};

const RDAP_ENDPOINT: &str = "https://rdap.org/domain/";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RdapResponse {
    handle: String,
    status: Vec<String>,
    events: Vec<RdapEvent>,
    nameservers: Vec<RdapNameserver>,
    entities: Vec<RdapEntity>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RdapEvent {
    #[serde(rename = "eventAction")]
    action: String,
    #[serde(rename = "eventDate")]
    date: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RdapNameserver {
    #[serde(rename = "ldhName")]
    ldh_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RdapEntity {
    roles: Vec<String>,
    handle: String,
}

/// Flatten the registry answer into `rdap:` sink lines.
fn to_lines(target: &str, response: &RdapResponse) -> Vec<String> {
    let mut lines = Vec::new();
    if !response.handle.is_empty() {
        lines.push(format!("rdap: {target} handle: {}", response.handle));
    }
    if !response.status.is_empty() {
        lines.push(format!("rdap: {target} status: {}", response.status.join(", ")));
    }
    for event in &response.events {
        if !event.action.is_empty() && !event.date.is_empty() {
            lines.push(format!("rdap: {target} {}: {}", event.action, event.date));
        }
    }
    for ns in &response.nameservers {
        if !ns.ldh_name.is_empty() {
            lines.push(format!("rdap: {target} nameserver: {}", ns.ldh_name));
        }
    }
    for entity in &response.entities {
        if !entity.handle.is_empty() {
            lines.push(format!(
                "rdap: {target} entity: {} ({})",
                entity.handle,
                entity.roles.join(",")
            ));
        }
    }
    lines
}

pub struct Rdap;

#[async_trait]
impl Source for Rdap {
    fn name(&self) -> &'static str {
        "rdap"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        let url = format!("{RDAP_ENDPOINT}{}", ctx.target);
        let response = ctx.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint: url,
                status: status.as_u16(),
            });
        }

        let parsed: RdapResponse = response.json().await?;
        for line in to_lines(&ctx.target, &parsed) {
            out.send(&line).await;
        }
        Ok(())
    }
}
