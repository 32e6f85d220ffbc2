//! The dedupe step: collapse `domains.passive` into a sorted, normalized
//! `domains.dedupe` list and repoint downstream steps at it. In active mode
//! the deduplicated list is immediately resolved with dnsx.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::atomic_write::write_file_atomic;
use crate::error::SourceError;
use crate::normalize::normalize_domain;
use crate::sink::ToolSender;

use super::{read_lines, Dnsx, Source, SourceContext};

pub struct Dedupe;

#[async_trait]
impl Source for Dedupe {
    fn name(&self) -> &'static str {
        "dedupe"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        let passive = ctx.layout.join("domains/domains.passive");
        let deduped: BTreeSet<String> = read_lines(&passive)
            .iter()
            .filter_map(|line| normalize_domain(line))
            .collect();

        let target = ctx.layout.domains_dedupe();
        let mut content = deduped.iter().cloned().collect::<Vec<_>>().join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        write_file_atomic(&target, &content)
            .map_err(|e| SourceError::Io(std::io::Error::other(e.to_string())))?;

        ctx.set_domains_file(target);
        out.send(&format!("meta: dedupe: {} domains", deduped.len()))
            .await;

        if ctx.active && !deduped.is_empty() {
            match Dnsx.run(ctx, out).await {
                Ok(()) => {}
                Err(err) if err.is_benign() => {
                    tracing::debug!("dnsx not present, skipping resolution");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
