//! gau: archived URLs from multiple providers, domains fed over stdin.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::sink::ToolSender;

use super::command::{require_binary, stream_lines, CommandSpec};
use super::{Source, SourceContext};

pub struct Gau;

#[async_trait]
impl Source for Gau {
    fn name(&self) -> &'static str {
        "gau"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        require_binary("gau")?;
        let domains = ctx.domain_list();
        if domains.is_empty() {
            return Ok(());
        }
        let spec = CommandSpec::new("gau").stdin(domains.join("\n") + "\n");
        stream_lines(&spec, out, |line| vec![line.to_string()]).await
    }
}
