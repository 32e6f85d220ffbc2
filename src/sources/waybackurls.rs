//! waybackurls: archived URLs for every deduplicated domain, fed over stdin.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::sink::ToolSender;

use super::command::{require_binary, stream_lines, CommandSpec};
use super::{Source, SourceContext};

pub struct Waybackurls;

#[async_trait]
impl Source for Waybackurls {
    fn name(&self) -> &'static str {
        "waybackurls"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        require_binary("waybackurls")?;
        let domains = ctx.domain_list();
        if domains.is_empty() {
            return Ok(());
        }
        let spec = CommandSpec::new("waybackurls").stdin(domains.join("\n") + "\n");
        stream_lines(&spec, out, |line| vec![line.to_string()]).await
    }
}
