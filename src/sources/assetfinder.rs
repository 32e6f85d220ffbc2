//! assetfinder: passive subdomain discovery from public sources.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::sink::ToolSender;

use super::command::{require_binary, stream_lines, CommandSpec};
use super::{Source, SourceContext};

pub struct Assetfinder;

#[async_trait]
impl Source for Assetfinder {
    fn name(&self) -> &'static str {
        "assetfinder"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        require_binary("assetfinder")?;
        let spec = CommandSpec::new("assetfinder").args(["--subs-only", ctx.target.as_str()]);
        stream_lines(&spec, out, |line| vec![line.to_string()]).await
    }
}
