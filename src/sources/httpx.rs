//! httpx: active probing of the collected domains and routes. Output lines
//! carry bracketed status metadata and enter the sink `active:`-flagged.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::sink::ToolSender;

use super::command::{require_binary, stream_lines, CommandSpec};
use super::{read_lines, Source, SourceContext};

pub struct Httpx;

#[async_trait]
impl Source for Httpx {
    fn name(&self) -> &'static str {
        "httpx"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        require_binary("httpx")?;

        let mut inputs = ctx.domain_list();
        inputs.extend(read_lines(&ctx.layout.join("routes/routes.passive")));
        inputs.sort();
        inputs.dedup();
        if inputs.is_empty() {
            return Ok(());
        }

        let threads = (ctx.workers * 2).max(1).to_string();
        let spec = CommandSpec::new("httpx")
            .args([
                "-silent",
                "-status-code",
                "-title",
                "-no-color",
                "-threads",
                threads.as_str(),
            ])
            .stdin(inputs.join("\n") + "\n");
        stream_lines(&spec, out, |line| vec![format!("active: {line}")]).await
    }
}
