//! linkfinderevo: endpoint extraction from the collected JS files. Findings
//! are mostly bare paths; the route sniffer classifies them.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::sink::ToolSender;

use super::command::{require_binary, stream_lines, CommandSpec};
use super::{read_lines, Source, SourceContext};

pub struct LinkFinderEvo;

#[async_trait]
impl Source for LinkFinderEvo {
    fn name(&self) -> &'static str {
        "linkfinderevo"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        require_binary("linkfinderevo")?;

        let js_files = read_lines(&ctx.layout.join("routes/js/js.active"));
        if js_files.is_empty() {
            return Ok(());
        }

        let spec = CommandSpec::new("linkfinderevo")
            .args(["-o", "cli"])
            .stdin(js_files.join("\n") + "\n");
        stream_lines(&spec, out, |line| vec![format!("active: {line}")]).await
    }
}
