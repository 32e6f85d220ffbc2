//! subjs: JavaScript files referenced by the actively confirmed routes.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::sink::ToolSender;

use super::command::{require_binary, stream_lines, CommandSpec};
use super::{read_lines, Source, SourceContext};

pub struct Subjs;

#[async_trait]
impl Source for Subjs {
    fn name(&self) -> &'static str {
        "subjs"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        require_binary("subjs")?;

        let routes = read_lines(&ctx.layout.join("routes/routes.active"));
        if routes.is_empty() {
            return Ok(());
        }

        let spec = CommandSpec::new("subjs").stdin(routes.join("\n") + "\n");
        stream_lines(&spec, out, |line| vec![format!("active:js:{line}")]).await
    }
}
