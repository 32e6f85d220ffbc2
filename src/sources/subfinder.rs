//! subfinder: passive subdomain enumeration.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::sink::ToolSender;

use super::command::{require_binary, stream_lines, CommandSpec};
use super::{Source, SourceContext};

pub struct Subfinder;

#[async_trait]
impl Source for Subfinder {
    fn name(&self) -> &'static str {
        "subfinder"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        require_binary("subfinder")?;
        let spec = CommandSpec::new("subfinder").args(["-d", ctx.target.as_str(), "-all", "-silent"]);
        stream_lines(&spec, out, |line| vec![line.to_string()]).await
    }
}
