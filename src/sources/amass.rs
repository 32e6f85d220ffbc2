//! amass: passive enumeration. Output mixes plain names with
//! `X --> relation --> Y` graph lines; both go to the sink untouched and the
//! relation sniffer sorts them out.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::sink::ToolSender;

use super::command::{require_binary, stream_lines, CommandSpec};
use super::{Source, SourceContext};

pub struct Amass;

#[async_trait]
impl Source for Amass {
    fn name(&self) -> &'static str {
        "amass"
    }

    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError> {
        require_binary("amass")?;
        let spec =
            CommandSpec::new("amass").args(["enum", "-passive", "-nocolor", "-d", ctx.target.as_str()]);
        stream_lines(&spec, out, |line| vec![line.to_string()]).await
    }
}
