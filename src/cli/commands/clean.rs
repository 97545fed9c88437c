use anyhow::{Ok, Result};

use super::super::{args::CleanCommand, context::ProjectContext};
use super::helper::finish;
use super::{CleanSummary, CommandKind, CommandResult, CommandSummary};
use crate::core::pipeline::clean_folder;

pub fn clean(cmd: CleanCommand) -> Result<CommandResult> {
    let ctx = ProjectContext::new(&cmd.common)?;
    let folders = ctx.scan();

    let mut removed = Vec::new();
    for folder in &folders {
        removed.extend(clean_folder(
            &folder.path,
            &ctx.config.output_file,
            &ctx.config.cache_file,
        )?);
    }

    Ok(finish(
        CommandKind::Clean,
        CommandSummary::Clean(CleanSummary { removed }),
        Vec::new(),
        folders.len(),
    ))
}
