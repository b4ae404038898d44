use super::config::cmd_config;
use super::env::CliArgs;
use super::rehearse::cmd_rehearse;
use super::run::cmd_run;
use super::rut::cmd_rut;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, ctx, cli.output).await,
        Commands::Rehearse(args) => cmd_rehearse(args, ctx, cli.output).await,
        Commands::Rut(args) => cmd_rut(args, ctx.config(), cli.output),
        Commands::Config(args) => cmd_config(args, ctx).await,
    }
}
