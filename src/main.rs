use anyhow::Result;
use clap::Parser;
use schemaguard::cli::{Cli, Commands};
use schemaguard::commands::{self, CommandContext};
use schemaguard::observability::{init_logging, install_panic_hook};

fn main() -> Result<()> {
    install_panic_hook();
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    if let Commands::Init { force } = cli.command {
        commands::init_config(&cli.project, force)?;
        return Ok(());
    }

    let ctx = CommandContext::new(cli.project, cli.config.as_deref(), cli.dry_run)?;
    run(&ctx, cli.command)
}

fn run(ctx: &CommandContext, command: Commands) -> Result<()> {
    match command {
        Commands::Check {
            checker,
            disable,
            fix,
            format,
            output,
        } => {
            commands::handle_check(
                ctx,
                commands::CheckConfig {
                    checker,
                    disable,
                    fix,
                    format,
                    output,
                },
            )?;
        }
        Commands::Migrations {
            dir,
            format,
            output,
        } => {
            commands::handle_migrations(ctx, dir, format, output)?;
        }
        Commands::Backup { action } => commands::backup::handle_backup(ctx, action)?,
        Commands::Strategy { backup_id, output } => {
            commands::mapping::handle_strategy(ctx, backup_id, output)?;
        }
        Commands::Execute {
            strategy,
            chunk_size,
        } => {
            commands::mapping::handle_execute(ctx, &strategy, chunk_size)?;
        }
        Commands::Rollback { backup_id } => {
            commands::mapping::handle_rollback(ctx, &backup_id)?;
        }
        Commands::Export { dir, tables } => {
            commands::transfer::handle_export(ctx, &dir, tables)?;
        }
        Commands::Import {
            dir,
            tables,
            chunk_size,
        } => {
            commands::transfer::handle_import(ctx, &dir, tables, chunk_size)?;
        }
        Commands::CleanupMigrations => {
            commands::cleanup::handle_cleanup_migrations(ctx)?;
        }
        Commands::Job { action } => commands::jobs::handle_job(ctx, action)?,
        Commands::Init { force } => {
            commands::init_config(&ctx.project, force)?;
        }
    }
    Ok(())
}
