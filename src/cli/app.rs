use super::ui;
use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser, Subcommand};
use dbmigrate::{Driver, MigrateConfig, MigrationSession, PatchRef, SqliteStore, logging};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "db-migrate")]
#[command(about = "Migrate SQL schemas (and data) from one set of SQL patches to another")]
struct Cli {
    /// Database URL: sqlite::memory:, sqlite://<path> or a file path
    #[arg(long, short = 'u')]
    url: Option<String>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing the SQL patches
    #[arg(long = "patches-dir", value_name = "DIR")]
    patches_dir: Option<PathBuf>,

    /// Add a repository whose patches override the main one
    #[arg(long = "add-repo", value_name = "DIR")]
    add_repo: Vec<PathBuf>,

    /// Migration target name, defaults to the repository name
    #[arg(long)]
    target: Option<String>,

    /// Roll back all changes at the end
    #[arg(long)]
    simulate: bool,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the migration target, optionally marking patches as applied
    Init {
        #[arg(long, num_args = 1.., conflicts_with = "all_patches")]
        patches: Vec<String>,
        #[arg(long)]
        all_patches: bool,
    },
    /// Remove the migration target
    Uninit,
    /// List applied and unapplied patches
    Status,
    /// Apply patches and their dependencies, all patches when none are given
    Upgrade {
        patches: Vec<String>,
        #[arg(long)]
        skip_sql: bool,
    },
    /// Upgrade and downgrade twice, then roll back
    Test { patches: Vec<String> },
    /// Revert patches and their dependents, all patches when none are given
    Downgrade {
        patches: Vec<String>,
        #[arg(long)]
        skip_sql: bool,
    },
    /// Downgrade and upgrade patches again
    Renew {
        #[arg(required = true)]
        patches: Vec<String>,
    },
    /// Print the smallest set of patches implying all the given ones
    CalcMinimal {
        #[arg(required = true)]
        patches: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    logging::init_with_level(if cli.verbose > 0 { "debug" } else { "info" });

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let mut config = build_config(&cli)?;
    if matches!(cli.command, Command::Test { .. }) && !config.simulate {
        info!("enforcing simulation for the test command");
        config.simulate = true;
    }

    let mut session = MigrationSession::open(&config).with_context(|| {
        format!("Failed to open migration session for '{}'", config.database_url)
    })?;
    session.run(|driver| dispatch(driver, &cli.command))?;
    Ok(())
}

fn build_config(cli: &Cli) -> Result<MigrateConfig> {
    let mut config = match &cli.config {
        Some(path) => MigrateConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?,
        None => MigrateConfig::default(),
    };

    match (&cli.url, &cli.config) {
        (Some(url), _) => config.database_url = url.clone(),
        (None, None) => return Err(anyhow!("a database URL is required (--url or --config)")),
        (None, Some(_)) => {}
    }
    if let Some(dir) = &cli.patches_dir {
        config.patch_dir = dir.clone();
    }
    config.override_dirs.extend(cli.add_repo.iter().cloned());
    if let Some(target) = &cli.target {
        config.target = Some(target.clone());
    }
    config.simulate |= cli.simulate;

    config.location()?;
    Ok(config)
}

fn dispatch(driver: &Driver<'_, SqliteStore<'_>>, command: &Command) -> dbmigrate::Result<()> {
    let catalog = driver.catalog();
    let selection = |names: &[String]| -> dbmigrate::Result<Option<Vec<PatchRef>>> {
        if names.is_empty() {
            Ok(None)
        } else {
            catalog.lookup(names).map(Some)
        }
    };

    match command {
        Command::Init {
            patches,
            all_patches,
        } => {
            let baseline = if *all_patches {
                Some(catalog.all())
            } else {
                selection(patches)?
            };
            driver.init(baseline.as_deref())
        }
        Command::Uninit => driver.uninit(),
        Command::Status => ui::print_status(driver),
        Command::Upgrade { patches, skip_sql } => {
            match selection(patches)? {
                Some(patches) => driver.upgrade(&patches, !skip_sql)?,
                None => driver.upgrade_all(!skip_sql)?,
            };
            Ok(())
        }
        Command::Test { patches } => driver.test_upgrade(selection(patches)?.as_deref()),
        Command::Downgrade { patches, skip_sql } => {
            match selection(patches)? {
                Some(patches) => driver.downgrade(&patches, !skip_sql)?,
                None => driver.downgrade_all(!skip_sql)?,
            };
            Ok(())
        }
        Command::Renew { patches } => {
            driver.renew(&catalog.lookup(patches)?)?;
            Ok(())
        }
        Command::CalcMinimal { patches } => {
            let minimal = driver.calculate_minimal_deps(&catalog.lookup(patches)?)?;
            ui::print_names(catalog, &minimal);
            Ok(())
        }
    }
}
