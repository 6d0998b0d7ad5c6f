//! Config-driven project automation.
//!
//! `autolife` reads `ConfigFile.json`, clones the repository, enters it and
//! runs the `autolife-sdk` pipeline against it: the Xcode pipeline for iOS
//! languages, configured or default commands for everything else.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use include_dir::{Dir, include_dir};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use autolife_sdk::builders::{IosBuilder, StandardBuilder};
use autolife_sdk::git::{SyncOutcome, sync_repository};
use autolife_sdk::pipeline::{
    Confirm, FixedAnswer, PipelineOutcome, StdinConfirm, run_build_pipeline, run_in,
    run_standard_build_pipeline, run_standard_test_pipeline, run_test_pipeline,
};
use autolife_sdk::{AutolifeError, ProcessRunner, RecordingRunner, SystemRunner, ui};

pub mod config;
pub mod logging;

use config::{AutolifeConfig, DEFAULT_CONFIG_FILE};

const TEMPLATES: Dir = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// Clones, builds, tests and ships projects described by a config file.
#[derive(Parser, Debug)]
#[command(name = "autolife", author, version, about = "Config-driven build automation", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Print the external commands instead of running them
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clone the repository, or update an existing clone.
    Start,
    /// Build the project. iOS apps are also archived, exported and optionally
    /// uploaded to TestFlight.
    Build,
    /// Run the project's tests (the scheme's tests on the simulator for iOS).
    Test,
    /// Check that the configuration is complete.
    Verify,
    /// Write a starter configuration file.
    Init {
        #[arg(long, value_enum, default_value_t = Template::Default)]
        template: Template,
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Template {
    Default,
    Ios,
}

impl Template {
    fn file_name(self) -> &'static str {
        match self {
            Template::Default => "default.json",
            Template::Ios => "ios.json",
        }
    }

    fn contents(self) -> Result<&'static str> {
        TEMPLATES
            .get_file(self.file_name())
            .and_then(|file| file.contents_utf8())
            .ok_or_else(|| anyhow!("embedded template {} missing", self.file_name()))
    }
}

pub fn run() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    logging::init(cli.verbose);
    tracing::debug!(config = %cli.config.display(), dry_run = cli.dry_run, "starting");

    match cli.command {
        Command::Start => cmd_start(&cli.config, cli.dry_run),
        Command::Build => cmd_build(&cli.config, cli.dry_run),
        Command::Test => cmd_test(&cli.config, cli.dry_run),
        Command::Verify => cmd_verify(&cli.config),
        Command::Init { template, force } => cmd_init(&cli.config, template, force),
    }
}

fn load_dotenv() {
    if let Ok(cwd) = env::current_dir() {
        let _ = dotenvy::from_path(cwd.join(".env.local"));
    }
}

fn load_config(path: &Path) -> Result<AutolifeConfig> {
    let config = AutolifeConfig::load_from_file(path).context("Failed to load config")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

/// `<base>/<repository name>`, whether or not it exists yet.
fn project_path(base: &Path, config: &AutolifeConfig) -> Result<PathBuf> {
    let name = config
        .project_dir_name()
        .ok_or_else(|| anyhow!("Could not determine project directory name from git.repo_url"))?;
    Ok(base.join(name))
}

/// `<base>/<repository name>`, which must already exist.
fn resolve_project_dir(base: &Path, config: &AutolifeConfig) -> Result<PathBuf> {
    let path = project_path(base, config)?;
    if !path.is_dir() {
        bail!(
            "Project directory '{}' not found. Run 'autolife start' first.",
            path.display()
        );
    }
    Ok(path)
}

fn ios_builder<'r>(
    config: &AutolifeConfig,
    runner: &'r dyn ProcessRunner,
    project_dir: &Path,
) -> IosBuilder<'r> {
    IosBuilder::new(
        runner,
        project_dir,
        config.build_target(),
        config.signing_policy(),
    )
    .archive_path(config.archive_path())
    .export_settings(config.export_settings())
    .credentials(config.credentials())
    .simulator_destination(config.ios.simulator_destination.clone())
    .install_command(&config.build.install_command)
    .env(config.environment.variables.clone())
}

fn standard_builder<'r>(
    config: &AutolifeConfig,
    runner: &'r dyn ProcessRunner,
    project_dir: &Path,
) -> StandardBuilder<'r> {
    StandardBuilder::new(runner, project_dir, config.build.language.clone())
        .install_command(&config.build.install_command)
        .build_command(&config.build.build_command)
        .test_command(&config.build.test_command)
        .output_dir(config.output_dir())
        .env(config.environment.variables.clone())
}

fn runner_for(dry_run: bool) -> Box<dyn ProcessRunner> {
    if dry_run {
        Box::new(RecordingRunner::new().echo(true))
    } else {
        Box::new(SystemRunner)
    }
}

fn confirm_for(dry_run: bool) -> Box<dyn Confirm> {
    if dry_run {
        Box::new(FixedAnswer(false))
    } else {
        Box::new(StdinConfirm)
    }
}

fn enter_project(config: &AutolifeConfig, title: &str) -> Result<PathBuf> {
    let cwd = env::current_dir().context("resolving current directory")?;
    let project_dir = resolve_project_dir(&cwd, config)?;
    ui::headline(&format!("{title} {}", config.project.name));
    ui::info(&format!("Project directory: {}", project_dir.display()));
    Ok(project_dir)
}

fn cmd_start(config_path: &Path, dry_run: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let cwd = env::current_dir().context("resolving current directory")?;
    let project_dir = project_path(&cwd, &config)?;
    let runner = runner_for(dry_run);

    match checkout(&config, &project_dir, runner.as_ref()).context("Cloning repository failed")? {
        SyncOutcome::Cloned => ui::success("Repository cloned successfully!"),
        SyncOutcome::Pulled => ui::success("Repository updated successfully!"),
    }

    println!();
    if confirm_for(dry_run).confirm("Do you want to run tests now?") {
        test_project(&config, &project_dir, runner.as_ref())?;
        ui::success("All tests passed");
    } else {
        println!("Next steps:");
        println!("  Run 'autolife test' to run tests");
        println!("  Run 'autolife build' to build the project");
    }
    Ok(())
}

fn checkout(
    config: &AutolifeConfig,
    project_dir: &Path,
    runner: &dyn ProcessRunner,
) -> Result<SyncOutcome, AutolifeError> {
    sync_repository(
        runner,
        &config.git.repo_url,
        config.branch(),
        project_dir,
        &config.environment.variables,
    )
}

fn cmd_build(config_path: &Path, dry_run: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let project_dir = enter_project(&config, "Building")?;
    let runner = runner_for(dry_run);

    if !config.is_ios() {
        run_in(&project_dir, || {
            run_standard_build_pipeline(&standard_builder(&config, runner.as_ref(), &project_dir))
        })?;
        return Ok(());
    }

    let mut confirm = confirm_for(dry_run);
    match build_project(&config, &project_dir, runner.as_ref(), confirm.as_mut()) {
        Err(AutolifeError::PackageNotFound(dir)) if dry_run => {
            ui::info(&format!(
                "Dry run finished; no IPA was produced in {}",
                dir.display()
            ));
            Ok(())
        }
        result => {
            report_outcome(&result?);
            Ok(())
        }
    }
}

fn build_project(
    config: &AutolifeConfig,
    project_dir: &Path,
    runner: &dyn ProcessRunner,
    confirm: &mut dyn Confirm,
) -> Result<PipelineOutcome, AutolifeError> {
    run_in(project_dir, || {
        let mut builder = ios_builder(config, runner, project_dir);
        run_build_pipeline(&mut builder, config.ios.upload_to_testflight, confirm)
    })
}

fn report_outcome(outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::Uploaded { .. } => {
            ui::success("Build uploaded to TestFlight");
        }
        PipelineOutcome::UploadDeclined { ipa } => {
            ui::info(&format!("IPA location: {}", ipa.display()));
        }
        PipelineOutcome::UploadSkipped { ipa, reason } => {
            ui::info(&format!("TestFlight upload skipped: {reason}"));
            ui::info(&format!("IPA location: {}", ipa.display()));
        }
    }
}

fn cmd_test(config_path: &Path, dry_run: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let project_dir = enter_project(&config, "Testing")?;
    let runner = runner_for(dry_run);

    test_project(&config, &project_dir, runner.as_ref())?;
    ui::success("All tests passed");
    Ok(())
}

fn test_project(
    config: &AutolifeConfig,
    project_dir: &Path,
    runner: &dyn ProcessRunner,
) -> Result<(), AutolifeError> {
    run_in(project_dir, || {
        if config.is_ios() {
            run_test_pipeline(&mut ios_builder(config, runner, project_dir))
        } else {
            run_standard_test_pipeline(&standard_builder(config, runner, project_dir))
        }
    })
}

fn cmd_verify(config_path: &Path) -> Result<()> {
    load_config(config_path)?;
    ui::success("Directory verified successfully and ready for automation. Run 'autolife start' to begin!");
    Ok(())
}

fn cmd_init(config_path: &Path, template: Template, force: bool) -> Result<()> {
    if !force {
        ensure_can_write(config_path)?;
    }
    fs::write(config_path, template.contents()?)
        .with_context(|| format!("writing config file {}", config_path.display()))?;
    ui::success(&format!("{} created successfully", config_path.display()));
    println!("Populate the file, then run 'autolife verify'.");
    Ok(())
}

fn ensure_can_write(path: &Path) -> Result<()> {
    if path.exists() {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory {}", parent.display()))?;
    }
    Ok(())
}
