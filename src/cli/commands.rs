//! Command dispatch: each subcommand maps to one workload operation

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::{KafkaUiWorkload, Workload};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::domain::{parse_entry, WriteMode};
use crate::exitcode;
use crate::infrastructure::di::ServiceContainer;

/// Run the selected subcommand; returns the process exit code.
pub fn execute_command(cli: &Cli) -> CliResult<i32> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see --help".to_string(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            return Ok(exitcode::OK);
        }
        Commands::Config {
            command: ConfigCommands::Template,
        } => {
            output::info(&Settings::template());
            return Ok(exitcode::OK);
        }
        _ => {}
    }

    let settings = load_settings(cli)?;
    if let Commands::Config { command } = command {
        return _config(command, cli, &settings);
    }

    let services = ServiceContainer::new(settings);
    let workload = services.workload();

    match command {
        Commands::Start => _start(&workload),
        Commands::Stop => _stop(&workload),
        Commands::Restart => _restart(&workload),
        Commands::Status => _status(&workload),
        Commands::Installed => _installed(&workload),
        Commands::Layer => _layer(&workload),
        Commands::Read { path } => _read(&workload, path),
        Commands::Write {
            path,
            content,
            append,
        } => _write(&workload, path, content, *append),
        Commands::Exec { env, cwd, command } => _exec(&workload, command, env, cwd.as_deref()),
        Commands::SetEnv { vars } => _set_env(&workload, vars),
        Commands::CheckSocket { host, port } => _check_socket(&workload, host, *port),
        Commands::Config { .. } | Commands::Completion { .. } => Ok(exitcode::OK),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(root) = &cli.root {
        settings.container_root = root.clone();
    }
    debug!(root = %settings.container_root.display(), "settings loaded");
    Ok(settings)
}

#[instrument(skip(workload))]
fn _start(workload: &KafkaUiWorkload) -> CliResult<i32> {
    workload.start()?;
    output::success(&format!("{} started", workload.service()));
    Ok(exitcode::OK)
}

#[instrument(skip(workload))]
fn _stop(workload: &KafkaUiWorkload) -> CliResult<i32> {
    workload.stop()?;
    output::success(&format!("{} stopped", workload.service()));
    Ok(exitcode::OK)
}

#[instrument(skip(workload))]
fn _restart(workload: &KafkaUiWorkload) -> CliResult<i32> {
    workload.restart()?;
    output::success(&format!("{} restarted", workload.service()));
    Ok(exitcode::OK)
}

#[instrument(skip(workload))]
fn _status(workload: &KafkaUiWorkload) -> CliResult<i32> {
    let active = workload.active()?;
    if !workload.installed() {
        output::action("service", &format!("{} (container unreachable)", workload.service()));
    } else if let Some(info) = workload.service_info()? {
        output::action("service", &format!("{} ({}, startup {})", info.name, info.current, info.startup));
    } else {
        output::action("service", &format!("{} (not in plan)", workload.service()));
    }

    if active {
        output::success("active");
        Ok(exitcode::OK)
    } else {
        output::failure("not active");
        Ok(exitcode::INACTIVE)
    }
}

#[instrument(skip(workload))]
fn _installed(workload: &KafkaUiWorkload) -> CliResult<i32> {
    if workload.installed() {
        output::success("container reachable");
        Ok(exitcode::OK)
    } else {
        output::failure("container unreachable");
        Ok(exitcode::INACTIVE)
    }
}

#[instrument(skip(workload))]
fn _layer(workload: &KafkaUiWorkload) -> CliResult<i32> {
    let yaml = workload
        .layer()
        .to_yaml()
        .map_err(crate::application::WorkloadError::from)?;
    print!("{yaml}");
    Ok(exitcode::OK)
}

#[instrument(skip(workload))]
fn _read(workload: &KafkaUiWorkload, path: &Path) -> CliResult<i32> {
    let lines = workload.read(path)?;
    output::info(&lines.join("\n"));
    Ok(exitcode::OK)
}

#[instrument(skip(workload, content))]
fn _write(workload: &KafkaUiWorkload, path: &Path, content: &str, append: bool) -> CliResult<i32> {
    let content = if content == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        content.to_string()
    };
    let mode = if append {
        WriteMode::Append
    } else {
        WriteMode::Overwrite
    };

    workload.write(&content, path, mode)?;
    output::action("written", &path.display());
    Ok(exitcode::OK)
}

#[instrument(skip(workload))]
fn _exec(
    workload: &KafkaUiWorkload,
    command: &[String],
    env: &[String],
    cwd: Option<&Path>,
) -> CliResult<i32> {
    let environment = parse_env_args(env)?;
    let env = (!environment.is_empty()).then_some(&environment);

    let output = workload.exec(command, env, cwd)?;
    print!("{output}");
    Ok(exitcode::OK)
}

#[instrument(skip(workload))]
fn _set_env(workload: &KafkaUiWorkload, vars: &[String]) -> CliResult<i32> {
    workload.set_environment(vars)?;
    output::action("updated", &workload.settings().paths.env_file);
    Ok(exitcode::OK)
}

#[instrument(skip(workload))]
fn _check_socket(workload: &KafkaUiWorkload, host: &str, port: u16) -> CliResult<i32> {
    if workload.check_socket(host, port) {
        output::success(&format!("{host}:{port} open"));
        Ok(exitcode::OK)
    } else {
        output::failure(&format!("{host}:{port} closed"));
        Ok(exitcode::INACTIVE)
    }
}

fn _config(command: &ConfigCommands, cli: &Cli, settings: &Settings) -> CliResult<i32> {
    match command {
        ConfigCommands::Show => {
            output::header("# effective configuration");
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::action("global", &path.display()),
                None => output::warning("no home directory, global config disabled"),
            }
            if let Some(path) = &cli.config {
                output::action("explicit", &path.display());
            }
        }
        ConfigCommands::Template => output::info(&Settings::template()),
    }
    Ok(exitcode::OK)
}

/// Parse `--env KEY=VALUE` arguments; each must contain `=` and a key.
fn parse_env_args(env: &[String]) -> CliResult<BTreeMap<String, String>> {
    env.iter()
        .map(|entry| {
            entry
                .contains('=')
                .then(|| parse_entry(entry))
                .flatten()
                .ok_or_else(|| CliError::InvalidArgs(format!("expected KEY=VALUE, got {entry:?}")))
        })
        .collect()
}
