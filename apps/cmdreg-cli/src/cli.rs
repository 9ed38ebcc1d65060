use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use cmdreg_core::message::{Message, MessageId};
use cmdreg_core::types::InputType;
use cmdreg_runtime::{RuntimeApp, WatchMode};

const SEND_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "cmdreg", about = "Command registry CLI")]
pub struct Cli {
    #[arg(long, global = true, default_value = "cmdreg.yaml")]
    config: PathBuf,
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve every registry with live folder watching until Ctrl-C
    Run,
    /// Print the command table of one registry, or of all of them
    List(RegistryArg),
    /// Register a command by hand
    Add(AddArgs),
    /// Remove one command from a type
    Remove {
        #[arg(value_name = "TYPE")]
        kind: String,
        name: String,
        #[command(flatten)]
        registry: RegistryArg,
    },
    /// Empty every command of a type
    Clear {
        #[arg(value_name = "TYPE")]
        kind: String,
        #[command(flatten)]
        registry: RegistryArg,
    },
    /// Look a command up across all registries
    Resolve { name: String },
    /// Dispatch a command through the bus and print the forwarded message
    Send(SendArgs),
}

#[derive(Debug, Args, Clone)]
struct RegistryArg {
    /// Registry name; defaults to the first configured one
    #[arg(long)]
    registry: Option<String>,
}

#[derive(Debug, Args, Clone)]
struct AddArgs {
    name: String,
    #[arg(long, allow_hyphen_values = true)]
    id: i64,
    #[arg(long = "type")]
    kind: String,
    #[arg(long, default_value = InputType::BUTTON)]
    input_type: String,
    #[command(flatten)]
    registry: RegistryArg,
}

#[derive(Debug, Args, Clone)]
struct SendArgs {
    name: String,
    /// Event payload; parsed as JSON, otherwise sent as a string
    #[arg(long, default_value = "null")]
    event: String,
    /// Defaults to the input type the command was registered with
    #[arg(long)]
    input_type: Option<String>,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let default_filter = match self.command {
            Command::Run => "info",
            _ => "warn",
        };
        ensure_log_filter(self.verbose, default_filter);
        match self.command {
            Command::Run => {
                let mut app = RuntimeApp::from_config_path(&self.config, WatchMode::Live).await?;
                app.run_until_shutdown().await?;
            }
            Command::List(args) => {
                let app = open_offline(&self.config).await?;
                let table = match args.registry {
                    Some(name) => app.registry(Some(&name))?.snapshot(),
                    None => app.directory.get_all_commands_global(),
                };
                println!("{}", serde_json::to_string_pretty(&table)?);
            }
            Command::Add(args) => {
                let app = open_offline(&self.config).await?;
                let registry = app.registry(args.registry.registry.as_deref())?;
                let added =
                    registry.add_command(&args.name, args.id, &args.kind, args.input_type.as_str())?;
                if added {
                    println!("added '{}' to {}/{}", args.name, registry.name(), args.kind);
                } else {
                    println!("'{}' already exists in {}", args.name, registry.name());
                }
            }
            Command::Remove {
                kind,
                name,
                registry,
            } => {
                let app = open_offline(&self.config).await?;
                let registry = app.registry(registry.registry.as_deref())?;
                let removed = registry.remove_command(&kind, &name)?;
                println!("removed '{}' ({})", name, serde_json::to_string(&removed)?);
            }
            Command::Clear { kind, registry } => {
                let app = open_offline(&self.config).await?;
                let registry = app.registry(registry.registry.as_deref())?;
                registry.clear_type(&kind)?;
                println!("cleared {}/{}", registry.name(), kind);
            }
            Command::Resolve { name } => {
                let app = open_offline(&self.config).await?;
                match app.directory.get_command(&name) {
                    Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
                    None => anyhow::bail!("command '{}' not found", name),
                }
            }
            Command::Send(args) => send(&self.config, args).await?,
        }
        Ok(())
    }
}

async fn open_offline(config: &Path) -> anyhow::Result<RuntimeApp> {
    RuntimeApp::from_config_path(config, WatchMode::Offline)
        .await
        .with_context(|| format!("failed to open registries from {}", config.display()))
}

async fn send(config: &Path, args: SendArgs) -> anyhow::Result<()> {
    let mut app = open_offline(config).await?;
    tracing::debug!(command = %args.name, "resolving command");
    let Some(info) = app.directory.get_command(&args.name) else {
        anyhow::bail!("command '{}' not found", args.name);
    };
    let event = serde_json::from_str(&args.event).unwrap_or(Value::String(args.event.clone()));
    let input_type = args
        .input_type
        .map(InputType::from)
        .unwrap_or_else(|| info.input_type.clone());

    let mut outbound = app.bus.subscribe(&[MessageId(info.id)]);
    app.start()?;
    app.bus
        .publish(Message::command(
            app.config.messages.command(),
            args.name.clone(),
            event,
            input_type,
        ))
        .await?;

    let forwarded = tokio::time::timeout(SEND_TIMEOUT, outbound.recv())
        .await
        .ok()
        .flatten();
    app.shutdown();
    match forwarded {
        Some(message) => println!("{}", serde_json::to_string_pretty(&message)?),
        None => anyhow::bail!("no message forwarded for '{}'", args.name),
    }
    Ok(())
}

/// Admin commands print JSON on stdout, so they default to a quieter filter.
fn ensure_log_filter(verbose: bool, default: &str) {
    if verbose {
        env::set_var("RUST_LOG", "debug");
        return;
    }
    if env::var("RUST_LOG").is_ok() {
        return;
    }
    env::set_var("RUST_LOG", default);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_accepts_negative_id_and_defaults_input_type() {
        let cli = Cli::try_parse_from(["cmdreg", "add", "fire", "--id", "-5", "--type", "buttons"])
            .expect("parse");
        match cli.command {
            Command::Add(args) => {
                assert_eq!(args.id, -5);
                assert_eq!(args.kind, "buttons");
                assert_eq!(args.input_type, InputType::BUTTON);
                assert!(args.registry.registry.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.config, PathBuf::from("cmdreg.yaml"));
    }

    #[test]
    fn test_global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "cmdreg",
            "list",
            "--registry",
            "pads",
            "--config",
            "other.yaml",
            "--verbose",
        ])
        .expect("parse");
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
        assert!(matches!(cli.command, Command::List(RegistryArg { registry: Some(ref r) }) if r == "pads"));
    }
}
