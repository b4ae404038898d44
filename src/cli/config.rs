use std::path::Path;

use crate::app_settings::Config;
use crate::cli::context::CliContext;
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::{Map, Value as JsonValue};
use tokio::fs;
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (file, env overrides, defaults)
    Show,

    /// Write one key to the configuration file
    Set {
        /// Dotted key, e.g. `timeouts.element_ms`
        key: String,

        /// JSON literal, or a bare string
        value: String,
    },

    /// Print one key of the effective configuration
    Get {
        /// Dotted key, e.g. `checkout.email`
        key: String,
    },

    /// Overwrite the configuration file with defaults
    Reset,

    /// Parse and validate the configuration file
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path();
    match args.action {
        ConfigAction::Show => {
            println!("# effective configuration, file: {}", path.display());
            print!("{}", serde_yaml::to_string(ctx.config())?);
        }
        ConfigAction::Get { key } => {
            let tree = serde_json::to_value(ctx.config())?;
            let value = lookup(&tree, &key_segments(&key)?)
                .with_context(|| format!("{} not found in configuration", key))?;
            print!("{}", serde_yaml::to_string(value)?);
        }
        ConfigAction::Set { key, value } => {
            let updated = set_key(read_file(path).await?, &key, &value)?;
            write_file(path, &updated).await?;
            info!(%key, "configuration key updated");
            println!("{} = {} saved to {}", key, value, path.display());
        }
        ConfigAction::Reset => {
            write_file(path, &Config::default()).await?;
            println!("Defaults written to {}", path.display());
        }
        ConfigAction::Validate => {
            if !fs::try_exists(path).await? {
                println!("No configuration file at {}; defaults apply", path.display());
                return Ok(());
            }
            read_file(path)
                .await?
                .validate()
                .with_context(|| format!("validating {}", path.display()))?;
            println!("{} is valid", path.display());
        }
    }
    Ok(())
}

/// Apply `key = raw` to `config`, re-checking types and invariants
fn set_key(config: Config, key: &str, raw: &str) -> Result<Config> {
    let mut tree = serde_json::to_value(&config)?;
    // unparseable input is taken as a plain string
    let value = serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()));
    assign(&mut tree, &key_segments(key)?, value)?;
    let updated: Config = serde_json::from_value(tree)
        .with_context(|| format!("{} does not accept {:?}", key, raw))?;
    updated.validate()?;
    Ok(updated)
}

async fn read_file(path: &Path) -> Result<Config> {
    if !fs::try_exists(path).await? {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn write_file(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, serde_yaml::to_string(config)?)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

fn key_segments(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key.split('.').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn assign(tree: &mut JsonValue, path: &[&str], value: JsonValue) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        bail!("configuration key cannot be empty");
    };
    let mut node = tree;
    for segment in parents {
        node = as_object(node, segment)?
            .entry((*segment).to_string())
            .or_insert(JsonValue::Null);
    }
    as_object(node, last)?.insert((*last).to_string(), value);
    Ok(())
}

fn as_object<'a>(node: &'a mut JsonValue, segment: &str) -> Result<&'a mut Map<String, JsonValue>> {
    if node.is_null() {
        *node = JsonValue::Object(Map::new());
    }
    match node {
        JsonValue::Object(map) => Ok(map),
        _ => bail!("cannot set {} below a scalar value", segment),
    }
}

fn lookup<'a>(tree: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    path.iter()
        .try_fold(tree, |node, segment| node.as_object()?.get(*segment))
}
