use anyhow::{anyhow, Context, Result};
use azrec::azure::auth::ArmCredentials;
use azrec::azure::client::ArmClient;
use azrec::config::Config;
use azrec::manifest::Manifest;
use azrec::reconcile::{Outcome, Reconciler};
use azrec::resource::{
    get_all_resource_keys, get_resource, query_all_types, query_resources, QueryIntent,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Version injected at compile time via AZREC_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("AZREC_VERSION") {
    Some(v) => v,
    None => "dev",
};

/// Declarative reconciler for Azure Resource Manager resources
#[derive(Parser, Debug)]
#[command(name = "azrec", version = VERSION, about, long_about = None)]
struct Args {
    /// Azure subscription ID to operate on
    #[arg(short, long)]
    subscription: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a desired-state manifest
    Apply {
        /// Path to the YAML manifest
        manifest: PathBuf,

        /// Report what would change without performing any mutating call
        #[arg(long)]
        check: bool,
    },
    /// Fetch a single resource
    Get {
        /// Resource type key (see `azrec types`)
        resource_type: String,
        /// Resource name
        name: String,
        /// Resource group; falls back to the saved default
        #[arg(short = 'g', long)]
        resource_group: Option<String>,
    },
    /// List resources of one type, or of all registered types
    List {
        /// Resource type key; omit to list every registered type
        resource_type: Option<String>,
        #[arg(short = 'g', long)]
        resource_group: Option<String>,
        /// ARM $filter expression, e.g. "tagName eq 'env'"
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show the registered resource types
    Types,
    /// Show or change the saved defaults
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the saved configuration
    Show,
    /// Save a default subscription ID
    SetSubscription { subscription_id: String },
    /// Save a default resource group for get/list queries
    SetResourceGroup { resource_group: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: could not open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("azrec started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("azrec").join("azrec.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".azrec").join("azrec.log");
    }
    PathBuf::from("azrec.log")
}

#[derive(Serialize)]
struct ApplyReport {
    finished_at: String,
    check_mode: bool,
    changed: usize,
    results: Vec<EntryReport>,
}

#[derive(Serialize)]
struct EntryReport {
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    resource_group: String,
    #[serde(flatten)]
    outcome: Outcome,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match &args.command {
        Command::Apply { manifest, check } => cmd_apply(&args, manifest, *check).await,
        Command::Get {
            resource_type,
            name,
            resource_group,
        } => cmd_get(&args, resource_type, name, resource_group.as_deref()).await,
        Command::List {
            resource_type,
            resource_group,
            filter,
        } => {
            cmd_list(
                &args,
                resource_type.as_deref(),
                resource_group.as_deref(),
                filter.as_deref(),
            )
            .await
        }
        Command::Types => cmd_types(),
        Command::Config { action } => cmd_config(action),
    }
}

/// Subscription precedence: CLI flag > manifest > saved config > Azure CLI
/// profile / environment
fn resolve_subscription(args: &Args, from_manifest: Option<&str>) -> Result<String> {
    if let Some(s) = &args.subscription {
        return Ok(s.clone());
    }
    if let Some(s) = from_manifest {
        return Ok(s.to_string());
    }
    Config::load().effective_subscription().ok_or_else(|| {
        anyhow!("No subscription configured. Set AZURE_SUBSCRIPTION_ID or use --subscription")
    })
}

async fn build_client(args: &Args, from_manifest: Option<&str>) -> Result<ArmClient> {
    let subscription = resolve_subscription(args, from_manifest)?;
    tracing::info!("Using subscription: {}", subscription);

    let credentials =
        ArmCredentials::from_env().context("Failed to initialize Azure credentials")?;
    ArmClient::new(credentials, &subscription)
}

async fn cmd_apply(args: &Args, path: &PathBuf, check: bool) -> Result<()> {
    let manifest = Manifest::from_path(path)?;
    manifest.validate()?;

    let client = build_client(args, manifest.subscription.as_deref()).await?;
    let reconciler = Reconciler::new(&client, check);

    let mut results = Vec::new();
    let mut changed = 0;

    for entry in &manifest.resources {
        let def = get_resource(&entry.resource_type)
            .ok_or_else(|| anyhow!("unknown resource type '{}'", entry.resource_type))?;

        let outcome = reconciler
            .reconcile(
                def,
                &entry.resource_group,
                &entry.name,
                entry.state,
                &entry.properties,
            )
            .await?;

        if outcome.changed {
            changed += 1;
        }
        results.push(EntryReport {
            resource_type: entry.resource_type.clone(),
            name: entry.name.clone(),
            resource_group: entry.resource_group.clone(),
            outcome,
        });
    }

    let report = ApplyReport {
        finished_at: chrono::Utc::now().to_rfc3339(),
        check_mode: check,
        changed,
        results,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Resource-group precedence: CLI flag > saved config default
fn resolve_resource_group(flag: Option<&str>, config: &Config) -> Option<String> {
    flag.map(str::to_string)
        .or_else(|| config.resource_group.clone())
}

async fn cmd_get(
    args: &Args,
    resource_type: &str,
    name: &str,
    resource_group: Option<&str>,
) -> Result<()> {
    let def = lookup_type(resource_type)?;
    let client = build_client(args, None).await?;

    let resource_group = resolve_resource_group(resource_group, &Config::load());
    let intent = QueryIntent::resolve(resource_group.as_deref(), Some(name))?;
    let items = query_resources(&client, def, &intent, None).await?;

    // Not-found is "no results", reported as null
    match items.into_iter().next() {
        Some(item) => println!("{}", serde_json::to_string_pretty(&item)?),
        None => println!("null"),
    }
    Ok(())
}

async fn cmd_list(
    args: &Args,
    resource_type: Option<&str>,
    resource_group: Option<&str>,
    filter: Option<&str>,
) -> Result<()> {
    let client = build_client(args, None).await?;
    let resource_group = resolve_resource_group(resource_group, &Config::load());

    match resource_type {
        Some(key) => {
            let def = lookup_type(key)?;
            let intent = QueryIntent::resolve(resource_group.as_deref(), None)?;
            let items = query_resources(&client, def, &intent, filter).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        None => {
            let listings = query_all_types(&client, resource_group.as_deref()).await?;
            let mut by_type = serde_json::Map::new();
            for (key, items) in listings {
                by_type.insert(key.to_string(), serde_json::Value::Array(items));
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::Value::Object(by_type))?
            );
        }
    }
    Ok(())
}

fn cmd_types() -> Result<()> {
    for key in get_all_resource_keys() {
        if let Some(def) = get_resource(key) {
            println!(
                "{:<24} {} ({}, api-version {})",
                key,
                def.display_name,
                def.arm_type(),
                def.api_version
            );
        }
    }
    Ok(())
}

fn cmd_config(action: &ConfigAction) -> Result<()> {
    let mut config = Config::load();
    match action {
        ConfigAction::Show => println!("{}", serde_json::to_string_pretty(&config)?),
        ConfigAction::SetSubscription { subscription_id } => {
            config.set_subscription(subscription_id)?;
            println!("Default subscription set to {}", subscription_id);
        }
        ConfigAction::SetResourceGroup { resource_group } => {
            config.set_resource_group(resource_group)?;
            println!("Default resource group set to {}", resource_group);
        }
    }
    Ok(())
}

fn lookup_type(key: &str) -> Result<&'static azrec::resource::ResourceDef> {
    get_resource(key).ok_or_else(|| {
        anyhow!(
            "unknown resource type '{}' (known types: {})",
            key,
            get_all_resource_keys().join(", ")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_overrides_configured_resource_group() {
        let config = Config {
            subscription_id: None,
            resource_group: Some("rg-saved".to_string()),
        };
        assert_eq!(
            resolve_resource_group(Some("rg-flag"), &config).as_deref(),
            Some("rg-flag")
        );
        assert_eq!(
            resolve_resource_group(None, &config).as_deref(),
            Some("rg-saved")
        );
        assert_eq!(resolve_resource_group(None, &Config::default()), None);
    }
}
