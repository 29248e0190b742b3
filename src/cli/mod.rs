//! Command-line interface for galaxy.
//!
//! Acts both as the external actor (apply, get, delete) and as the host of
//! the reconcilers (reconcile, gc, run).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::config::{self, ResolvedConfig};
use crate::controller::{FileWatcher, Manager};
use crate::core::{GalaxyReconciler, PlanetReconciler, ReconcileReport, Registry};
use crate::domain::{Galaxy, Kind, ObjectKey, Planet, Resource};
use crate::store::{collect_garbage, ignore_not_found, Client, FileStore};

/// galaxy - Owner-tracked Galaxy to Planet reconciliation engine
#[derive(Parser, Debug)]
#[command(name = "galaxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Namespace to operate in (defaults to the configured namespace)
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Explicit config file (otherwise .galaxy/config.yaml is searched upwards)
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or update a galaxy from a YAML manifest
    Apply {
        /// Manifest file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List records
    Get {
        /// Record type
        #[arg(value_enum)]
        resource: ResourceType,

        /// List across every namespace
        #[arg(short = 'A', long)]
        all_namespaces: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Delete a galaxy (its planets go on the next gc)
    Delete {
        /// Record type
        #[arg(value_enum)]
        resource: ResourceType,

        /// Record name
        name: String,
    },

    /// Run one reconcile pass for a single record
    Reconcile {
        /// Record type
        #[arg(value_enum)]
        resource: ResourceType,

        /// Record name
        name: String,
    },

    /// Delete planets whose owning galaxy is gone
    Gc {
        /// Collect across every namespace
        #[arg(short = 'A', long)]
        all_namespaces: bool,
    },

    /// Watch the store and reconcile continuously until interrupted
    Run,

    /// Show resolved configuration (debug)
    Config,
}

/// Record type for CLI (maps to Kind)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ResourceType {
    #[value(alias = "galaxies")]
    Galaxy,

    #[value(alias = "planets")]
    Planet,
}

impl From<ResourceType> for Kind {
    fn from(t: ResourceType) -> Self {
        match t {
            ResourceType::Galaxy => Kind::Galaxy,
            ResourceType::Planet => Kind::Planet,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

/// Everything a command needs, built once from configuration
struct Session {
    config: ResolvedConfig,
    namespace: String,
    registry: Arc<Registry>,
    store: FileStore,
    client: Client,
}

impl Session {
    fn load(namespace: Option<String>, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => config::load_config_from(path)?,
            None => config::load_config()?,
        };

        let namespace = namespace.unwrap_or_else(|| config.controller.namespace.clone());
        let registry = Arc::new(Registry::standard());
        let store = FileStore::open(config.store.clone())
            .with_context(|| format!("Failed to open store at {}", config.store.display()))?;
        let client = Client::new(Arc::new(store.clone()), registry.clone());

        Ok(Self {
            config,
            namespace,
            registry,
            store,
            client,
        })
    }

    fn key(&self, name: &str) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), name)
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let ctx = Session::load(self.namespace, self.config_file.as_deref())?;

        match self.command {
            Commands::Apply { file } => apply(&ctx, &file).await,
            Commands::Get {
                resource,
                all_namespaces,
                output,
            } => get(&ctx, resource.into(), all_namespaces, output).await,
            Commands::Delete { resource, name } => delete(&ctx, resource.into(), &name).await,
            Commands::Reconcile { resource, name } => {
                reconcile(&ctx, resource.into(), &name).await
            }
            Commands::Gc { all_namespaces } => gc(&ctx, all_namespaces).await,
            Commands::Run => run(ctx).await,
            Commands::Config => show_config(&ctx),
        }
    }
}

/// Create a galaxy, or update it in place when it already exists
async fn apply(ctx: &Session, file: &Path) -> Result<()> {
    let mut galaxy = Galaxy::from_file(file)?;
    if galaxy.metadata.name.is_empty() {
        anyhow::bail!("Manifest {} has no metadata.name", file.display());
    }
    if galaxy.metadata.namespace.is_empty() {
        galaxy.metadata.namespace = ctx.namespace.clone();
    }

    let key = galaxy.key();
    let existing = ignore_not_found(ctx.client.get::<Galaxy>(&key).await)?;

    match existing {
        Some(current) => {
            galaxy.metadata.uid = current.metadata.uid;
            galaxy.metadata.resource_version = current.metadata.resource_version;
            galaxy.metadata.creation_timestamp = current.metadata.creation_timestamp;
            ctx.client
                .update(&galaxy)
                .await
                .with_context(|| format!("Failed to update galaxy {}", key))?;
            println!("galaxy/{} configured", key.name);
        }
        None => {
            ctx.client
                .create(&galaxy)
                .await
                .with_context(|| format!("Failed to create galaxy {}", key))?;
            println!("galaxy/{} created", key.name);
        }
    }

    Ok(())
}

/// List galaxies or planets
async fn get(ctx: &Session, kind: Kind, all_namespaces: bool, output: OutputFormat) -> Result<()> {
    let namespace = (!all_namespaces).then_some(ctx.namespace.as_str());

    match kind {
        Kind::Galaxy => {
            let galaxies = ctx.client.list::<Galaxy>(namespace).await?;
            match output {
                OutputFormat::Table => print_galaxies(&galaxies),
                OutputFormat::Json => print_json(&galaxies)?,
                OutputFormat::Yaml => print_yaml(&galaxies)?,
            }
        }
        Kind::Planet => {
            let planets = ctx.client.list::<Planet>(namespace).await?;
            match output {
                OutputFormat::Table => print_planets(&planets),
                OutputFormat::Json => print_json(&planets)?,
                OutputFormat::Yaml => print_yaml(&planets)?,
            }
        }
    }

    Ok(())
}

fn print_galaxies(galaxies: &[Galaxy]) {
    if galaxies.is_empty() {
        println!("No galaxies found");
        return;
    }

    println!("{:<16} {:<24} {:<8} {:<25}", "NAMESPACE", "NAME", "PLANETS", "CREATED");
    println!("{}", "-".repeat(75));

    for galaxy in galaxies {
        let created = galaxy
            .metadata
            .creation_timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<24} {:<8} {:<25}",
            galaxy.metadata.namespace,
            galaxy.metadata.name,
            galaxy.spec.planets.len(),
            created
        );
    }
}

fn print_planets(planets: &[Planet]) {
    if planets.is_empty() {
        println!("No planets found");
        return;
    }

    println!(
        "{:<16} {:<24} {:<16} {:>12} {:<6} {:<6}",
        "NAMESPACE", "NAME", "GALAXY", "DIAMETER_KM", "LIFE", "MOONS"
    );
    println!("{}", "-".repeat(85));

    for planet in planets {
        println!(
            "{:<16} {:<24} {:<16} {:>12} {:<6} {:<6}",
            planet.metadata.namespace,
            planet.metadata.name,
            planet.galaxy().unwrap_or("<none>"),
            planet.spec.diameter_km,
            planet.spec.has_life,
            planet.spec.moons.len()
        );
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_yaml<T: Serialize>(value: &T) -> Result<()> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

/// Delete one record
async fn delete(ctx: &Session, kind: Kind, name: &str) -> Result<()> {
    let key = ctx.key(name);
    let result = match kind {
        Kind::Galaxy => ctx.client.delete::<Galaxy>(&key).await,
        Kind::Planet => ctx.client.delete::<Planet>(&key).await,
    };
    result.with_context(|| format!("Failed to delete {} {}", kind, key))?;

    println!("{}/{} deleted", kind.as_str().to_lowercase(), name);
    if kind == Kind::Galaxy {
        eprintln!("[Owned planets are removed by the next gc]");
    }
    Ok(())
}

/// Run a single reconcile pass and print what it did
async fn reconcile(ctx: &Session, kind: Kind, name: &str) -> Result<()> {
    let key = ctx.key(name);
    let report = match kind {
        Kind::Galaxy => {
            GalaxyReconciler::new(ctx.client.clone(), ctx.registry.clone())
                .reconcile(&key)
                .await
        }
        Kind::Planet => {
            PlanetReconciler::new(ctx.client.clone(), ctx.registry.clone())
                .reconcile(&key)
                .await
        }
    }
    .with_context(|| format!("Failed to reconcile {} {}", kind, key))?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    println!("{} {}: {:?}", report.kind, report.target, report.status);
    for key in &report.created {
        println!("  created   {}", key);
    }
    for key in &report.updated {
        println!("  updated   {}", key);
    }
    for key in &report.unchanged {
        println!("  unchanged {}", key);
    }
}

/// One garbage collection pass
async fn gc(ctx: &Session, all_namespaces: bool) -> Result<()> {
    let namespace = (!all_namespaces).then_some(ctx.namespace.as_str());
    let report = collect_garbage(&ctx.client, namespace).await?;

    for key in &report.deleted {
        println!("planet/{} deleted", key);
    }
    eprintln!(
        "[Scanned {} planets, deleted {}]",
        report.scanned,
        report.deleted.len()
    );
    Ok(())
}

/// Run the controller until Ctrl-C
async fn run(ctx: Session) -> Result<()> {
    let settings = ctx.config.controller.clone();
    let manager = Arc::new(Manager::new(
        ctx.client.clone(),
        ctx.registry.clone(),
        settings.clone(),
    ));

    let watcher = FileWatcher::new(ctx.store.clone(), settings.debounce());
    let handle = watcher.watch(manager.queue().clone())?;

    eprintln!(
        "[Watching {} with {} workers, press Ctrl-C to stop]",
        ctx.store.root().display(),
        settings.workers
    );

    let result = manager
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await;

    handle.stop();
    result
}

/// Show resolved configuration
fn show_config(ctx: &Session) -> Result<()> {
    let cfg = &ctx.config;

    println!("Galaxy Configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:  {}", cfg.home.display());
    println!("  Store: {}", cfg.store.display());
    println!();
    println!("Controller:");
    println!("  Namespace:       {}", ctx.namespace);
    println!("  Workers:         {}", cfg.controller.workers);
    println!("  Requeue after:   {}s", cfg.controller.requeue_after_seconds);
    println!("  Resync interval: {}s", cfg.controller.resync_interval_seconds);
    println!("  Debounce:        {}ms", cfg.controller.debounce_millis);
    println!();
    println!("Kinds:");
    for kind in Kind::ALL {
        if let Ok(api_version) = ctx.registry.api_version(kind) {
            println!("  {:<8} {}", kind, api_version);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_with_plural() {
        let cli = Cli::try_parse_from(["galaxy", "get", "planets", "-n", "milky-way"]).unwrap();
        assert_eq!(cli.namespace.as_deref(), Some("milky-way"));
        match cli.command {
            Commands::Get { resource, .. } => {
                assert_eq!(Kind::from(resource), Kind::Planet)
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_reconcile() {
        let cli = Cli::try_parse_from(["galaxy", "reconcile", "galaxy", "sol"]).unwrap();
        match cli.command {
            Commands::Reconcile { resource, name } => {
                assert_eq!(Kind::from(resource), Kind::Galaxy);
                assert_eq!(name, "sol");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_apply_requires_file() {
        assert!(Cli::try_parse_from(["galaxy", "apply"]).is_err());
    }
}
