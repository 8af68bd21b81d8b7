use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use trellis_classpath::{ClasspathEntry, IndexedModule, ResolutionResult};
use trellis_config::{init_tracing, load_for_workspace_with_diagnostics, ConfigWarning};
use trellis_core::{Diagnostic, ManifestLocation, Severity};
use trellis_scheduler::{CancellationToken, Scheduler, SchedulerConfig};
use trellis_workspace::{discover_manifests, ClasspathManager, ManagerSettings, MemoryClasspathStore};

#[derive(Parser)]
#[command(
    name = "trellis",
    version,
    about = "Trellis CLI (Maven classpath resolution for multi-module workspaces)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the classpath of one module
    Resolve(ResolveArgs),
    /// Index every module under a workspace root and report coordinates and dependents
    Index(IndexArgs),
    /// Print the JSON schema of `trellis.toml`
    ConfigSchema,
}

#[derive(Args)]
struct ResolveArgs {
    /// Module directory or `pom.xml`
    path: PathBuf,
    /// Workspace root used for module discovery and config lookup (defaults to the module directory)
    #[arg(long)]
    workspace: Option<PathBuf>,
    /// Use repository archives even where a workspace module publishes the coordinate
    #[arg(long)]
    no_workspace_projects: bool,
    /// Do not walk `<modules>` of aggregator POMs
    #[arg(long)]
    no_modules: bool,
    /// Activate a profile (repeatable); replaces the configured list
    #[arg(long = "profile", value_name = "ID")]
    profiles: Vec<String>,
    /// Look up `-sources` archives, fetching them when missing
    #[arg(long)]
    sources: bool,
    /// Look up `-javadoc` archives, fetching them when missing
    #[arg(long)]
    javadoc: bool,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct IndexArgs {
    /// Workspace root
    path: PathBuf,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Resolve(args) => resolve(args),
        Command::Index(args) => index(args),
        Command::ConfigSchema => {
            let schema = trellis_config::json_schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(0)
        }
    }
}

/// A manager over `root` with its manifests discovered and resolved.
struct Session {
    manager: ClasspathManager,
    manifests: Vec<ManifestLocation>,
    results: Vec<ResolutionResult>,
}

fn open_session(root: &Path, adjust: impl FnOnce(&mut ManagerSettings)) -> Result<Session> {
    let (config, config_path, diagnostics) = load_for_workspace_with_diagnostics(root)
        .with_context(|| format!("failed to load config for {}", root.display()))?;
    init_tracing(&config.logging);
    for warning in &diagnostics.warnings {
        match warning {
            ConfigWarning::InvalidValue { toml_path, message } => {
                eprintln!("warning: config {toml_path}: {message}");
            }
            ConfigWarning::LoggingLevelInvalid { value, normalized } => {
                eprintln!("warning: config logging.level {value:?} is invalid; using {normalized:?}");
            }
            other => eprintln!("warning: config: {other:?}"),
        }
    }
    tracing::debug!(
        target = "trellis.config",
        root = %root.display(),
        config = ?config_path,
        "loaded workspace config"
    );

    let mut settings = ManagerSettings::from_config(&config);
    adjust(&mut settings);

    let manager = ClasspathManager::new(
        Scheduler::new(SchedulerConfig::default()),
        Arc::new(MemoryClasspathStore::new()),
        settings,
    );
    let manifests = discover_manifests(root);
    let results = manager.initialize(&manifests, &CancellationToken::new())?;
    Ok(Session {
        manager,
        manifests,
        results,
    })
}

fn resolve(args: ResolveArgs) -> Result<i32> {
    let target = if args.path.is_file() {
        ManifestLocation::new(&args.path)
    } else {
        ManifestLocation::for_module_dir(&args.path)
    };
    if !target.exists() {
        bail!("no pom.xml found at {}", args.path.display());
    }
    let root = match &args.workspace {
        Some(root) => root.clone(),
        None => target.module_dir().to_path_buf(),
    };

    let session = open_session(&root, |settings| {
        if args.no_workspace_projects {
            settings.resolve.resolve_workspace_projects = false;
        }
        if args.no_modules {
            settings.resolve.include_modules = false;
        }
        if !args.profiles.is_empty() {
            settings.resolve.active_profiles = args.profiles.clone();
        }
        settings.materialize.download_sources |= args.sources;
        settings.materialize.download_javadoc |= args.javadoc;
    })?;

    // The target may live outside the discovered tree; resolve it explicitly either way.
    let config = session.manager.config().clone();
    let result = session
        .manager
        .resolve_now(&target, Some(&config), &CancellationToken::new())?;

    let exit = if result.has_errors() { 1 } else { 0 };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_resolution(&result);
    }
    Ok(exit)
}

#[derive(Serialize)]
struct IndexReport {
    root: PathBuf,
    modules: Vec<IndexedModule>,
    diagnostics: Vec<Diagnostic>,
}

fn index(args: IndexArgs) -> Result<i32> {
    if !args.path.is_dir() {
        bail!("{} is not a directory", args.path.display());
    }
    let session = open_session(&args.path, |_| {})?;
    let snapshot = session.manager.index().snapshot();
    let diagnostics: Vec<Diagnostic> = session
        .results
        .iter()
        .flat_map(|result| result.diagnostics.iter().cloned())
        .collect();
    let exit = if diagnostics.iter().any(Diagnostic::is_error) {
        1
    } else {
        0
    };

    let report = IndexReport {
        root: args.path.clone(),
        modules: snapshot.modules,
        diagnostics,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("indexed: {}", report.root.display());
        println!("  manifests: {}", session.manifests.len());
        for module in &report.modules {
            let marker = if module.publishes { "" } else { " (shadowed)" };
            println!("  {} {}{}", module.coordinate, module.location, marker);
            for dependent in &module.dependents {
                println!("    <- {dependent}");
            }
        }
        print_diagnostics(&report.diagnostics);
    }
    Ok(exit)
}

fn print_resolution(result: &ResolutionResult) {
    println!("classpath: {}", result.location);
    for entry in &result.entries {
        match entry {
            ClasspathEntry::Project { location } => println!("  project {location}"),
            ClasspathEntry::Library {
                archive_path,
                source_path,
                attributes,
                ..
            } => {
                println!(
                    "  library {} [{}]{}",
                    archive_path.display(),
                    attributes.scope.as_str(),
                    if source_path.is_some() { " +sources" } else { "" }
                );
            }
        }
    }
    print_diagnostics(&result.diagnostics);
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    let mut errors = 0;
    let mut warnings = 0;
    for d in diagnostics {
        let severity = match d.severity {
            Severity::Error => {
                errors += 1;
                "error"
            }
            Severity::Warning => {
                warnings += 1;
                "warning"
            }
            Severity::Info => "info",
        };
        match d.line {
            Some(line) => println!("{}:{}: {severity}: {}", d.location, line, d.message),
            None => println!("{}: {severity}: {}", d.location, d.message),
        }
    }
    println!("summary: {errors} errors, {warnings} warnings");
}
