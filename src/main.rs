use anyhow::{Context, Result};
use bundle_patcher::config::{load_project, resolve_kernel};
use bundle_patcher::safety::{ProjectGuard, SafetyError};
use bundle_patcher::workflow::{Step, Targets, Workflow};
use bundle_patcher::{BundleDescriptor, ConfigurationFormat, DryRunFs, LocalFs, Outcome};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bundle-patcher")]
#[command(about = "Register a generated bundle in the kernel, routing and services configuration", long_about = None)]
#[command(version)]
struct Cli {
    /// Log engine decisions (same as RUST_LOG=bundle_patcher=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a bundle in the project's configuration files
    Register {
        #[command(flatten)]
        bundle: BundleArgs,

        #[command(flatten)]
        targets: TargetArgs,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Report which registrations are present without modifying files
    Status {
        #[command(flatten)]
        bundle: BundleArgs,

        #[command(flatten)]
        targets: TargetArgs,
    },
}

#[derive(Args)]
struct BundleArgs {
    /// Bundle namespace, e.g. Acme/BlogBundle
    namespace: String,

    /// Bundle name (defaults to the namespace without separators)
    #[arg(long)]
    bundle_name: Option<String>,

    /// Configuration format: annotation, yml, xml or php
    /// (defaults to xml for shared bundles, annotation otherwise)
    #[arg(short, long)]
    format: Option<ConfigurationFormat>,

    /// Shared bundle: its services are loaded by its own extension
    #[arg(long)]
    shared: bool,
}

#[derive(Args)]
struct TargetArgs {
    /// Project root (defaults to the current directory)
    #[arg(short, long)]
    project_root: Option<PathBuf>,

    /// Bootstrap file, relative to the project root
    #[arg(long)]
    kernel: Option<PathBuf>,

    /// Routing file, relative to the project root
    #[arg(long)]
    routing: Option<PathBuf>,

    /// Services configuration file, relative to the project root
    #[arg(long)]
    services: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Register {
            bundle,
            targets,
            dry_run,
            diff,
        } => cmd_register(bundle, targets, dry_run, diff),

        Commands::Status { bundle, targets } => cmd_status(bundle, targets),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("bundle_patcher=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

impl BundleArgs {
    fn descriptor(&self) -> Result<BundleDescriptor> {
        BundleDescriptor::new(
            &self.namespace,
            self.bundle_name.as_deref(),
            self.format
                .unwrap_or_else(|| ConfigurationFormat::default_for(self.shared)),
            self.shared,
        )
        .with_context(|| format!("Invalid bundle \"{}\"", self.namespace))
    }
}

/// Resolve the project root and every target path.
///
/// Priority order for each target:
/// 1. Explicit command-line flag
/// 2. `bundle-patcher.toml` at the project root
/// 3. Built-in default (the kernel is discovered under `app/` when missing)
fn resolve_targets(args: &TargetArgs) -> Result<(PathBuf, Targets)> {
    let root = match &args.project_root {
        Some(path) => path.clone(),
        None => env::current_dir().context("Could not read the current directory")?,
    };
    let guard = ProjectGuard::new(&root)
        .with_context(|| format!("Invalid project root: {}", root.display()))?;
    let root = guard.project_root().to_path_buf();

    let config = load_project(&root)?;

    let kernel = match &args.kernel {
        Some(path) => root.join(path),
        None => resolve_kernel(&root, &config),
    };
    let routing = root.join(args.routing.as_deref().unwrap_or(Path::new(&config.routing.path)));
    let services = root.join(
        args.services
            .as_deref()
            .unwrap_or(Path::new(&config.services.path)),
    );

    let targets = Targets {
        kernel: guarded(&guard, kernel)?,
        layout: config.bootstrap_layout(),
        routing: guarded(&guard, routing)?,
        services: guarded(&guard, services)?,
    };
    Ok((root, targets))
}

/// Reject targets outside the project. A path that cannot be resolved is
/// kept as is; the manipulators report the missing file.
fn guarded(guard: &ProjectGuard, path: PathBuf) -> Result<PathBuf> {
    match guard.validate_path(&path) {
        Ok(canonical) => Ok(canonical),
        Err(SafetyError::Canonicalize(_)) => Ok(path),
        Err(err) => Err(err.into()),
    }
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- {file} (original)").dimmed());
    println!("{}", format!("+++ {file} (patched)").dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_register(
    bundle: BundleArgs,
    targets: TargetArgs,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let bundle = bundle.descriptor()?;
    let (root, targets) = resolve_targets(&targets)?;

    println!("Project: {}", root.display());
    println!("Bundle: {}", bundle.class_name());
    println!();

    // Changed files and their content before and after the run
    let mut changes: BTreeMap<PathBuf, (String, String)> = BTreeMap::new();

    let report = if dry_run {
        println!("{}", "[DRY RUN - showing what would be applied]".cyan());
        let dry = DryRunFs::new(LocalFs);
        let report = Workflow::with_fs(&root, targets, &dry).register(&bundle);
        for (path, after) in dry.writes() {
            let before = fs::read_to_string(&path).unwrap_or_default();
            changes.insert(path, (before, after));
        }
        report
    } else {
        let before: BTreeMap<PathBuf, String> =
            [&targets.kernel, &targets.routing, &targets.services]
                .into_iter()
                .filter_map(|path| Some((path.clone(), fs::read_to_string(path).ok()?)))
                .collect();
        let report = Workflow::new(&root, targets).register(&bundle);
        for step in &report.steps {
            if let Ok(Outcome::Applied { file }) = &step.result {
                let after = fs::read_to_string(file).unwrap_or_default();
                let original = before.get(file).cloned().unwrap_or_default();
                changes.insert(file.clone(), (original, after));
            }
        }
        report
    };

    for step in &report.steps {
        print_step(step, dry_run);
    }

    if show_diff {
        for (file, (before, after)) in &changes {
            if before != after {
                display_diff(&relative_to(&root, file), before, after);
            }
        }
    }

    println!();
    if report.is_complete() {
        println!("{}", report.summary().join("\n").green().bold());
    } else {
        let mut summary = report.summary().into_iter();
        if let Some(headline) = summary.next() {
            eprintln!("{}", headline.yellow().bold());
        }
        for line in summary {
            eprintln!("{line}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn print_step(step: &Step, dry_run: bool) {
    match &step.result {
        Ok(Outcome::Applied { .. }) => {
            let verb = if dry_run { "Would apply" } else { "Applied" };
            println!("{} {}: {}", "✓".green(), step.description, verb);
        }
        Ok(Outcome::AlreadyPresent { .. }) => {
            println!("{} {}: Already present", "⊙".yellow(), step.description);
            println!("  {}", step.note.dimmed());
        }
        Ok(Outcome::AnchorNotFound { reason, .. }) => {
            eprintln!("{} {}: Failed - {}", "✗".red(), step.description, reason);
        }
        Ok(Outcome::MalformedTarget { reason, .. }) => {
            eprintln!("{} {}: Malformed - {}", "✗".red(), step.description, reason);
        }
        Err(e) => {
            eprintln!("{} {}: Error - {}", "✗".red(), step.description, e);
        }
    }
}

fn cmd_status(bundle: BundleArgs, targets: TargetArgs) -> Result<()> {
    let bundle = bundle.descriptor()?;
    let (root, targets) = resolve_targets(&targets)?;

    println!("{}", "Registration Status Report".bold());
    println!("Project: {}", root.display());
    println!("Bundle: {}", bundle.class_name());
    println!();

    // Read-only: every write lands in the overlay
    let dry = DryRunFs::new(LocalFs);
    let report = Workflow::with_fs(&root, targets, &dry).register(&bundle);

    let mut registered = Vec::new();
    let mut pending = Vec::new();
    let mut blocked = Vec::new();

    for step in &report.steps {
        match &step.result {
            Ok(Outcome::AlreadyPresent { .. }) => registered.push(step.description.clone()),
            Ok(Outcome::Applied { .. }) => pending.push(step.description.clone()),
            Ok(Outcome::AnchorNotFound { reason, .. })
            | Ok(Outcome::MalformedTarget { reason, .. }) => {
                blocked.push((step.description.clone(), reason.clone()))
            }
            Err(e) => blocked.push((step.description.clone(), e.to_string())),
        }
    }

    if !registered.is_empty() {
        println!(
            "{} {} ({} steps)",
            "✓".green(),
            "REGISTERED".green().bold(),
            registered.len()
        );
        for description in &registered {
            println!("  - {}", description);
        }
        println!();
    }

    if !pending.is_empty() {
        println!(
            "{} {} ({} steps)",
            "⊙".yellow(),
            "PENDING".yellow().bold(),
            pending.len()
        );
        for description in &pending {
            println!("  - {}", description);
        }
        println!();
    }

    if !blocked.is_empty() {
        println!(
            "{} {} ({} steps)",
            "✗".red(),
            "NEEDS MANUAL CHANGES".red().bold(),
            blocked.len()
        );
        for (description, reason) in &blocked {
            println!("  - {} ({})", description, reason.dimmed());
        }
        println!();
    }

    Ok(())
}

fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
