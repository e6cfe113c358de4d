use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use weave::config::{WeaveConfig, CONFIG_FILE};
use weave::merge::{
    CancelToken, Collaborators, MergeOutcome, ModelMergeDriver, StorageMerger,
    ThreadedScopeManager,
};
use weave::models::{ModelProvider, PatternModelProvider, StaticModelRegistry};
use weave::resource::{ProjectMap, ResourceResolver};
use weave_git::{GitOid, GitStore, GixStore};

mod telemetry;

/// Logical-model-aware three-way merge for git
///
/// Weave merges three trees the way `git merge` would, but treats files
/// that belong to one logical model (multi-file diagrams, generated pairs,
/// anything whose meaningful unit of change spans several files) as a
/// single unit, delegated to a model-specific merger.
///
/// Model groups are configured in `.weave.toml` at the repository root:
///
///   [[models.groups]]
///   name = "diagram"
///   patterns = ["*.dia", "*.dia.layout"]
#[derive(Parser)]
#[command(name = "weave")]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge two revisions into the working tree and index
    ///
    /// Writes merge results to the working tree and stages them; conflicted
    /// paths are left at stages 1/2/3 with markers in the working tree,
    /// exactly as `git merge` leaves them.
    Merge {
        /// Revision of the merge base
        base: String,
        /// Revision of our side
        ours: String,
        /// Revision of their side
        theirs: String,

        /// Path to the repository (default: current directory)
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Emit the outcome as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    telemetry::init();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Merge {
            base,
            ours,
            theirs,
            repo,
            json,
        } => merge_command(&base, &ours, &theirs, &repo, json),
    }
}

fn merge_command(
    base: &str,
    ours: &str,
    theirs: &str,
    repo: &Path,
    json: bool,
) -> Result<ExitCode> {
    let config = WeaveConfig::load(&repo.join(CONFIG_FILE))?;

    // The store backs worker threads spawned by the scope manager, so it
    // needs the full process lifetime.
    let store: &'static GixStore = Box::leak(Box::new(
        GixStore::open(repo).with_context(|| format!("opening repository {}", repo.display()))?,
    ));
    let resolver = Arc::new(ProjectMap::new(store, &config.projects.roots)?);
    let scope = ThreadedScopeManager::new(
        Arc::clone(&resolver) as Arc<dyn ResourceResolver>
    );

    let mut providers: Vec<Arc<dyn ModelProvider>> = Vec::new();
    for group in &config.models.groups {
        providers.push(Arc::new(PatternModelProvider::new(
            &group.name,
            &group.patterns,
        )?));
    }
    let registry = Arc::new(StaticModelRegistry::new(providers));

    let base_oid = resolve_tree(store, base).with_context(|| format!("resolving '{base}'"))?;
    let ours_oid = resolve_tree(store, ours).with_context(|| format!("resolving '{ours}'"))?;
    let theirs_oid =
        resolve_tree(store, theirs).with_context(|| format!("resolving '{theirs}'"))?;

    let storage = StorageMerger::new();
    let driver = ModelMergeDriver::new(Collaborators {
        store,
        resolver: &*resolver,
        registry,
        scope: &scope,
        storage: &storage,
        cancel: CancelToken::new(),
    })
    .model_aware(config.merge.model_aware)
    .denied_providers(config.merge.denied_providers.clone());

    let outcome = driver.merge_trees(base_oid, ours_oid, theirs_oid)?;
    report(&outcome, json)?;
    Ok(if outcome.clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Resolve a revision to a tree id, peeling commits.
fn resolve_tree(store: &dyn GitStore, spec: &str) -> Result<GitOid> {
    let oid = store.rev_parse(spec)?;
    match store.read_commit(oid) {
        Ok(commit) => Ok(commit.tree_oid),
        Err(_) => Ok(oid),
    }
}

fn report(outcome: &MergeOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    for conflict in &outcome.conflicts {
        println!("CONFLICT ({}): {}", conflict.description, conflict.path);
    }
    if outcome.clean {
        println!("Merge completed cleanly ({} path(s)).", outcome.merged.len());
    } else {
        println!(
            "Merge completed with {} conflict(s); fix them and stage the results.",
            outcome.conflicts.len()
        );
    }
    Ok(())
}
