//! ReelVC command-line management tool.
//!
//! Provides subcommands for managing projects, commits, and branches,
//! inspecting the project graph, editing branch workspaces, and driving the
//! merge-request and fork-request review flows. The acting principal is
//! named with the global `--as` flag; authentication lives outside this
//! tool.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use console::style;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use reelvc_core::config::AppConfig;
use reelvc_core::db::Database;
use reelvc_core::models::ClipStatus;
use reelvc_core::{MemoryCache, RepoEngine};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// ReelVC command-line management tool.
#[derive(Parser, Debug)]
#[command(
    name = "reelvc",
    version,
    about = "Manage and inspect a ReelVC media version-control store"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "/etc/reelvc/config.toml")]
    config: PathBuf,

    /// Acting principal (user id) for permission checks.
    #[arg(long = "as", global = true, default_value = "local", value_name = "USER")]
    principal: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./reelvc.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Create a commit on a branch.
    Commit {
        /// Project id.
        project: String,

        /// Commit message.
        #[arg(short, long)]
        message: String,

        /// Asset snapshot as a JSON object.
        #[arg(short, long, default_value = "{}")]
        snapshot: String,

        /// Branch to commit on.
        #[arg(short, long, default_value = "main")]
        branch: String,

        /// Explicit parent commit hash (defaults to the branch HEAD).
        #[arg(long)]
        parent: Option<String>,
    },

    /// Manage branches.
    Branch {
        #[command(subcommand)]
        action: BranchAction,
    },

    /// Show the project graph with contributor statistics.
    Graph {
        /// Project id.
        project: String,
    },

    /// Show the state at a branch HEAD.
    Head {
        /// Project id.
        project: String,

        /// Branch name.
        #[arg(short, long, default_value = "main")]
        branch: String,
    },

    /// Read or write a branch workspace document.
    Workspace {
        #[command(subcommand)]
        action: WorkspaceAction,
    },

    /// Manage merge requests.
    Mr {
        #[command(subcommand)]
        action: MrAction,
    },

    /// Manage fork requests.
    ForkRequest {
        #[command(subcommand)]
        action: ForkRequestAction,
    },

    /// Manage clip segments.
    Clip {
        #[command(subcommand)]
        action: ClipAction,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectAction {
    /// Create a project (with its main branch).
    Create {
        /// Project name.
        name: String,

        /// Optional description.
        #[arg(short, long)]
        description: Option<String>,

        /// Comma-separated tags.
        #[arg(short, long)]
        tags: Option<String>,

        /// Make the project private.
        #[arg(long)]
        private: bool,
    },
    /// List projects owned by the acting principal, plus participations.
    List,
    /// Fork a project directly (owner only).
    Fork {
        /// Project id.
        id: String,

        /// Fork from this commit instead of the main HEAD.
        #[arg(long)]
        commit: Option<String>,
    },
    /// Delete a project and everything it owns.
    Delete {
        /// Project id.
        id: String,

        /// The project name, repeated as confirmation.
        #[arg(long)]
        confirm: String,
    },
}

#[derive(Subcommand, Debug)]
enum BranchAction {
    /// Create a branch.
    Create {
        /// Project id.
        project: String,

        /// Branch name.
        name: String,

        /// Initial HEAD commit hash (defaults to an empty branch).
        #[arg(long)]
        from_commit: Option<String>,
    },
    /// Fork a branch within the project.
    Fork {
        /// Project id.
        project: String,

        /// Source branch to fork.
        #[arg(short, long, default_value = "main")]
        source: String,

        /// Fork from this commit instead of the source HEAD.
        #[arg(long)]
        from_commit: Option<String>,

        /// Branch name (defaults to fork/<user>).
        #[arg(short, long)]
        name: Option<String>,

        /// Optional description.
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List branches of a project.
    List {
        /// Project id.
        project: String,
    },
}

#[derive(Subcommand, Debug)]
enum WorkspaceAction {
    /// Print a branch's workspace document.
    Get {
        /// Project id.
        project: String,

        /// Branch name.
        #[arg(short, long, default_value = "main")]
        branch: String,
    },
    /// Replace a branch's workspace document from a JSON file.
    Put {
        /// Project id.
        project: String,

        /// Branch name.
        #[arg(short, long, default_value = "main")]
        branch: String,

        /// Path to the JSON document.
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum MrAction {
    /// Open a merge request.
    Create {
        /// Project id.
        project: String,

        /// Source branch name.
        #[arg(short, long)]
        source: String,

        /// Target branch name.
        #[arg(short, long)]
        target: String,

        /// Title.
        #[arg(long)]
        title: Option<String>,

        /// Description.
        #[arg(short, long)]
        description: Option<String>,

        /// Comma-separated clip ids (defaults to the most recent source clips).
        #[arg(long)]
        clips: Option<String>,
    },
    /// Close an open merge request without merging.
    Close {
        /// Merge request id.
        id: String,
    },
    /// Merge an open merge request (owner only).
    Merge {
        /// Merge request id.
        id: String,
    },
    /// List merge requests on a project.
    List {
        /// Project id.
        project: String,

        /// Number of results.
        #[arg(long, default_value = "50")]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
enum ForkRequestAction {
    /// File a fork request as the acting principal.
    Create {
        /// Project id.
        project: String,

        /// Fork from this commit instead of the main HEAD.
        #[arg(long)]
        commit: Option<String>,
    },
    /// Approve a pending fork request (owner only).
    Approve {
        /// Fork request id.
        id: String,
    },
    /// Reject a pending fork request (owner only).
    Reject {
        /// Fork request id.
        id: String,
    },
    /// List fork requests on a project (owner only).
    List {
        /// Project id.
        project: String,
    },
}

#[derive(Subcommand, Debug)]
enum ClipAction {
    /// Create a clip segment on a branch.
    Create {
        /// Project id.
        project: String,

        /// Branch name.
        #[arg(short, long, default_value = "main")]
        branch: String,

        /// Title.
        #[arg(long)]
        title: Option<String>,

        /// Summary.
        #[arg(long)]
        summary: Option<String>,

        /// Generation inputs as a JSON object.
        #[arg(long)]
        inputs: Option<String>,
    },
    /// List clips on a branch.
    List {
        /// Project id.
        project: String,

        /// Branch name.
        #[arg(short, long, default_value = "main")]
        branch: String,

        /// Number of results.
        #[arg(long, default_value = "50")]
        limit: u32,
    },
    /// Reconcile a clip's generation status.
    SetStatus {
        /// Clip id.
        id: String,

        /// New status: pending, started, succeeded, failed.
        status: String,

        /// Generation result as a JSON object.
        #[arg(long)]
        result: Option<String>,

        /// Error message for failed clips.
        #[arg(long)]
        error: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    // Minimal logging for CLI
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        command => {
            let config = load_config(&cli.config)?;
            let engine = open_engine(config)?;
            let user = cli.principal.as_str();

            match command {
                Commands::Project { action } => cmd_project(&engine, user, action),
                Commands::Commit {
                    project,
                    message,
                    snapshot,
                    branch,
                    parent,
                } => cmd_commit(&engine, user, &project, &message, &snapshot, &branch, parent.as_deref()),
                Commands::Branch { action } => cmd_branch(&engine, user, action),
                Commands::Graph { project } => cmd_graph(&engine, &project),
                Commands::Head { project, branch } => cmd_head(&engine, &project, &branch),
                Commands::Workspace { action } => cmd_workspace(&engine, user, action),
                Commands::Mr { action } => cmd_mr(&engine, user, action),
                Commands::ForkRequest { action } => cmd_fork_request(&engine, user, action),
                Commands::Clip { action } => cmd_clip(&engine, user, action),
                Commands::Init { .. } | Commands::Validate => unreachable!(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &PathBuf) -> Result<AppConfig> {
    let config = AppConfig::load_from_file(path).context("failed to load configuration file")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_engine(config: AppConfig) -> Result<RepoEngine> {
    let db_path = config.engine.data_dir.join("reelvc.db");
    let db = Database::new(&db_path).context("failed to open database")?;
    db.initialize().context("failed to initialize database")?;
    Ok(RepoEngine::new(db, config, Arc::new(MemoryCache::new())))
}

fn parse_json(label: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("{label} is not valid JSON"))
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn short_hash(hash: Option<&str>) -> String {
    match hash {
        Some(h) => h.chars().take(10).collect(),
        None => "-".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &PathBuf) -> Result<()> {
    let default_config = r#"# ReelVC Configuration
# See documentation for all available options.

[engine]
data_dir = "/var/lib/reelvc"
log_level = "info"

[graph]
cache_enabled = true
cache_ttl_secs = 300

[merge]
default_clip_limit = 200
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file (data directory, cache settings)");
    println!(
        "  2. Validate with: reelvc validate --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &PathBuf) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => println!("  [OK] All values are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Data directory  : {}", config.engine.data_dir.display());
    println!("  Log level       : {}", config.engine.log_level);
    println!(
        "  Graph cache     : {}",
        if config.graph.cache_enabled { "enabled" } else { "disabled" }
    );
    println!("  Graph cache TTL : {}s", config.graph.cache_ttl_secs);
    println!("  MR clip limit   : {}", config.merge.default_clip_limit);
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn cmd_project(engine: &RepoEngine, user: &str, action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::Create {
            name,
            description,
            tags,
            private,
        } => {
            let tags = tags.as_deref().map(split_csv).unwrap_or_default();
            let project = engine
                .create_project(user, &name, description.as_deref(), &tags, !private)
                .context("failed to create project")?;
            println!("Created project {} ({})", style(&project.name).bold(), project.id);
            Ok(())
        }

        ProjectAction::List => {
            let owned = engine.list_projects(user).context("failed to list projects")?;
            let participations = engine
                .list_branch_participations(user)
                .context("failed to list participations")?;

            if owned.is_empty() && participations.is_empty() {
                println!("No projects found for {user}.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "NAME", "OWNER", "PUBLIC", "ROLE"]);
            for p in &owned {
                table.add_row(vec![
                    Cell::new(&p.id),
                    Cell::new(&p.name),
                    Cell::new(&p.owner_id),
                    Cell::new(p.is_public),
                    Cell::new("owner"),
                ]);
            }
            for p in &participations {
                table.add_row(vec![
                    Cell::new(&p.id),
                    Cell::new(&p.name),
                    Cell::new(&p.owner_id),
                    Cell::new(p.is_public),
                    Cell::new("contributor"),
                ]);
            }
            println!("{table}");
            Ok(())
        }

        ProjectAction::Fork { id, commit } => {
            let fork = engine
                .fork_project(&id, user, commit.as_deref())
                .context("failed to fork project")?;
            println!("Forked into {} ({})", style(&fork.name).bold(), fork.id);
            Ok(())
        }

        ProjectAction::Delete { id, confirm } => {
            engine
                .delete_project(&id, user, &confirm)
                .context("failed to delete project")?;
            println!("Deleted project {id}");
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_commit(
    engine: &RepoEngine,
    user: &str,
    project: &str,
    message: &str,
    snapshot: &str,
    branch: &str,
    parent: Option<&str>,
) -> Result<()> {
    let snapshot = parse_json("snapshot", snapshot)?;
    let commit = engine
        .create_commit(project, user, message, &snapshot, branch, parent)
        .context("failed to create commit")?;
    println!(
        "[{}] {} {}",
        branch,
        style(short_hash(Some(&commit.hash))).yellow(),
        commit.message
    );
    Ok(())
}

fn cmd_branch(engine: &RepoEngine, user: &str, action: BranchAction) -> Result<()> {
    match action {
        BranchAction::Create {
            project,
            name,
            from_commit,
        } => {
            let branch = engine
                .create_branch(&project, user, &name, from_commit.as_deref())
                .context("failed to create branch")?;
            println!(
                "Created branch {} at {}",
                style(&branch.name).bold(),
                short_hash(branch.head_commit_hash.as_deref())
            );
            Ok(())
        }

        BranchAction::Fork {
            project,
            source,
            from_commit,
            name,
            description,
        } => {
            let branch = engine
                .fork_as_branch(
                    &project,
                    user,
                    &source,
                    from_commit.as_deref(),
                    name.as_deref(),
                    description.as_deref(),
                    &[],
                )
                .context("failed to fork branch")?;
            println!(
                "Forked {} into {} at {}",
                source,
                style(&branch.name).bold(),
                short_hash(branch.head_commit_hash.as_deref())
            );
            Ok(())
        }

        BranchAction::List { project } => {
            let branches = engine
                .list_branches(&project)
                .context("failed to list branches")?;
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["NAME", "HEAD", "CREATOR", "FORKED FROM"]);
            for b in &branches {
                table.add_row(vec![
                    Cell::new(&b.name),
                    Cell::new(short_hash(b.head_commit_hash.as_deref())),
                    Cell::new(&b.creator_id),
                    Cell::new(b.parent_branch_id.as_deref().unwrap_or("-")),
                ]);
            }
            println!("{table}");
            Ok(())
        }
    }
}

fn cmd_graph(engine: &RepoEngine, project: &str) -> Result<()> {
    let graph = engine
        .get_project_graph(project)
        .context("failed to assemble project graph")?;

    println!(
        "Project {} — {} branch(es), {} commit(s), total score {:.1}",
        style(&graph.project_id).bold(),
        graph.branches.len(),
        graph.commits.len(),
        graph.total_score
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["BRANCH", "HEAD", "COMMITS", "SCORE", "PROJECT %"]);
    for b in &graph.branches {
        table.add_row(vec![
            Cell::new(&b.name),
            Cell::new(short_hash(b.head_commit_hash.as_deref())),
            Cell::new(b.commits.len()),
            Cell::new(format!("{:.1}", b.total_score)),
            Cell::new(format!("{:.1}", b.project_percent)),
        ]);
    }
    println!("{table}");

    for b in &graph.branches {
        if b.contributors.is_empty() {
            continue;
        }
        println!();
        println!("Contributors on {}:", style(&b.name).bold());
        for c in &b.contributors {
            println!("  {:<24} {:>6.1}  ({:.1}%)", c.user_id, c.score, c.percent);
        }
    }

    Ok(())
}

fn cmd_head(engine: &RepoEngine, project: &str, branch: &str) -> Result<()> {
    let head = engine
        .get_head_state(project, branch)
        .context("failed to read branch HEAD")?;
    match head.commit_id.as_deref() {
        Some(hash) => {
            println!("HEAD of {branch}: {}", style(hash).yellow());
            println!("Message: {}", head.message.as_deref().unwrap_or("-"));
            println!(
                "Assets:\n{}",
                serde_json::to_string_pretty(&head.asset_snapshot)?
            );
        }
        None => println!("Branch {branch} has no commits."),
    }
    Ok(())
}

fn cmd_workspace(engine: &RepoEngine, user: &str, action: WorkspaceAction) -> Result<()> {
    match action {
        WorkspaceAction::Get { project, branch } => {
            let doc = engine
                .get_workspace(&project, &branch)
                .context("failed to read workspace")?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }

        WorkspaceAction::Put {
            project,
            branch,
            file,
        } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let doc = parse_json("workspace document", &raw)?;
            engine
                .put_workspace(&project, &branch, user, &doc)
                .context("workspace write rejected")?;
            println!("Workspace of {branch} updated.");
            Ok(())
        }
    }
}

fn cmd_mr(engine: &RepoEngine, user: &str, action: MrAction) -> Result<()> {
    match action {
        MrAction::Create {
            project,
            source,
            target,
            title,
            description,
            clips,
        } => {
            let clip_ids = clips.as_deref().map(split_csv);
            let mr = engine
                .create_merge_request(
                    &project,
                    user,
                    &source,
                    &target,
                    title.as_deref(),
                    description.as_deref(),
                    clip_ids.as_deref(),
                )
                .context("failed to open merge request")?;
            println!(
                "Opened merge request {} ({} -> {}, {} clip(s))",
                style(&mr.id).bold(),
                mr.source_branch_name,
                mr.target_branch_name,
                mr.clip_ids.len()
            );
            Ok(())
        }

        MrAction::Close { id } => {
            let mr = engine
                .close_merge_request(&id, user)
                .context("failed to close merge request")?;
            println!("Merge request {} is now {}", mr.id, mr.status);
            Ok(())
        }

        MrAction::Merge { id } => {
            let mr = engine
                .merge_merge_request(&id, user)
                .context("failed to merge")?;
            let copied = mr.merged_clip_ids.map(|ids| ids.len()).unwrap_or(0);
            println!(
                "Merged {} into {}: {} clip(s) copied",
                mr.source_branch_name, mr.target_branch_name, copied
            );
            Ok(())
        }

        MrAction::List { project, limit } => {
            let mrs = engine
                .list_merge_requests(&project, user, limit)
                .context("failed to list merge requests")?;
            if mrs.is_empty() {
                println!("No merge requests visible to {user}.");
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "STATUS", "SOURCE", "TARGET", "CREATOR", "CLIPS"]);
            for mr in &mrs {
                table.add_row(vec![
                    Cell::new(&mr.id),
                    Cell::new(mr.status),
                    Cell::new(&mr.source_branch_name),
                    Cell::new(&mr.target_branch_name),
                    Cell::new(&mr.creator_id),
                    Cell::new(mr.clip_ids.len()),
                ]);
            }
            println!("{table}");
            Ok(())
        }
    }
}

fn cmd_fork_request(engine: &RepoEngine, user: &str, action: ForkRequestAction) -> Result<()> {
    match action {
        ForkRequestAction::Create { project, commit } => {
            let fr = engine
                .create_fork_request(&project, user, commit.as_deref())
                .context("failed to file fork request")?;
            println!("Filed fork request {} (pending owner approval)", fr.id);
            Ok(())
        }

        ForkRequestAction::Approve { id } => {
            let fr = engine
                .approve_fork_request(&id, user)
                .context("failed to approve fork request")?;
            println!(
                "Approved; created project {}",
                fr.approved_project_id.as_deref().unwrap_or("-")
            );
            Ok(())
        }

        ForkRequestAction::Reject { id } => {
            let fr = engine
                .reject_fork_request(&id, user)
                .context("failed to reject fork request")?;
            println!("Fork request {} is now {}", fr.id, fr.status);
            Ok(())
        }

        ForkRequestAction::List { project } => {
            let requests = engine
                .list_fork_requests(&project, user)
                .context("failed to list fork requests")?;
            if requests.is_empty() {
                println!("No fork requests.");
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "STATUS", "REQUESTER", "COMMIT", "FORKED PROJECT"]);
            for fr in &requests {
                table.add_row(vec![
                    Cell::new(&fr.id),
                    Cell::new(fr.status),
                    Cell::new(&fr.requester_id),
                    Cell::new(short_hash(fr.commit_hash.as_deref())),
                    Cell::new(fr.approved_project_id.as_deref().unwrap_or("-")),
                ]);
            }
            println!("{table}");
            Ok(())
        }
    }
}

fn cmd_clip(engine: &RepoEngine, user: &str, action: ClipAction) -> Result<()> {
    match action {
        ClipAction::Create {
            project,
            branch,
            title,
            summary,
            inputs,
        } => {
            let inputs = inputs
                .as_deref()
                .map(|raw| parse_json("inputs", raw))
                .transpose()?;
            let clip = engine
                .create_clip(
                    &project,
                    &branch,
                    user,
                    title.as_deref(),
                    summary.as_deref(),
                    inputs.as_ref(),
                    None,
                )
                .context("failed to create clip")?;
            println!("Created clip {} on {branch}", clip.id);
            Ok(())
        }

        ClipAction::List {
            project,
            branch,
            limit,
        } => {
            let clips = engine
                .list_clips(&project, &branch, limit)
                .context("failed to list clips")?;
            if clips.is_empty() {
                println!("No clips on {branch}.");
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "STATUS", "TITLE", "OWNER"]);
            for clip in &clips {
                table.add_row(vec![
                    Cell::new(&clip.id),
                    Cell::new(clip.status),
                    Cell::new(clip.title.as_deref().unwrap_or("-")),
                    Cell::new(&clip.owner_id),
                ]);
            }
            println!("{table}");
            Ok(())
        }

        ClipAction::SetStatus {
            id,
            status,
            result,
            error,
        } => {
            let result = result
                .as_deref()
                .map(|raw| parse_json("result", raw))
                .transpose()?;
            let status = ClipStatus::from_str_val(&status);
            engine
                .update_clip_status(&id, status, result.as_ref(), error.as_deref())
                .context("failed to update clip status")?;
            println!("Clip {id} is now {status}");
            Ok(())
        }
    }
}
