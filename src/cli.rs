//! CLI module
//!
//! This module provides the command-line interface for the tasktree tool. Each
//! invocation loads the workspace file, applies one operation through the
//! manager, and writes the file back, so the cursor survives between calls.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::models::{
    AttrKey, Criteria, Kind, Manager, NodeDraft, NodeRecord, Path, Snapshot, TreeError,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace file to operate on
    #[arg(short, long, env = "TASKTREE_FILE", default_value = "tasktree.json")]
    file: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new workspace file with a single root container
    Init {
        /// Name for the root of the tree
        name: String,
    },

    /// Show the node under the cursor and its children
    Show,

    /// Print the whole tree
    Tree,

    /// Add a child under the cursor
    Add {
        /// Name for the new node; omitted fields fall back to defaults
        name: Option<String>,

        /// Create a leaf instead of a container
        #[arg(long)]
        leaf: bool,

        /// Description text
        #[arg(short, long)]
        description: Option<String>,

        /// Due date in RFC 3339 form, e.g. 2026-01-31T17:00:00Z
        #[arg(long)]
        due: Option<String>,

        /// Priority from 0 to 10
        #[arg(short, long)]
        priority: Option<u8>,

        /// Mark the new node complete right away
        #[arg(long)]
        complete: bool,
    },

    /// Step the cursor down into a child
    Step {
        /// Child positions to step through, outermost first
        #[arg(required = true)]
        positions: Vec<usize>,
    },

    /// Step the cursor up to its parent
    Up,

    /// Return the cursor to the root
    Home,

    /// Update attributes of the node under the cursor
    Set {
        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New due date in RFC 3339 form
        #[arg(long)]
        due: Option<String>,

        /// New priority from 0 to 10
        #[arg(short, long)]
        priority: Option<u8>,

        /// New completion flag
        #[arg(long)]
        complete: Option<bool>,
    },

    /// Recompute completion for the node under the cursor
    Check,

    /// Convert the node under the cursor between container and leaf
    Convert {
        /// The kind to convert to
        #[arg(value_enum)]
        kind: KindArg,
    },

    /// Move the node under the cursor into another container
    Move {
        /// Path of the target container from the root; empty means the root
        positions: Vec<usize>,
    },

    /// Delete a child of the cursor, or the whole subtree under the cursor
    Delete {
        /// Child position; omit to delete the node under the cursor itself
        position: Option<usize>,
    },

    /// Search the cursor's descendants by attribute filters
    Search {
        /// Match on name
        #[arg(long)]
        name: Option<String>,

        /// Match on description
        #[arg(short, long)]
        description: Option<String>,

        /// Match on priority
        #[arg(short, long)]
        priority: Option<u8>,

        /// Match on completion
        #[arg(long)]
        complete: Option<bool>,

        /// Match on kind
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    /// A node that can hold children
    Container,
    /// A node with no children of its own
    Leaf,
}

impl KindArg {
    fn kind(self) -> Kind {
        match self {
            KindArg::Container => Kind::Container,
            KindArg::Leaf => Kind::Leaf,
        }
    }
}

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("invalid due date '{0}', expected RFC 3339 like 2026-01-31T17:00:00Z")]
    Date(String),
}

/// On-disk shape of a workspace: the saved cursor path plus the whole tree
#[derive(Debug, Serialize, Deserialize)]
struct WorkspaceFile {
    #[serde(default)]
    path: Path,
    tree: NodeRecord,
}

/// Run the CLI application
pub fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { name } => {
            if cli.file.exists() {
                println!(
                    "{}",
                    format!("{} already exists, not overwriting it", cli.file.display()).yellow()
                );
                return Ok(());
            }
            let manager = Manager::new(name);
            save(&cli.file, &manager)?;
            println!(
                "Created workspace {} in {}",
                manager.cursor_snapshot().name().bold(),
                cli.file.display()
            );
            Ok(())
        }

        Commands::Show => {
            let manager = load(&cli.file)?;
            print_current(&manager);
            Ok(())
        }

        Commands::Tree => {
            let manager = load(&cli.file)?;
            let pointer = if manager.path().is_empty() { "→ " } else { "  " };
            if let Some(root) = manager.snapshot_of(Vec::new()) {
                println!("{}{}", pointer, summary(&root));
            }
            print_tree(&manager, &[], 1);
            Ok(())
        }

        Commands::Add {
            name,
            leaf,
            description,
            due,
            priority,
            complete,
        } => {
            let mut manager = load(&cli.file)?;
            let draft = NodeDraft {
                name,
                description,
                due_date: due.as_deref().map(parse_due).transpose()?,
                priority,
                complete: complete.then_some(true),
                kind: leaf.then_some(Kind::Leaf),
            };

            if manager.create_from(draft) {
                save(&cli.file, &manager)?;
                let children = manager.children_snapshots();
                if let Some(added) = children.last() {
                    println!("Added {} at position {}", added.name().bold(), children.len() - 1);
                }
            } else {
                println!("{}", "Cannot add here; the current node is a leaf".yellow());
            }
            Ok(())
        }

        Commands::Step { positions } => {
            let mut manager = load(&cli.file)?;
            for position in positions {
                if !manager.step_into(position) {
                    println!("{}", format!("No child at position {}", position).yellow());
                    break;
                }
            }
            save(&cli.file, &manager)?;
            print_current(&manager);
            Ok(())
        }

        Commands::Up => {
            let mut manager = load(&cli.file)?;
            manager.step_up();
            save(&cli.file, &manager)?;
            print_current(&manager);
            Ok(())
        }

        Commands::Home => {
            let mut manager = load(&cli.file)?;
            manager.home();
            save(&cli.file, &manager)?;
            print_current(&manager);
            Ok(())
        }

        Commands::Set {
            name,
            description,
            due,
            priority,
            complete,
        } => {
            let mut manager = load(&cli.file)?;
            if let Some(name) = name {
                manager.set_name(name);
            }
            if let Some(description) = description {
                manager.set_description(description);
            }
            if let Some(due) = due {
                manager.set_due_date(parse_due(&due)?);
            }
            if let Some(priority) = priority {
                manager.set_priority(priority)?;
            }
            if let Some(complete) = complete {
                manager.set_complete(complete);
            }
            save(&cli.file, &manager)?;
            print_current(&manager);
            Ok(())
        }

        Commands::Check => {
            let mut manager = load(&cli.file)?;
            let complete = manager.is_complete();
            save(&cli.file, &manager)?;
            let name = manager.cursor_snapshot().name().bold();
            if complete {
                println!("{} is complete", name);
            } else {
                println!("{} is not complete yet", name);
            }
            Ok(())
        }

        Commands::Convert { kind } => {
            let mut manager = load(&cli.file)?;
            manager.set_kind(kind.kind())?;
            save(&cli.file, &manager)?;
            print_current(&manager);
            Ok(())
        }

        Commands::Move { positions } => {
            let mut manager = load(&cli.file)?;
            if manager.move_to(positions) {
                save(&cli.file, &manager)?;
                println!(
                    "Moved {} to [{}]",
                    manager.cursor_snapshot().name().bold(),
                    format_path(manager.path())
                );
            } else {
                println!(
                    "{}",
                    "Move refused; the target must be a container outside the moving subtree"
                        .yellow()
                );
            }
            Ok(())
        }

        Commands::Delete { position } => {
            let mut manager = load(&cli.file)?;
            let deleted = match position {
                Some(position) => manager.delete_child(position),
                None => manager.delete_cursor(),
            };
            if deleted {
                save(&cli.file, &manager)?;
                print_current(&manager);
            } else {
                println!("{}", "Nothing deleted".yellow());
            }
            Ok(())
        }

        Commands::Search {
            name,
            description,
            priority,
            complete,
            kind,
        } => {
            let manager = load(&cli.file)?;
            let mut criteria = Criteria::new();
            if let Some(name) = name {
                criteria = criteria.with(AttrKey::Name, name);
            }
            if let Some(description) = description {
                criteria = criteria.with(AttrKey::Description, description);
            }
            if let Some(priority) = priority {
                criteria = criteria.with(AttrKey::Priority, priority.to_string());
            }
            if let Some(complete) = complete {
                criteria = criteria.with(AttrKey::Complete, complete.to_string());
            }
            if let Some(kind) = kind {
                criteria = criteria.with(AttrKey::Kind, kind.kind().to_string());
            }
            if criteria.is_empty() {
                println!("No filters given; listing every node under the cursor");
            }

            let matches = manager.search(&criteria);
            if matches.is_empty() {
                println!("{}", "No matches".yellow());
            } else {
                println!("{} match(es):", matches.len());
                for found in &matches {
                    println!("  {}", summary(found));
                }
            }
            Ok(())
        }

        Commands::Completions { shell } => {
            // Generate completions for the specified shell
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn load(file: &PathBuf) -> Result<Manager, CliError> {
    let raw = fs::read_to_string(file)?;
    let workspace: WorkspaceFile = serde_json::from_str(&raw)?;
    let mut manager = Manager::from_record(workspace.tree)?;

    // Re-walk the saved cursor path; when it no longer resolves, fall back
    // to the root rather than failing the whole invocation
    for position in workspace.path {
        if !manager.step_into(position) {
            manager.home();
            break;
        }
    }
    Ok(manager)
}

fn save(file: &PathBuf, manager: &Manager) -> Result<(), CliError> {
    let workspace = WorkspaceFile {
        path: manager.path().to_vec(),
        tree: manager.to_record(),
    };
    fs::write(file, serde_json::to_string_pretty(&workspace)?)?;
    Ok(())
}

fn parse_due(raw: &str) -> Result<DateTime<Utc>, CliError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| CliError::Date(raw.to_string()))
}

/// One-line rendering of a snapshot for listings
fn summary(snapshot: &Snapshot) -> String {
    let marker = if snapshot.is_complete() {
        "[✓]".green().to_string()
    } else {
        "[ ]".to_string()
    };
    let kind = match snapshot.kind() {
        Kind::Container => format!("{} ({})", "container".blue(), snapshot.child_count()),
        Kind::Leaf => "leaf".yellow().to_string(),
    };
    format!(
        "{} {} [{}] priority {}, due {}",
        marker,
        snapshot.name().bold(),
        kind,
        snapshot.priority(),
        snapshot.due_date().to_rfc3339()
    )
}

fn format_path(path: &[usize]) -> String {
    if path.is_empty() {
        "root".to_string()
    } else {
        path.iter()
            .map(|position| position.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn print_current(manager: &Manager) {
    let current = manager.cursor_snapshot();
    println!("At [{}]: {}", format_path(manager.path()), summary(&current));
    if !current.description().is_empty() {
        println!("  {}", current.description());
    }
    if let Some(parent) = manager.parent_snapshot() {
        println!("  under: {}", parent.name());
    }

    let children = manager.children_snapshots();
    if children.is_empty() {
        println!("  no children");
    } else {
        println!("  children:");
        for (position, child) in children.iter().enumerate() {
            println!("    {}. {}", position, summary(child));
        }
    }
}

/// Recursively prints the subtree below `path`, marking the cursor with an
/// arrow
fn print_tree(manager: &Manager, path: &[usize], indent: usize) {
    if let Some(children) = manager.children_snapshots_of(path.to_vec()) {
        for (position, child) in children.iter().enumerate() {
            let mut child_path = path.to_vec();
            child_path.push(position);
            let pointer = if child_path == manager.path() { "→ " } else { "  " };
            println!(
                "{}{}{}. {}",
                "  ".repeat(indent),
                pointer,
                position,
                summary(child)
            );
            if child.child_count() > 0 {
                print_tree(manager, &child_path, indent + 1);
            }
        }
    }
}
