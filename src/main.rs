use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use todostore::{Backend, Config, KeyValueStorage, StoreEvent, Task, TaskError, TaskFilter, TaskId, TaskStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "todostore")]
#[command(about = "TodoStore CLI - Manage a persisted task list")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to a YAML config file (default: <config dir>/todostore/todostore.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding stored tasks (overrides config)
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Storage backend (overrides config)
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// List tasks
    List {
        #[arg(short, long, default_value_t = TaskFilter::All)]
        filter: TaskFilter,
    },

    /// Toggle a task between active and completed
    Toggle { id: String },

    /// Replace a task's text
    Edit {
        id: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Delete a task
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Mark every active task as completed
    CompleteAll,

    /// Delete every completed task
    ClearCompleted {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show task totals
    Counts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Success,
    Info,
    Warning,
    Error,
}

fn notify(level: Level, message: &str) {
    match level {
        Level::Success => println!("{} {}", "✔".green().bold(), message),
        Level::Info => println!("{} {}", "ℹ".blue().bold(), message),
        Level::Warning => eprintln!("{} {}", "⚠".yellow().bold(), message.yellow()),
        Level::Error => eprintln!("{} {}", "✖".red().bold(), message.red()),
    }
}

fn main() {
    // Logs go to stderr so they never mix with command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        notify(error_level(&e), &format!("{:#}", e));
        process::exit(1);
    }
}

/// Rejected input is a warning, anything else an error
fn error_level(err: &eyre::Report) -> Level {
    match err.downcast_ref::<TaskError>() {
        Some(TaskError::Validation(_)) => Level::Warning,
        _ => Level::Error,
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = Some(dir);
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    let storage = config.open_storage()?;
    let mut store = TaskStore::open(storage, config.storage_key.clone());

    if let Some(warning) = store.load_warning() {
        notify(Level::Warning, &format!("Failed to load saved tasks, starting empty ({})", warning.message));
    }

    store.subscribe(|event| {
        if let StoreEvent::PersistenceWarning(warning) = event {
            notify(Level::Warning, &format!("Failed to save tasks: {}", warning.message));
        }
    });

    match cli.command {
        Commands::Add { text } => {
            let text = text.join(" ");
            check_length(&text, config.max_text_len)?;
            let task = store.add(&text)?;
            notify(Level::Success, "Task added");
            print_task(&task);
        }
        Commands::List { filter } => list(&store, filter),
        Commands::Toggle { id } => {
            let id = resolve_id(&store, &id)?;
            let task = store.toggle(&id)?;
            let status = if task.completed { "marked as completed" } else { "reactivated" };
            notify(Level::Success, &format!("Task \"{}\" {}", task.text, status));
        }
        Commands::Edit { id, text } => {
            let text = text.join(" ");
            check_length(&text, config.max_text_len)?;
            let id = resolve_id(&store, &id)?;
            let previous = store.get(&id).map(|t| t.text.clone());
            let task = store.edit(&id, &text)?;
            notify(
                Level::Success,
                &format!("Task edited: \"{}\" → \"{}\"", previous.unwrap_or_default(), task.text),
            );
        }
        Commands::Delete { id, yes } => {
            let id = resolve_id(&store, &id)?;
            let Some(text) = store.get(&id).map(|t| t.text.clone()) else {
                notify(Level::Info, &format!("No task with id {}", id));
                return Ok(());
            };
            if !yes && !confirm(&format!("Delete task \"{}\"?", text))? {
                notify(Level::Info, "Cancelled");
                return Ok(());
            }
            if store.delete(&id) {
                notify(Level::Info, &format!("Task \"{}\" deleted", text));
            }
        }
        Commands::CompleteAll => match store.mark_all_completed() {
            0 => notify(Level::Info, "No active tasks to mark"),
            n => notify(Level::Success, &format!("{} task(s) marked as completed", n)),
        },
        Commands::ClearCompleted { yes } => {
            let pending = store.counts().completed;
            if pending == 0 {
                notify(Level::Info, "No completed tasks to delete");
                return Ok(());
            }
            if !yes && !confirm(&format!("Delete {} completed task(s)?", pending))? {
                notify(Level::Info, "Cancelled");
                return Ok(());
            }
            let removed = store.delete_completed();
            notify(Level::Success, &format!("{} completed task(s) deleted", removed));
        }
        Commands::Counts => {
            let counts = store.counts();
            println!("total:     {}", counts.total);
            println!("active:    {}", counts.active);
            println!("completed: {}", counts.completed);
        }
    }

    Ok(())
}

fn list<S: KeyValueStorage>(store: &TaskStore<S>, filter: TaskFilter) {
    if store.is_empty() {
        println!("{}", "No tasks yet. Add one with `todostore add <text>`.".dimmed());
        return;
    }

    let tasks = store.filtered(filter);
    if tasks.is_empty() {
        println!("{}", "No tasks match the selected filter.".dimmed());
    }
    for task in &tasks {
        print_task(task);
    }

    let counts = store.counts();
    let summary = match filter {
        TaskFilter::All => format!("{} task(s) total", counts.total),
        TaskFilter::Active => format!("{} active task(s)", counts.active),
        TaskFilter::Completed => format!("{} completed task(s)", counts.completed),
    };
    println!("\n{}", summary.bold());
}

fn print_task(task: &Task) {
    let short_id: String = task.id.as_str().chars().take(8).collect();
    if task.completed {
        println!("[x] {}  {}", short_id.dimmed(), task.text.strikethrough().dimmed());
    } else {
        println!("[ ] {}  {}", short_id.cyan(), task.text);
    }
}

fn check_length(text: &str, max: usize) -> Result<()> {
    let len = text.trim().chars().count();
    if len > max {
        return Err(eyre!("Task text too long: {} chars (max {})", len, max));
    }
    Ok(())
}

/// Expand a unique id prefix to the full id
///
/// Unmatched input is passed through unchanged so the store reports it.
fn resolve_id<S: KeyValueStorage>(store: &TaskStore<S>, input: &str) -> Result<TaskId> {
    let input = input.trim();
    if input.is_empty() {
        return Err(eyre!("Task id cannot be empty"));
    }
    let exact = TaskId::from(input);
    if store.get(&exact).is_some() {
        return Ok(exact);
    }

    let matches: Vec<&Task> = store
        .tasks()
        .iter()
        .filter(|t| t.id.as_str().starts_with(input))
        .collect();

    match matches.as_slice() {
        [] => Ok(exact),
        [task] => Ok(task.id.clone()),
        _ => Err(eyre!("Ambiguous id prefix: {} matches {} tasks", input, matches.len())),
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
