//! Example 01: Basic CRUD Operations
//!
//! This example demonstrates adding, editing, completing, filtering and
//! deleting tasks with TodoStore, then reopening the store from disk.
//!
//! Run with: cargo run --example 01_basic_crud

use eyre::Result;
use todostore::{FileStorage, MemoryStorage, StoreEvent, TaskFilter, TaskStore};

fn main() -> Result<()> {
    // Create a temporary directory for this example
    let temp_dir = tempfile::tempdir()?;
    let store_path = temp_dir.path().to_path_buf();

    println!("TodoStore Basic CRUD Example");
    println!("============================\n");
    println!("Store path: {}\n", store_path.display());

    let mut store = TaskStore::open_default(FileStorage::open(&store_path)?);
    store.subscribe(|event| {
        if let StoreEvent::PersistenceWarning(warning) = event {
            println!("   (warning: {})", warning);
        }
    });

    // CREATE
    println!("1. CREATE - Adding tasks...");
    let milk = store.add("  Buy milk  ")?;
    let report = store.add("Write report")?;
    store.add("Call mom")?;
    println!("   Added {} tasks, newest first:", store.tasks().len());
    for task in store.tasks() {
        println!("   - {} : {}", task.id, task.text);
    }
    println!();

    // Empty text is rejected without touching the list
    println!("2. VALIDATE - Adding blank text...");
    match store.add("   ") {
        Ok(_) => println!("   Unexpectedly accepted!"),
        Err(e) => println!("   Rejected: {}", e),
    }
    println!();

    // UPDATE
    println!("3. UPDATE - Editing and completing...");
    let edited = store.edit(&report.id, "Write quarterly report")?;
    println!("   Edited text: {}", edited.text);
    let toggled = store.toggle(&milk.id)?;
    println!("   '{}' completed at {:?}\n", toggled.text, toggled.completed_at);

    // FILTER
    println!("4. FILTER - Querying views...");
    for filter in TaskFilter::VALUES {
        println!("   {:>9}: {} task(s)", filter.as_str(), store.filtered(filter).len());
    }
    let counts = store.counts();
    println!(
        "   counts: total={} active={} completed={}\n",
        counts.total, counts.active, counts.completed
    );

    // BULK
    println!("5. BULK - Completing everything, then clearing...");
    println!("   Marked {} task(s) completed", store.mark_all_completed());
    println!("   Deleted {} completed task(s)\n", store.delete_completed());

    // Reopen from disk
    println!("6. REOPEN - Loading the saved list...");
    drop(store);
    let reopened = TaskStore::open_default(FileStorage::open(&store_path)?);
    println!("   Tasks after reopen: {}\n", reopened.tasks().len());

    // In-memory storage works the same way and is handy for tests
    let mut scratch = TaskStore::open_default(MemoryStorage::new());
    scratch.add("Scratch task")?;
    println!("In-memory store holds {} task(s)", scratch.counts().total);

    println!("\nExample complete!");
    Ok(())
}
