// Task list state container with key-value persistence

use crate::codec;
use crate::error::{PersistenceWarning, TaskError, ValidationError};
use crate::filter::TaskFilter;
use crate::models::{Task, TaskCounts, TaskId, now};
use crate::storage::KeyValueStorage;
use tracing::{debug, info, warn};

/// Key the task list is stored under unless configured otherwise
pub const DEFAULT_STORAGE_KEY: &str = "todoApp_tasks";

/// Change notification delivered to subscribers after a mutation
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Added(Task),
    Deleted(Task),
    Toggled(Task),
    Edited { task: Task, previous_text: String },
    MarkedAllCompleted(usize),
    DeletedCompleted(usize),
    /// The mutation was applied but could not be saved
    PersistenceWarning(PersistenceWarning),
}

type Observer = Box<dyn FnMut(&StoreEvent)>;

/// Authoritative, ordered task list
///
/// New tasks go to the front. Every mutation writes the full list to the
/// storage collaborator before returning; a failed write is reported as a
/// warning and never rolls the mutation back.
pub struct TaskStore<S: KeyValueStorage> {
    storage: S,
    key: String,
    tasks: Vec<Task>,
    observers: Vec<Observer>,
    load_warning: Option<PersistenceWarning>,
}

impl<S: KeyValueStorage> TaskStore<S> {
    /// Load the task list stored under `key`
    ///
    /// Never fails: an absent value gives an empty list, and an unreadable
    /// one gives an empty list plus a warning available from `load_warning()`.
    pub fn open(storage: S, key: impl Into<String>) -> Self {
        let key = key.into();
        let mut load_warning = None;

        let tasks = match storage.get(&key) {
            Ok(None) => {
                debug!(key = %key, "No stored task list, starting fresh");
                Vec::new()
            }
            Ok(Some(raw)) => match codec::decode(&raw, now()) {
                Ok(decoded) => {
                    if decoded.skipped > 0 {
                        warn!(key = %key, skipped = decoded.skipped, "Some stored tasks could not be loaded");
                    }
                    decoded.tasks
                }
                Err(e) => {
                    warn!(key = %key, error = %format!("{:#}", e), "Stored task list is unreadable, starting fresh");
                    load_warning = Some(PersistenceWarning::new("load", &e));
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(key = %key, error = %format!("{:#}", e), "Failed to read task list, starting fresh");
                load_warning = Some(PersistenceWarning::new("load", &e));
                Vec::new()
            }
        };

        info!(key = %key, count = tasks.len(), "Opened task store");

        Self {
            storage,
            key,
            tasks,
            observers: Vec::new(),
            load_warning,
        }
    }

    /// Open using the default storage key
    pub fn open_default(storage: S) -> Self {
        Self::open(storage, DEFAULT_STORAGE_KEY)
    }

    /// Register a callback run after every applied mutation
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&StoreEvent) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Warning raised while loading, if the stored list could not be read
    pub fn load_warning(&self) -> Option<&PersistenceWarning> {
        self.load_warning.as_ref()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Give back the storage collaborator
    pub fn into_storage(self) -> S {
        self.storage
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a task at the head of the list
    pub fn add(&mut self, text: &str) -> Result<Task, TaskError> {
        let text = validate_text(text)?;

        let task = Task::new(text, now());
        debug!(id = %task.id, "add: inserting task");
        self.tasks.insert(0, task.clone());

        self.commit("add", StoreEvent::Added(task.clone()));
        Ok(task)
    }

    /// Remove a task; returns false when no task has this id
    pub fn delete(&mut self, id: &TaskId) -> bool {
        let Some(index) = self.position(id) else {
            debug!(id = %id, "delete: no such task");
            return false;
        };

        let task = self.tasks.remove(index);
        debug!(id = %id, "delete: removed task");

        self.commit("delete", StoreEvent::Deleted(task));
        true
    }

    /// Flip a task between active and completed
    pub fn toggle(&mut self, id: &TaskId) -> Result<Task, TaskError> {
        let index = self.position(id).ok_or_else(|| TaskError::NotFound(id.clone()))?;

        let task = &mut self.tasks[index];
        let completed = !task.completed;
        task.set_completed(completed, now());
        let task = task.clone();
        debug!(id = %id, completed, "toggle: updated task");

        self.commit("toggle", StoreEvent::Toggled(task.clone()));
        Ok(task)
    }

    /// Replace a task's text
    pub fn edit(&mut self, id: &TaskId, new_text: &str) -> Result<Task, TaskError> {
        let text = validate_text(new_text)?;
        let index = self.position(id).ok_or_else(|| TaskError::NotFound(id.clone()))?;

        let task = &mut self.tasks[index];
        let previous_text = std::mem::replace(&mut task.text, text);
        task.updated_at = Some(now());
        let task = task.clone();
        debug!(id = %id, "edit: updated task text");

        self.commit(
            "edit",
            StoreEvent::Edited {
                task: task.clone(),
                previous_text,
            },
        );
        Ok(task)
    }

    /// Complete every active task; returns how many changed
    pub fn mark_all_completed(&mut self) -> usize {
        let ts = now();
        let mut count = 0;
        for task in self.tasks.iter_mut().filter(|t| !t.completed) {
            task.set_completed(true, ts);
            count += 1;
        }

        debug!(count, "mark_all_completed: updated tasks");
        if count > 0 {
            self.commit("mark_all_completed", StoreEvent::MarkedAllCompleted(count));
        }
        count
    }

    /// Remove every completed task; returns how many were removed
    pub fn delete_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.completed);
        let count = before - self.tasks.len();

        debug!(count, "delete_completed: removed tasks");
        if count > 0 {
            self.commit("delete_completed", StoreEvent::DeletedCompleted(count));
        }
        count
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Tasks matching `filter`, in list order
    pub fn filtered(&self, filter: TaskFilter) -> Vec<Task> {
        self.tasks.iter().filter(|t| filter.matches(t)).cloned().collect()
    }

    pub fn counts(&self) -> TaskCounts {
        TaskCounts::from_tasks(&self.tasks)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// The full list, newest first
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }

    /// Persist, then notify observers of the change and of any save failure
    fn commit(&mut self, operation: &'static str, event: StoreEvent) {
        let warning = self.persist(operation);
        self.notify(&event);
        if let Some(warning) = warning {
            self.notify(&StoreEvent::PersistenceWarning(warning));
        }
    }

    fn persist(&mut self, operation: &'static str) -> Option<PersistenceWarning> {
        let result = codec::encode(&self.tasks).and_then(|raw| self.storage.set(&self.key, &raw));

        match result {
            Ok(()) => {
                debug!(operation, key = %self.key, count = self.tasks.len(), "Saved task list");
                None
            }
            Err(e) => {
                warn!(operation, key = %self.key, error = %format!("{:#}", e), "Failed to save task list");
                Some(PersistenceWarning::new(operation, &e))
            }
        }
    }

    fn notify(&mut self, event: &StoreEvent) {
        for observer in self.observers.iter_mut() {
            observer(event);
        }
    }
}

/// Trim user input and reject it when nothing is left
fn validate_text(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn new_store() -> TaskStore<MemoryStorage> {
        TaskStore::open_default(MemoryStorage::new())
    }

    fn ids(tasks: &[Task]) -> HashSet<TaskId> {
        tasks.iter().map(|t| t.id.clone()).collect()
    }

    fn assert_consistent(store: &TaskStore<MemoryStorage>) {
        let counts = store.counts();
        assert_eq!(counts.total, counts.active + counts.completed);
        assert_eq!(counts.total, store.tasks().len());

        let all = ids(&store.filtered(TaskFilter::All));
        let active = ids(&store.filtered(TaskFilter::Active));
        let completed = ids(&store.filtered(TaskFilter::Completed));
        assert!(active.is_disjoint(&completed));
        assert_eq!(active.union(&completed).cloned().collect::<HashSet<_>>(), all);

        for task in store.tasks() {
            assert_eq!(task.completed, task.completed_at.is_some());
            assert!(!task.text.is_empty());
        }
    }

    fn stored_tasks(store: &TaskStore<MemoryStorage>) -> Vec<Task> {
        let raw = store.storage().get(store.key()).unwrap().unwrap();
        codec::decode(&raw, now()).unwrap().tasks
    }

    #[test]
    fn test_open_empty_storage() {
        let store = new_store();
        assert!(store.is_empty());
        assert!(store.load_warning().is_none());
        assert_eq!(store.key(), DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn test_add_trims_and_prepends() {
        let mut store = new_store();
        store.add("First").unwrap();
        let task = store.add("  Buy milk  ").unwrap();

        assert_eq!(task.text, "Buy milk");
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
        assert_eq!(store.tasks()[0], task);
        assert_eq!(store.tasks()[1].text, "First");
        assert_consistent(&store);
    }

    #[test]
    fn test_add_empty_text_rejected() {
        let mut store = new_store();
        store.add("keep me").unwrap();
        let before = store.tasks().to_vec();

        assert_eq!(store.add(""), Err(TaskError::Validation(ValidationError::EmptyText)));
        assert_eq!(store.add("   "), Err(TaskError::Validation(ValidationError::EmptyText)));
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn test_add_generates_unique_ids() {
        let mut store = new_store();
        for i in 0..50 {
            store.add(&format!("task {}", i)).unwrap();
        }
        assert_eq!(ids(store.tasks()).len(), 50);
    }

    #[test]
    fn test_add_persists() {
        let mut store = new_store();
        let task = store.add("Persist me").unwrap();

        let stored = stored_tasks(&store);
        assert_eq!(stored, vec![task]);
    }

    #[test]
    fn test_delete() {
        let mut store = new_store();
        let a = store.add("a").unwrap();
        let b = store.add("b").unwrap();

        assert!(store.delete(&a.id));
        assert_eq!(store.tasks(), &[b]);
        assert!(store.get(&a.id).is_none());
        assert_eq!(stored_tasks(&store).len(), 1);
    }

    #[test]
    fn test_delete_unknown_id_is_noop() {
        let mut store = new_store();
        store.add("a").unwrap();
        let before = store.tasks().to_vec();

        assert!(!store.delete(&TaskId::from("missing")));
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn test_delete_unknown_id_does_not_persist() {
        let mut store = new_store();
        assert!(!store.delete(&TaskId::from("missing")));
        // Nothing was ever written
        assert_eq!(store.storage().get(DEFAULT_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_toggle_twice_restores_state() {
        let mut store = new_store();
        let task = store.add("Walk the dog").unwrap();

        let toggled = store.toggle(&task.id).unwrap();
        assert!(toggled.completed);
        assert!(toggled.completed_at.is_some());

        let restored = store.toggle(&task.id).unwrap();
        assert!(!restored.completed);
        assert!(restored.completed_at.is_none());
        assert_eq!(restored.created_at, task.created_at);
        assert_consistent(&store);
    }

    #[test]
    fn test_toggle_unknown_id() {
        let mut store = new_store();
        let missing = TaskId::from("missing");
        assert_eq!(store.toggle(&missing), Err(TaskError::NotFound(missing)));
    }

    #[test]
    fn test_edit_updates_text_and_timestamp() {
        let mut store = new_store();
        let task = store.add("Draft").unwrap();
        assert!(task.updated_at.is_none());

        let edited = store.edit(&task.id, "  Final  ").unwrap();
        assert_eq!(edited.text, "Final");
        assert!(edited.updated_at.is_some());
        assert_eq!(edited.id, task.id);
        assert_eq!(edited.created_at, task.created_at);
        assert_eq!(store.get(&task.id).unwrap().text, "Final");
        assert_eq!(stored_tasks(&store)[0].text, "Final");
    }

    #[test]
    fn test_edit_unknown_id_leaves_list_unchanged() {
        let mut store = new_store();
        store.add("a").unwrap();
        store.add("b").unwrap();
        let before = store.tasks().to_vec();

        let missing = TaskId::from("missing");
        assert_eq!(store.edit(&missing, "new"), Err(TaskError::NotFound(missing)));
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn test_edit_empty_text_rejected() {
        let mut store = new_store();
        let task = store.add("Original").unwrap();

        assert_eq!(
            store.edit(&task.id, "   "),
            Err(TaskError::Validation(ValidationError::EmptyText))
        );
        let current = store.get(&task.id).unwrap();
        assert_eq!(current.text, "Original");
        assert!(current.updated_at.is_none());
    }

    #[test]
    fn test_edit_validates_before_lookup() {
        let mut store = new_store();
        assert_eq!(
            store.edit(&TaskId::from("missing"), ""),
            Err(TaskError::Validation(ValidationError::EmptyText))
        );
    }

    #[test]
    fn test_order_unchanged_by_toggle_and_edit() {
        let mut store = new_store();
        let c = store.add("c").unwrap();
        let b = store.add("b").unwrap();
        let a = store.add("a").unwrap();

        store.toggle(&b.id).unwrap();
        store.edit(&c.id, "c2").unwrap();

        let order: Vec<TaskId> = store.tasks().iter().map(|t| t.id.clone()).collect();
        assert_eq!(order, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn test_mark_all_completed() {
        let mut store = new_store();
        let done = store.add("done").unwrap();
        store.toggle(&done.id).unwrap();
        let stamp = store.get(&done.id).unwrap().completed_at;
        store.add("one").unwrap();
        store.add("two").unwrap();

        assert_eq!(store.mark_all_completed(), 2);
        assert_eq!(store.counts().active, 0);
        // Already-completed tasks keep their original stamp
        assert_eq!(store.get(&done.id).unwrap().completed_at, stamp);
        assert_consistent(&store);

        assert_eq!(store.mark_all_completed(), 0);
    }

    #[test]
    fn test_mark_all_completed_nothing_to_do_does_not_persist() {
        let mut store = new_store();
        assert_eq!(store.mark_all_completed(), 0);
        assert_eq!(store.storage().get(DEFAULT_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_delete_completed_after_mark_all_empties_list() {
        let mut store = new_store();
        for text in ["a", "b", "c", "d"] {
            store.add(text).unwrap();
        }
        let len = store.tasks().len();

        store.mark_all_completed();
        assert_eq!(store.delete_completed(), len);
        assert!(store.is_empty());
        assert!(stored_tasks(&store).is_empty());
    }

    #[test]
    fn test_delete_completed_keeps_active_in_order() {
        let mut store = new_store();
        let c = store.add("c").unwrap();
        let b = store.add("b").unwrap();
        let a = store.add("a").unwrap();
        store.toggle(&b.id).unwrap();

        assert_eq!(store.delete_completed(), 1);
        let order: Vec<TaskId> = store.tasks().iter().map(|t| t.id.clone()).collect();
        assert_eq!(order, vec![a.id, c.id]);
        assert_eq!(store.delete_completed(), 0);
    }

    #[test]
    fn test_filtered_and_counts() {
        let mut store = new_store();
        assert_consistent(&store);

        let a = store.add("a").unwrap();
        store.add("b").unwrap();
        let c = store.add("c").unwrap();
        store.toggle(&a.id).unwrap();
        store.toggle(&c.id).unwrap();
        assert_consistent(&store);

        let completed = store.filtered(TaskFilter::Completed);
        let texts: Vec<&str> = completed.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "a"]);

        let active = store.filtered(TaskFilter::Active);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].text, "b");

        assert_eq!(
            store.counts(),
            TaskCounts {
                total: 3,
                active: 1,
                completed: 2
            }
        );
    }

    #[test]
    fn test_reopen_sees_same_list() {
        let mut store = new_store();
        let a = store.add("a").unwrap();
        store.add("b").unwrap();
        store.toggle(&a.id).unwrap();
        store.edit(&a.id, "a2").unwrap();
        let before = store.tasks().to_vec();

        let reopened = TaskStore::open_default(store.into_storage());
        assert_eq!(reopened.tasks(), before.as_slice());
    }

    #[test]
    fn test_reopen_with_file_storage() {
        let temp = TempDir::new().unwrap();
        let before = {
            let mut store = TaskStore::open_default(FileStorage::open(temp.path()).unwrap());
            store.add("Buy milk").unwrap();
            let t = store.add("Call mom").unwrap();
            store.toggle(&t.id).unwrap();
            store.tasks().to_vec()
        };

        let store = TaskStore::open_default(FileStorage::open(temp.path()).unwrap());
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn test_failed_write_keeps_mutation_and_warns() {
        let mut store = new_store();
        let events: Rc<RefCell<Vec<StoreEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        store.storage_mut().set_fail_writes(true);
        let task = store.add("Unsaved").unwrap();

        assert_eq!(store.tasks(), &[task.clone()]);
        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StoreEvent::Added(task));
        match &events[1] {
            StoreEvent::PersistenceWarning(w) => {
                assert_eq!(w.operation, "add");
                assert!(w.message.contains("quota"));
            }
            other => panic!("expected persistence warning, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_read_starts_empty_with_warning() {
        let mut storage = MemoryStorage::new();
        storage.set(DEFAULT_STORAGE_KEY, "[]").unwrap();
        storage.set_fail_reads(true);

        let store = TaskStore::open_default(storage);
        assert!(store.is_empty());
        assert_eq!(store.load_warning().unwrap().operation, "load");
    }

    #[test]
    fn test_corrupt_stored_value_starts_empty_with_warning() {
        let mut storage = MemoryStorage::new();
        storage.set(DEFAULT_STORAGE_KEY, "{not json").unwrap();

        let mut store = TaskStore::open_default(storage);
        assert!(store.is_empty());
        assert!(store.load_warning().is_some());

        // Still usable afterwards
        store.add("fresh").unwrap();
        assert_eq!(stored_tasks(&store).len(), 1);
    }

    #[test]
    fn test_observers_receive_events() {
        let mut store = new_store();
        let events: Rc<RefCell<Vec<StoreEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        let task = store.add("Observe").unwrap();
        store.edit(&task.id, "Observed").unwrap();
        store.toggle(&task.id).unwrap();
        store.mark_all_completed();
        store.delete_completed();

        // Rejected and no-op operations are silent
        let _ = store.add("  ");
        let _ = store.toggle(&TaskId::from("missing"));
        store.delete(&TaskId::from("missing"));
        store.mark_all_completed();

        let events = events.borrow();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], StoreEvent::Added(_)));
        match &events[1] {
            StoreEvent::Edited { task, previous_text } => {
                assert_eq!(previous_text, "Observe");
                assert_eq!(task.text, "Observed");
            }
            other => panic!("expected edit event, got {:?}", other),
        }
        assert!(matches!(events[2], StoreEvent::Toggled(_)));
        assert_eq!(events[3], StoreEvent::DeletedCompleted(1));
    }

    #[test]
    fn test_custom_key() {
        let mut store = TaskStore::open(MemoryStorage::new(), "work_tasks");
        store.add("x").unwrap();
        assert!(store.storage().get("work_tasks").unwrap().is_some());
        assert!(store.storage().get(DEFAULT_STORAGE_KEY).unwrap().is_none());
    }
}
