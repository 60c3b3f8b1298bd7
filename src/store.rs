// task_backend/src/store.rs
use crate::models::{NewTask, NewUser, Task, TaskChanges, User};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::RwLock;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database pool error: {0}")]
    Pool(String),

    #[error("database query error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("{0}")]
    Conflict(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Typed data access for users and their tasks.
///
/// Every task operation takes the owning user's id; implementations must
/// never read or touch a task owned by someone else.
pub trait Repository: Send + Sync {
    fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the username is taken.
    fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    /// Tasks in insertion order.
    fn list_tasks(&self, owner: Uuid) -> Result<Vec<Task>, StoreError>;

    fn find_task(&self, owner: Uuid, task_id: Uuid) -> Result<Option<Task>, StoreError>;

    fn create_task(&self, new_task: NewTask) -> Result<Task, StoreError>;

    /// `Ok(None)` when no such task belongs to `owner`.
    fn update_task(
        &self,
        owner: Uuid,
        task_id: Uuid,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, StoreError>;

    /// Returns whether a row was removed. Absence is not an error.
    fn delete_task(&self, owner: Uuid, task_id: Uuid) -> Result<bool, StoreError>;
}

/// Process-local store used by the test-suite and `TASK_STORE=memory`.
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    usernames: DashMap<String, Uuid>,
    tasks: RwLock<Vec<Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            users: DashMap::new(),
            usernames: DashMap::new(),
            tasks: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MemoryStore {
    fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&user_id).map(|user_ref| user_ref.value().clone()))
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user_id = match self.usernames.get(username) {
            Some(id_ref) => *id_ref.value(),
            None => return Ok(None),
        };
        self.find_user(user_id)
    }

    fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        // The username index entry is the uniqueness lock.
        match self.usernames.entry(new_user.username.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict("Username already exists".to_string())),
            Entry::Vacant(slot) => {
                let user = User {
                    id: new_user.id,
                    username: new_user.username,
                    password_hash: new_user.password_hash,
                    created_at: Utc::now().naive_utc(),
                };
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        if let Some(mut user_ref) = self.users.get_mut(&user_id) {
            user_ref.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    fn list_tasks(&self, owner: Uuid) -> Result<Vec<Task>, StoreError> {
        let storage = self.tasks.read().map_err(|_| StoreError::Poisoned)?;
        Ok(storage
            .iter()
            .filter(|task| task.user_id == owner)
            .cloned()
            .collect())
    }

    fn find_task(&self, owner: Uuid, task_id: Uuid) -> Result<Option<Task>, StoreError> {
        let storage = self.tasks.read().map_err(|_| StoreError::Poisoned)?;
        Ok(storage
            .iter()
            .find(|task| task.id == task_id && task.user_id == owner)
            .cloned())
    }

    fn create_task(&self, new_task: NewTask) -> Result<Task, StoreError> {
        let task = Task {
            id: new_task.id,
            user_id: new_task.user_id,
            title: new_task.title,
            description: new_task.description,
            priority: new_task.priority,
            due_date: new_task.due_date,
            completed: false,
            tags: new_task.tags,
            ai_notes: None,
            created_at: Utc::now().naive_utc(),
        };
        let mut storage = self.tasks.write().map_err(|_| StoreError::Poisoned)?;
        storage.push(task.clone());
        Ok(task)
    }

    fn update_task(
        &self,
        owner: Uuid,
        task_id: Uuid,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        let mut storage = self.tasks.write().map_err(|_| StoreError::Poisoned)?;
        let outcome = storage
            .iter_mut()
            .find(|task| task.id == task_id && task.user_id == owner)
            .map(|task| {
                changes.apply_to(task);
                task.clone()
            });
        Ok(outcome)
    }

    fn delete_task(&self, owner: Uuid, task_id: Uuid) -> Result<bool, StoreError> {
        let mut storage = self.tasks.write().map_err(|_| StoreError::Poisoned)?;
        let before = storage.len();
        storage.retain(|task| !(task.id == task_id && task.user_id == owner));
        Ok(storage.len() != before)
    }
}
