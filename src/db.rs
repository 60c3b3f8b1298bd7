// task_backend/src/db.rs
use crate::models::{NewTask, NewUser, Task, TaskChanges, User};
use crate::schema::{tasks, users};
use crate::store::{Repository, StoreError};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use uuid::Uuid;

// an R2D2 connection pool
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;
type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Initialize the database pool.
pub fn init_pool(database_url: &str) -> Result<PgPool, StoreError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .build(manager)
        .map_err(|e| StoreError::Pool(e.to_string()))
}

/// Applies any embedded migration that has not run yet.
pub fn run_migrations(pool: &PgPool) -> Result<usize, StoreError> {
    let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StoreError::Migration(e.to_string()))?;
    Ok(applied.len())
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    fn conn(&self) -> Result<PgPooled, StoreError> {
        self.pool.get().map_err(|e| StoreError::Pool(e.to_string()))
    }
}

impl Repository for PgStore {
    fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let mut conn = self.conn()?;
        let user = users::table
            .find(user_id)
            .select(User::as_select())
            .first::<User>(&mut conn)
            .optional()?;
        Ok(user)
    }

    fn find_user_by_username(&self, name: &str) -> Result<Option<User>, StoreError> {
        let mut conn = self.conn()?;
        let user = users::table
            .filter(users::username.eq(name))
            .select(User::as_select())
            .first::<User>(&mut conn)
            .optional()?;
        Ok(user)
    }

    fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result::<User>(&mut conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    StoreError::Conflict("Username already exists".to_string())
                }
                other => StoreError::Query(other),
            })
    }

    fn update_password(&self, user_id: Uuid, hash: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::update(users::table.find(user_id))
            .set(users::password_hash.eq(hash))
            .execute(&mut conn)?;
        Ok(())
    }

    fn list_tasks(&self, owner: Uuid) -> Result<Vec<Task>, StoreError> {
        let mut conn = self.conn()?;
        let items = tasks::table
            .filter(tasks::user_id.eq(owner))
            .order((tasks::created_at.asc(), tasks::id.asc()))
            .select(Task::as_select())
            .load::<Task>(&mut conn)?;
        Ok(items)
    }

    fn find_task(&self, owner: Uuid, task_id: Uuid) -> Result<Option<Task>, StoreError> {
        let mut conn = self.conn()?;
        let item = tasks::table
            .filter(tasks::id.eq(task_id).and(tasks::user_id.eq(owner)))
            .select(Task::as_select())
            .first::<Task>(&mut conn)
            .optional()?;
        Ok(item)
    }

    fn create_task(&self, new_task: NewTask) -> Result<Task, StoreError> {
        let mut conn = self.conn()?;
        let item = diesel::insert_into(tasks::table)
            .values(&new_task)
            .returning(Task::as_returning())
            .get_result::<Task>(&mut conn)?;
        Ok(item)
    }

    fn update_task(
        &self,
        owner: Uuid,
        task_id: Uuid,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        // Diesel rejects an UPDATE without columns.
        if changes.is_empty() {
            return self.find_task(owner, task_id);
        }
        let mut conn = self.conn()?;
        let updated = diesel::update(
            tasks::table.filter(tasks::id.eq(task_id).and(tasks::user_id.eq(owner))),
        )
        .set(changes)
        .returning(Task::as_returning())
        .get_result::<Task>(&mut conn)
        .optional()?;
        Ok(updated)
    }

    fn delete_task(&self, owner: Uuid, task_id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let removed = diesel::delete(
            tasks::table.filter(tasks::id.eq(task_id).and(tasks::user_id.eq(owner))),
        )
        .execute(&mut conn)?;
        Ok(removed > 0)
    }
}
