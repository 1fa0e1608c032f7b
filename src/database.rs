/*!
    Provides functionality to manage todos
    in the database.
!*/
use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use tracing::info;

use crate::form::{FieldErrors, clean_title};
use crate::todo::{Error, ListOrder, NewTodo, Todo, TodoChanges};

pub type Result<T> = std::result::Result<T, Error>;

/// The record store. Cloning shares the underlying pool.
#[derive(Debug, Clone)]
pub struct TodoStore {
    pool: SqlitePool,
}

impl TodoStore {
    pub fn new(pool: SqlitePool) -> Self {
        TodoStore { pool }
    }

    /// Opens (creating if missing) the database file and applies migrations.
    pub async fn open(file: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(file)
            .create_if_missing(true);
        let store = TodoStore::new(SqlitePool::connect_lazy_with(options));
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    /// Inserts a new unresolved todo and returns it with its assigned id.
    pub async fn create(&self, new: NewTodo) -> Result<Todo> {
        let title = checked_title(&new.title)?;
        let insert_stmt = r#"
            insert into todo(title, description, due_date, priority)
            values($1, $2, $3, $4)
            returning id, title, description, due_date, priority, is_resolved
        "#;
        let todo = sqlx::query_as::<_, Todo>(insert_stmt)
            .bind(title)
            .bind(&new.description)
            .bind(new.due_date)
            .bind(new.priority)
            .fetch_one(&self.pool)
            .await?;
        info!(id = todo.id, priority = %todo.priority, "created todo");
        Ok(todo)
    }

    pub async fn get(&self, id: i64) -> Result<Todo> {
        let select_stmt = r#"
            select id, title, description, due_date, priority, is_resolved
            from todo where id = $1
        "#;
        sqlx::query_as::<_, Todo>(select_stmt)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound(id))
    }

    /// Merges `changes` into the stored record.
    pub async fn update(&self, id: i64, changes: TodoChanges) -> Result<Todo> {
        let mut todo = self.get(id).await?;
        changes.apply(&mut todo);
        let title = checked_title(&todo.title)?;

        let update_stmt = r#"
            update todo
            set title = $1, description = $2, due_date = $3, priority = $4, is_resolved = $5
            where id = $6
            returning id, title, description, due_date, priority, is_resolved
        "#;
        let todo = sqlx::query_as::<_, Todo>(update_stmt)
            .bind(title)
            .bind(&todo.description)
            .bind(todo.due_date)
            .bind(todo.priority)
            .bind(todo.is_resolved)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound(id))?;
        info!(id, "updated todo");
        Ok(todo)
    }

    /// Flips `is_resolved` and returns the record as stored afterwards.
    pub async fn toggle(&self, id: i64) -> Result<Todo> {
        let toggle_stmt = r#"
            update todo set is_resolved = not is_resolved
            where id = $1
            returning id, title, description, due_date, priority, is_resolved
        "#;
        let todo = sqlx::query_as::<_, Todo>(toggle_stmt)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound(id))?;
        info!(id, is_resolved = todo.is_resolved, "toggled todo");
        Ok(todo)
    }

    /// Hard delete. Deleting an id twice fails the second time.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("delete from todo where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound(id));
        }
        info!(id, "deleted todo");
        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("select count(*) from todo")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Every record, sorted by `order`.
    pub async fn list_all(&self, order: &ListOrder) -> Result<Vec<Todo>> {
        let select_stmt = r#"
            select id, title, description, due_date, priority, is_resolved
            from todo
        "#;
        let mut todos = sqlx::query_as::<_, Todo>(select_stmt)
            .fetch_all(&self.pool)
            .await?;
        order.sort(&mut todos);
        Ok(todos)
    }
}

fn checked_title(title: &str) -> Result<String> {
    clean_title(Some(title)).map_err(|e| Error::Validation(FieldErrors::single("title", e)))
}
