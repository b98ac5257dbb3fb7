//! Todo database queries.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::TodoError;
use crate::models::todo::{NewTodo, Todo, TodoPatch};

const TODO_COLUMNS: &str = "id, title, description, completed, completed_at, \
     created_at, updated_at, created_by, updated_by";

/// Insert a todo on behalf of `actor`.
pub async fn create_todo(
    pool: &PgPool,
    todo: &NewTodo,
    actor: Option<i64>,
) -> Result<Todo, TodoError> {
    let sql = format!(
        "INSERT INTO todos (title, description, created_by, updated_by) \
         VALUES ($1, $2, $3, $3) \
         RETURNING {TODO_COLUMNS}"
    );
    sqlx::query_as::<_, Todo>(&sql)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(actor)
        .fetch_one(pool)
        .await
        .map_err(TodoError::db("create todo"))
}

/// Fetch a todo by ID.
pub async fn get_todo(pool: &PgPool, id: i64) -> Result<Option<Todo>, TodoError> {
    let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = $1");
    sqlx::query_as::<_, Todo>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(TodoError::db("get todo"))
}

/// Page through todos, newest first. Returns the page and the total count.
///
/// With `created_by` set, only that user's todos are counted and listed.
pub async fn list_todos(
    pool: &PgPool,
    created_by: Option<i64>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Todo>, i64), TodoError> {
    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM todos WHERE ($1::bigint IS NULL OR created_by = $1)",
    )
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(TodoError::db("count todos"))?;

    let sql = format!(
        "SELECT {TODO_COLUMNS} FROM todos \
         WHERE ($1::bigint IS NULL OR created_by = $1) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2 OFFSET $3"
    );
    let todos = sqlx::query_as::<_, Todo>(&sql)
        .bind(created_by)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(TodoError::db("list todos"))?;

    Ok((todos, total))
}

/// Apply a partial update. Returns `None` if the todo does not exist.
pub async fn update_todo(
    pool: &PgPool,
    id: i64,
    patch: &TodoPatch,
    actor: Option<i64>,
) -> Result<Option<Todo>, TodoError> {
    let mut qb = build_update(id, patch, actor, Utc::now());
    qb.build_query_as::<Todo>()
        .fetch_optional(pool)
        .await
        .map_err(TodoError::db("update todo"))
}

/// Delete a todo.
pub async fn delete_todo(pool: &PgPool, id: i64) -> Result<(), TodoError> {
    let result = sqlx::query("DELETE FROM todos WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(TodoError::db("delete todo"))?;
    if result.rows_affected() == 0 {
        return Err(TodoError::NotFound(id));
    }
    Ok(())
}

/// Build the UPDATE statement with a SET clause only for supplied fields.
fn build_update(
    id: i64,
    patch: &TodoPatch,
    actor: Option<i64>,
    now: DateTime<Utc>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE todos SET updated_at = ");
    qb.push_bind(now);
    qb.push(", updated_by = ");
    qb.push_bind(actor);

    if let Some(title) = &patch.title {
        qb.push(", title = ");
        qb.push_bind(title.clone());
    }
    if let Some(description) = &patch.description {
        qb.push(", description = ");
        qb.push_bind(description.clone());
    }
    if let Some(completed) = patch.completed {
        qb.push(", completed = ");
        qb.push_bind(completed);
        if completed {
            qb.push(", completed_at = ");
            qb.push_bind(now);
        } else {
            qb.push(", completed_at = NULL");
        }
    }

    qb.push(" WHERE id = ");
    qb.push_bind(id);
    qb.push(" RETURNING ");
    qb.push(TODO_COLUMNS);
    qb
}
