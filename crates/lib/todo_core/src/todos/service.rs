//! Todo business rules on top of [`queries`](super::queries).
//!
//! Callers pass the acting user explicitly; it lands in the audit columns.

use sqlx::PgPool;
use tracing::debug;

use super::TodoError;
use super::queries;
use crate::models::todo::{NewTodo, Todo, TodoPatch};

pub const MIN_TITLE_LEN: usize = 3;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl Page {
    /// Clamp raw query values: page < 1 becomes 1, a size outside
    /// `1..=MAX_PAGE_SIZE` becomes the default.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let page_size = page_size
            .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Number of pages needed for `total` rows.
    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.page_size - 1) / self.page_size
    }
}

/// One page of todos plus the total row count.
#[derive(Debug, Clone)]
pub struct TodoPage {
    pub todos: Vec<Todo>,
    pub page: Page,
    pub total_count: i64,
}

pub async fn create(
    pool: &PgPool,
    input: NewTodo,
    actor: Option<i64>,
) -> Result<Todo, TodoError> {
    let todo = validate_new(input)?;
    let created = queries::create_todo(pool, &todo, actor).await?;
    debug!(todo_id = created.id, ?actor, "todo created");
    Ok(created)
}

pub async fn get(pool: &PgPool, id: i64) -> Result<Todo, TodoError> {
    validate_id(id)?;
    queries::get_todo(pool, id)
        .await?
        .ok_or(TodoError::NotFound(id))
}

/// List todos, optionally restricted to those created by `owner`.
pub async fn list(pool: &PgPool, page: Page, owner: Option<i64>) -> Result<TodoPage, TodoError> {
    let (todos, total_count) =
        queries::list_todos(pool, owner, page.offset(), page.page_size).await?;
    Ok(TodoPage {
        todos,
        page,
        total_count,
    })
}

pub async fn update(
    pool: &PgPool,
    id: i64,
    patch: TodoPatch,
    actor: Option<i64>,
) -> Result<Todo, TodoError> {
    validate_id(id)?;
    let patch = validate_patch(patch)?;
    let updated = queries::update_todo(pool, id, &patch, actor)
        .await?
        .ok_or(TodoError::NotFound(id))?;
    debug!(todo_id = id, ?actor, "todo updated");
    Ok(updated)
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), TodoError> {
    validate_id(id)?;
    queries::delete_todo(pool, id).await
}

fn validate_id(id: i64) -> Result<(), TodoError> {
    if id <= 0 {
        return Err(TodoError::Validation("invalid ID".into()));
    }
    Ok(())
}

fn validate_new(input: NewTodo) -> Result<NewTodo, TodoError> {
    let title = validate_title(&input.title)?;
    validate_description(&input.description)?;
    Ok(NewTodo {
        title,
        description: input.description,
    })
}

fn validate_patch(patch: TodoPatch) -> Result<TodoPatch, TodoError> {
    if patch.is_empty() {
        return Err(TodoError::Validation("no fields to update".into()));
    }
    let title = patch.title.as_deref().map(validate_title).transpose()?;
    if let Some(description) = &patch.description {
        validate_description(description)?;
    }
    Ok(TodoPatch { title, ..patch })
}

fn validate_title(title: &str) -> Result<String, TodoError> {
    let title = title.trim();
    let len = title.chars().count();
    if len < MIN_TITLE_LEN {
        return Err(TodoError::Validation(format!(
            "title must be at least {MIN_TITLE_LEN} characters"
        )));
    }
    if len > MAX_TITLE_LEN {
        return Err(TodoError::Validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_description(description: &str) -> Result<(), TodoError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(TodoError::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}
