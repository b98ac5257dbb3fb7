//! Todo CRUD handlers.
//!
//! The acting user is passed explicitly to `todo_core` for the audit columns.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use todo_core::models::auth::AuthenticatedIdentity;
use todo_core::models::todo::{NewTodo, Todo, TodoPatch};
use todo_core::todos::service::{self, Page};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::MaybeIdentity;
use crate::models::{ListTodosQuery, PaginatedTodos, Pagination};

/// `GET /api/v1/todos`
pub async fn list_todos_handler(
    State(state): State<AppState>,
    MaybeIdentity(identity): MaybeIdentity,
    Query(query): Query<ListTodosQuery>,
) -> AppResult<Json<PaginatedTodos>> {
    let page = Page::new(query.page, query.page_size);
    let owner = if query.mine {
        identity.map(|i| i.user_id)
    } else {
        None
    };

    let result = service::list(&state.pool, page, owner).await?;
    Ok(Json(PaginatedTodos {
        pagination: Pagination {
            page: result.page.page,
            page_size: result.page.page_size,
            total_count: result.total_count,
            total_pages: result.page.total_pages(result.total_count),
        },
        data: result.todos,
    }))
}

/// `GET /api/v1/todos/{id}`
pub async fn get_todo_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Todo>> {
    Ok(Json(service::get(&state.pool, id).await?))
}

/// `POST /api/v1/todos`
pub async fn create_todo_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    Json(body): Json<NewTodo>,
) -> AppResult<(StatusCode, Json<Todo>)> {
    let todo = service::create(&state.pool, body, Some(identity.user_id)).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

/// `PUT /api/v1/todos/{id}`
pub async fn update_todo_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    Path(id): Path<i64>,
    Json(body): Json<TodoPatch>,
) -> AppResult<Json<Todo>> {
    let todo = service::update(&state.pool, id, body, Some(identity.user_id)).await?;
    Ok(Json(todo))
}

/// `DELETE /api/v1/todos/{id}`
pub async fn delete_todo_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    service::delete(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
