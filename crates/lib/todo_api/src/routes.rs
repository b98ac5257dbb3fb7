//! Route paths served by [`crate::router`].

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_REGISTER: &str = "/auth/register";
pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const POST_AUTH_LOGOUT_ALL: &str = "/auth/logout-all";
pub const GET_AUTH_ME: &str = "/auth/me";
pub const GET_AUTH_HEALTH: &str = "/auth/health";

pub const GET_ADMIN_USERS_ID: &str = "/admin/users/{id}";

pub const TODOS: &str = "/api/v1/todos";
pub const TODOS_ID: &str = "/api/v1/todos/{id}";
