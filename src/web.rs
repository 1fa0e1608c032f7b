/*!
    HTTP routes and handlers.

    Each handler performs at most one store mutation and answers with a
    rendered page or a `302 Found` back to the list.
!*/
use axum::{
    Form, Router,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::Local;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::database::TodoStore;
use crate::form::{FieldErrors, RawFields};
use crate::todo::{Error, ListOrder, Todo};
use crate::views;

#[derive(Debug, Clone)]
pub struct AppState {
    pub store: TodoStore,
    pub order: ListOrder,
}

/// Errors a handler can end with. Validation failures never get here; they
/// re-render the form instead.
#[derive(Debug)]
pub enum AppError {
    NotFound,
    Internal(String),
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(_) => AppError::NotFound,
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        AppError::Internal(format!("template rendering failed: {err:?}"))
    }
}

/// Marks a 404 whose page still needs the request path filled in.
#[derive(Debug, Clone, Copy)]
struct MissingPage;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => {
                let mut response =
                    (StatusCode::NOT_FOUND, Html(views::render_not_found(""))).into_response();
                response.extensions_mut().insert(MissingPage);
                response
            }
            AppError::Internal(message) => {
                error!(%message, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(views::render_server_error()),
                )
                    .into_response()
            }
        }
    }
}

type WebResult<T> = Result<T, AppError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_todos))
        .route("/create/", get(create_form).post(create_todo))
        .route("/update/:id/", get(update_form).post(update_todo))
        .route("/delete/:id/", get(confirm_delete).post(delete_todo))
        .route("/toggle/:id/", get(toggle_todo).post(toggle_todo))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(render_missing_page))
        .layer(TraceLayer::new_for_http())
}

/// Re-renders `AppError::NotFound` pages with the path that was requested.
async fn render_missing_page(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    if response.extensions().get::<MissingPage>().is_none() {
        return response;
    }
    (StatusCode::NOT_FOUND, Html(views::render_not_found(&path))).into_response()
}

fn redirect_to_list() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}

/// Path ids must be plain digits; anything else does not match a todo route.
fn parse_id(raw: &str) -> WebResult<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::NotFound);
    }
    raw.parse::<i64>().map_err(|_| AppError::NotFound)
}

fn form_page(todo_id: Option<i64>, values: &RawFields, errors: &FieldErrors) -> WebResult<Response> {
    Ok(Html(views::render_form(todo_id, values, errors)?).into_response())
}

async fn not_found() -> AppError {
    AppError::NotFound
}

async fn list_todos(State(state): State<AppState>) -> WebResult<Html<String>> {
    let todos = state.store.list_all(&state.order).await?;
    let today = Local::now().date_naive();
    Ok(Html(views::render_list(&todos, today)?))
}

async fn create_form() -> WebResult<Response> {
    form_page(None, &RawFields::default(), &FieldErrors::default())
}

async fn create_todo(
    State(state): State<AppState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> WebResult<Response> {
    let raw = RawFields::from_pairs(pairs);
    let new = match raw.validate_new() {
        Ok(new) => new,
        Err(errors) => {
            warn!(%errors, "rejected new todo");
            return form_page(None, &raw, &errors);
        }
    };
    match state.store.create(new).await {
        Ok(_) => Ok(redirect_to_list()),
        Err(Error::Validation(errors)) => form_page(None, &raw, &errors),
        Err(e) => Err(e.into()),
    }
}

async fn update_form(State(state): State<AppState>, Path(id): Path<String>) -> WebResult<Response> {
    let id = parse_id(&id)?;
    let todo = state.store.get(id).await?;
    form_page(Some(id), &RawFields::from_todo(&todo), &FieldErrors::default())
}

async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> WebResult<Response> {
    let id = parse_id(&id)?;
    let todo = state.store.get(id).await?;
    let raw = RawFields::from_pairs(pairs);
    let changes = match raw.validate_changes() {
        Ok(changes) => changes,
        Err(errors) => {
            warn!(id, %errors, "rejected todo changes");
            return form_page(Some(id), &merged_values(&todo, raw), &errors);
        }
    };
    match state.store.update(id, changes).await {
        Ok(_) => Ok(redirect_to_list()),
        Err(Error::Validation(errors)) => form_page(Some(id), &merged_values(&todo, raw), &errors),
        Err(e) => Err(e.into()),
    }
}

/// Submitted values over the stored ones, for re-displaying a rejected form.
fn merged_values(todo: &Todo, raw: RawFields) -> RawFields {
    let stored = RawFields::from_todo(todo);
    RawFields {
        title: raw.title.or(stored.title),
        description: raw.description.or(stored.description),
        due_date: raw.due_date.or(stored.due_date),
        priority: raw.priority.or(stored.priority),
        is_resolved: raw.is_resolved.or(stored.is_resolved),
    }
}

async fn confirm_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Html<String>> {
    let id = parse_id(&id)?;
    let todo = state.store.get(id).await?;
    Ok(Html(views::render_confirm_delete(&todo)?))
}

async fn delete_todo(State(state): State<AppState>, Path(id): Path<String>) -> WebResult<Response> {
    let id = parse_id(&id)?;
    state.store.delete(id).await?;
    Ok(redirect_to_list())
}

async fn toggle_todo(State(state): State<AppState>, Path(id): Path<String>) -> WebResult<Response> {
    let id = parse_id(&id)?;
    state.store.toggle(id).await?;
    Ok(redirect_to_list())
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::database::tests::test_store;
    use crate::todo::{NewTodo, Priority};

    async fn test_app() -> (TempDir, TodoStore, Router) {
        let (dir, store) = test_store().await;
        let app = router(AppState {
            store: store.clone(),
            order: ListOrder::default(),
        });
        (dir, store, app)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn assert_redirects_to_list(response: &Response) {
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    }

    #[tokio::test]
    async fn test_list_page() {
        let (_dir, store, app) = test_app().await;
        store.create(NewTodo::new("First TODO")).await.unwrap();

        let response = app.oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("First TODO"));
    }

    #[tokio::test]
    async fn test_list_page_empty() {
        let (_dir, _store, app) = test_app().await;
        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_form_page() {
        let (_dir, _store, app) = test_app().await;
        let response = app.oneshot(get("/create/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("name=\"title\""));
    }

    #[tokio::test]
    async fn test_create_todo() {
        let (_dir, store, app) = test_app().await;
        let response = app
            .oneshot(post_form(
                "/create/",
                "title=Test+TODO&description=This+is+a+test+TODO&due_date=2030-01-07&priority=high",
            ))
            .await
            .unwrap();

        assert_redirects_to_list(&response);
        let todos = store.list_all(&ListOrder::default()).await.unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].title, "Test TODO");
        assert_eq!(todos[0].description, "This is a test TODO");
        assert_eq!(todos[0].priority, Priority::High);
        assert!(!todos[0].is_resolved);
    }

    #[tokio::test]
    async fn test_create_invalid_rerenders_form() {
        let (_dir, store, app) = test_app().await;
        let response = app
            .oneshot(post_form("/create/", "title=&priority=sometime"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("This field is required."));
        assert!(html.contains("Select a valid choice."));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_form_prefilled() {
        let (_dir, store, app) = test_app().await;
        let todo = store.create(NewTodo::new("Prefilled")).await.unwrap();

        let response = app
            .oneshot(get(&format!("/update/{}/", todo.id)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("value=\"Prefilled\""));
    }

    #[tokio::test]
    async fn test_update_todo() {
        let (_dir, store, app) = test_app().await;
        let todo = store.create(NewTodo::new("Old title")).await.unwrap();

        let response = app
            .oneshot(post_form(
                &format!("/update/{}/", todo.id),
                "title=New+title&priority=urgent&is_resolved=false&is_resolved=true",
            ))
            .await
            .unwrap();

        assert_redirects_to_list(&response);
        let updated = store.get(todo.id).await.unwrap();
        assert_eq!(updated.title, "New title");
        assert_eq!(updated.priority, Priority::Urgent);
        assert!(updated.is_resolved);
    }

    #[tokio::test]
    async fn test_update_invalid_keeps_record() {
        let (_dir, store, app) = test_app().await;
        let todo = store.create(NewTodo::new("Untouched")).await.unwrap();

        let response = app
            .oneshot(post_form(&format!("/update/{}/", todo.id), "title=+&due_date=soon"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Enter a valid date."));
        assert_eq!(store.get(todo.id).await.unwrap().title, "Untouched");
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let (_dir, _store, app) = test_app().await;
        let response = app.clone().oneshot(get("/update/999/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(post_form("/update/999/", "title=x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_integer_id_not_found() {
        let (_dir, _store, app) = test_app().await;
        let response = app.oneshot(get("/update/abc/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_toggle_resolved_status() {
        let (_dir, store, app) = test_app().await;
        let todo = store.create(NewTodo::new("Resolve me")).await.unwrap();
        let uri = format!("/toggle/{}/", todo.id);

        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_redirects_to_list(&response);
        assert!(store.get(todo.id).await.unwrap().is_resolved);

        let response = app.oneshot(post_form(&uri, "")).await.unwrap();
        assert_redirects_to_list(&response);
        assert!(!store.get(todo.id).await.unwrap().is_resolved);
    }

    #[tokio::test]
    async fn test_signed_id_not_found() {
        let (_dir, store, app) = test_app().await;
        let todo = store.create(NewTodo::new("Leave me")).await.unwrap();

        let response = app
            .clone()
            .oneshot(get(&format!("/toggle/+{}/", todo.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!store.get(todo.id).await.unwrap().is_resolved);

        let response = app
            .oneshot(post_form(&format!("/delete/-{}/", todo.id), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_id_page_shows_path() {
        let (_dir, _store, app) = test_app().await;
        let response = app.oneshot(get("/update/9876/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let html = body_text(response).await;
        assert!(html.contains("Not Found"));
        assert!(html.contains("9876"));
    }

    #[tokio::test]
    async fn test_toggle_unknown_id() {
        let (_dir, _store, app) = test_app().await;
        let response = app.oneshot(get("/toggle/5/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_confirmation_then_delete() {
        let (_dir, store, app) = test_app().await;
        let todo = store.create(NewTodo::new("TODO to delete")).await.unwrap();
        let uri = format!("/delete/{}/", todo.id);

        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("TODO to delete"));
        assert_eq!(store.count().await.unwrap(), 1);

        let response = app.oneshot(post_form(&uri, "")).await.unwrap();
        assert_redirects_to_list(&response);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_id() {
        let (_dir, store, app) = test_app().await;
        store.create(NewTodo::new("Survivor")).await.unwrap();

        let response = app.clone().oneshot(get("/delete/42/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(post_form("/delete/42/", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (_dir, _store, app) = test_app().await;
        let response = app.oneshot(get("/nowhere/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("Not Found"));
    }
}
