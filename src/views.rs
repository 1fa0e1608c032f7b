/*!
    HTML pages rendered with Tera.

    Templates are compiled into the binary from `templates/` and parsed once
    on first use.
!*/
use std::sync::OnceLock;

use chrono::NaiveDate;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::error;

use crate::form::{FieldErrors, RawFields, TITLE_MAX_LEN, coerce_checkbox};
use crate::todo::{Priority, Todo};

static TEMPLATES: OnceLock<Tera> = OnceLock::new();

const TEMPLATE_SOURCES: [(&str, &str); 5] = [
    ("base.html", include_str!("../templates/base.html")),
    ("home.html", include_str!("../templates/home.html")),
    ("todo_form.html", include_str!("../templates/todo_form.html")),
    (
        "todo_confirm_delete.html",
        include_str!("../templates/todo_confirm_delete.html"),
    ),
    ("404.html", include_str!("../templates/404.html")),
];

fn templates() -> &'static Tera {
    TEMPLATES.get_or_init(|| {
        let mut tera = Tera::default();
        if let Err(e) = tera.add_raw_templates(TEMPLATE_SOURCES) {
            error!(error = %e, "failed to parse templates");
        }
        tera
    })
}

#[derive(Debug, Serialize)]
struct TodoRow<'a> {
    todo: &'a Todo,
    overdue: bool,
    priority_label: &'static str,
}

#[derive(Debug, Serialize)]
struct PriorityChoice {
    code: &'static str,
    label: &'static str,
}

/// Form values as strings, ready to drop into inputs.
#[derive(Debug, Serialize)]
struct FormValues<'a> {
    title: &'a str,
    description: &'a str,
    due_date: &'a str,
    priority: &'a str,
    is_resolved: bool,
}

impl<'a> FormValues<'a> {
    fn new(raw: &'a RawFields) -> Self {
        FormValues {
            title: raw.title.as_deref().unwrap_or_default(),
            description: raw.description.as_deref().unwrap_or_default(),
            due_date: raw.due_date.as_deref().unwrap_or_default(),
            priority: raw
                .priority
                .as_deref()
                .filter(|p| !p.is_empty())
                .unwrap_or(Priority::default().as_str()),
            is_resolved: raw.is_resolved.as_deref().is_some_and(coerce_checkbox),
        }
    }
}

/// The list page. `today` drives the overdue markers.
pub fn render_list(todos: &[Todo], today: NaiveDate) -> tera::Result<String> {
    let rows: Vec<TodoRow> = todos
        .iter()
        .map(|todo| TodoRow {
            todo,
            overdue: todo.is_overdue(today),
            priority_label: todo.priority.label(),
        })
        .collect();

    let mut context = Context::new();
    context.insert("todos", &rows);
    context.insert("today", &today);
    templates().render("home.html", &context)
}

/// The create form when `todo_id` is `None`, the update form otherwise.
pub fn render_form(
    todo_id: Option<i64>,
    values: &RawFields,
    errors: &FieldErrors,
) -> tera::Result<String> {
    let priorities: Vec<PriorityChoice> = Priority::ALL
        .iter()
        .map(|p| PriorityChoice {
            code: p.as_str(),
            label: p.label(),
        })
        .collect();

    let mut context = Context::new();
    context.insert("todo_id", &todo_id);
    context.insert("values", &FormValues::new(values));
    context.insert("errors", errors);
    context.insert("priorities", &priorities);
    context.insert("title_max_len", &TITLE_MAX_LEN);
    templates().render("todo_form.html", &context)
}

pub fn render_confirm_delete(todo: &Todo) -> tera::Result<String> {
    let mut context = Context::new();
    context.insert("todo", todo);
    templates().render("todo_confirm_delete.html", &context)
}

pub fn render_not_found(path: &str) -> String {
    let mut context = Context::new();
    context.insert("request_path", path);
    templates()
        .render("404.html", &context)
        .unwrap_or_else(|_| default_error_page("Not Found", "The requested page could not be found."))
}

pub fn render_server_error() -> String {
    default_error_page(
        "Internal Server Error",
        "An error occurred while processing your request.",
    )
}

fn default_error_page(title: &str, message: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body><h1>{title}</h1><p>{message}</p></body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: i64, title: &str, due: Option<NaiveDate>, resolved: bool) -> Todo {
        Todo {
            id,
            title: title.to_string(),
            description: String::new(),
            due_date: due,
            priority: Priority::Urgent,
            is_resolved: resolved,
        }
    }

    #[test]
    fn test_templates_parse() {
        let names: Vec<&str> = templates().get_template_names().collect();
        for (name, _) in TEMPLATE_SOURCES {
            assert!(names.contains(&name), "missing template {name}");
        }
    }

    #[test]
    fn test_render_list() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        let todos = vec![
            sample(1, "Water plants", NaiveDate::from_ymd_opt(2025, 5, 1), false),
            sample(2, "File taxes", None, true),
        ];
        let html = render_list(&todos, today).unwrap();

        assert!(html.contains("Water plants"));
        assert!(html.contains("File taxes"));
        assert!(html.contains("(overdue)"));
        assert!(html.contains("/update/1/"));
        assert!(html.contains("Urgent"));
        assert!(html.contains("2025-05-10"));
    }

    #[test]
    fn test_render_empty_list() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        let html = render_list(&[], today).unwrap();
        assert!(html.contains("Nothing to do."));
    }

    #[test]
    fn test_render_form_with_errors() {
        let values = RawFields {
            title: Some(String::new()),
            priority: Some("high".to_string()),
            ..RawFields::default()
        };
        let errors = FieldErrors::single("title", "This field is required.");
        let html = render_form(None, &values, &errors).unwrap();

        assert!(html.contains("action=\"/create/\""));
        assert!(html.contains("This field is required."));
        assert!(html.contains("<option value=\"high\" selected>"));
        assert!(!html.contains("is_resolved"));
    }

    #[test]
    fn test_render_update_form() {
        let todo = sample(4, "Edit me", None, true);
        let html = render_form(Some(4), &RawFields::from_todo(&todo), &FieldErrors::default()).unwrap();

        assert!(html.contains("action=\"/update/4/\""));
        assert!(html.contains("value=\"Edit me\""));
        assert!(html.contains(" checked"));
    }

    #[test]
    fn test_render_checkbox_matches_saved_value() {
        let values = RawFields {
            title: Some(String::new()),
            is_resolved: Some("yes".to_string()),
            ..RawFields::default()
        };
        let html = render_form(Some(2), &values, &FieldErrors::default()).unwrap();
        assert!(html.contains(" checked"));

        let values = RawFields {
            is_resolved: Some("off".to_string()),
            ..values
        };
        let html = render_form(Some(2), &values, &FieldErrors::default()).unwrap();
        assert!(!html.contains(" checked"));
    }

    #[test]
    fn test_render_confirm_delete() {
        let html = render_confirm_delete(&sample(9, "Going away", None, false)).unwrap();
        assert!(html.contains("Going away"));
        assert!(html.contains("action=\"/delete/9/\""));
    }

    #[test]
    fn test_render_not_found() {
        let html = render_not_found("/nowhere/");
        assert!(html.contains("Not Found"));
    }
}
