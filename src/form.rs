/*!
    Validation of submitted todo fields.

    Raw string values from a form body (or the command line) are checked
    and coerced here before anything reaches the store.
!*/
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use winnow::Parser;
use winnow::Result;
use winnow::error::ParserError;
use winnow::token::{one_of, take_while};

use crate::todo::{NewTodo, Priority, Todo, TodoChanges};

pub const TITLE_MAX_LEN: usize = 200;

const REQUIRED: &str = "This field is required.";
const INVALID_DATE: &str = "Enter a valid date.";

/// Messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> std::result::Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Submitted values as they arrived. `None` means the key was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub is_resolved: Option<String>,
}

impl RawFields {
    /// Builds from url-encoded pairs. A repeated key keeps its last value,
    /// so a hidden `is_resolved=false` followed by a checked box reads as true.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut raw = RawFields::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "title" => &mut raw.title,
                "description" => &mut raw.description,
                "due_date" => &mut raw.due_date,
                "priority" => &mut raw.priority,
                "is_resolved" => &mut raw.is_resolved,
                _ => continue,
            };
            *slot = Some(value);
        }
        raw
    }

    /// Values for pre-filling the update form.
    pub fn from_todo(todo: &Todo) -> Self {
        RawFields {
            title: Some(todo.title.clone()),
            description: Some(todo.description.clone()),
            due_date: todo.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            priority: Some(todo.priority.as_str().to_string()),
            is_resolved: Some(todo.is_resolved.to_string()),
        }
    }

    pub fn validate_new(&self) -> std::result::Result<NewTodo, FieldErrors> {
        let mut errors = FieldErrors::default();

        let title = clean_title(self.title.as_deref()).unwrap_or_else(|e| {
            errors.add("title", e);
            String::new()
        });
        let description = clean_text(self.description.as_deref());
        let due_date = clean_due_date(self.due_date.as_deref()).unwrap_or_else(|e| {
            errors.add("due_date", e);
            None
        });
        let priority = clean_priority(self.priority.as_deref()).unwrap_or_else(|e| {
            errors.add("priority", e);
            Priority::default()
        });

        errors.into_result(|| NewTodo {
            title,
            description,
            due_date,
            priority,
        })
    }

    /// Only keys that were submitted become changes.
    pub fn validate_changes(&self) -> std::result::Result<TodoChanges, FieldErrors> {
        let mut errors = FieldErrors::default();
        let mut changes = TodoChanges::default();

        if let Some(title) = self.title.as_deref() {
            match clean_title(Some(title)) {
                Ok(title) => changes.title = Some(title),
                Err(e) => errors.add("title", e),
            }
        }
        if let Some(description) = self.description.as_deref() {
            changes.description = Some(clean_text(Some(description)));
        }
        if let Some(due_date) = self.due_date.as_deref() {
            match clean_due_date(Some(due_date)) {
                Ok(due_date) => changes.due_date = Some(due_date),
                Err(e) => errors.add("due_date", e),
            }
        }
        if let Some(priority) = self.priority.as_deref() {
            match clean_priority(Some(priority)) {
                Ok(priority) => changes.priority = Some(priority),
                Err(e) => errors.add("priority", e),
            }
        }
        if let Some(is_resolved) = self.is_resolved.as_deref() {
            changes.is_resolved = Some(coerce_checkbox(is_resolved));
        }

        errors.into_result(|| changes)
    }
}

pub fn clean_title(value: Option<&str>) -> std::result::Result<String, String> {
    let title = clean_text(value);
    if title.is_empty() {
        return Err(REQUIRED.to_string());
    }
    let len = title.chars().count();
    if len > TITLE_MAX_LEN {
        return Err(format!(
            "Ensure this value has at most {TITLE_MAX_LEN} characters (it has {len})."
        ));
    }
    Ok(title)
}

fn clean_text(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

fn clean_due_date(value: Option<&str>) -> std::result::Result<Option<NaiveDate>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_due_date(text)
            .map(Some)
            .ok_or_else(|| INVALID_DATE.to_string()),
    }
}

fn clean_priority(value: Option<&str>) -> std::result::Result<Priority, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(Priority::default()),
        Some(code) => code.parse::<Priority>().map_err(|_| {
            format!("Select a valid choice. {code} is not one of the available choices.")
        }),
    }
}

/// Unchecked is "", "false", "0" or "off"; anything else is checked.
pub fn coerce_checkbox(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "false" | "0" | "off"
    )
}

/// Parses `YYYY-MM-DD` or `YYYY/MM/DD`; the whole input must match.
pub fn parse_due_date(input: &str) -> Option<NaiveDate> {
    parse_date.parse(input).ok()
}

fn parse_date(input: &mut &str) -> Result<NaiveDate> {
    let (year, first, month, second, day) = (
        parse_year,
        parse_separator,
        parse_two_digits,
        parse_separator,
        parse_two_digits,
    )
        .parse_next(input)?;
    if first != second {
        return Err(ParserError::from_input(&*input));
    }
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| ParserError::from_input(&*input))
}

fn parse_year(input: &mut &str) -> Result<i32> {
    take_while(4, '0'..='9')
        .try_map(str::parse::<i32>)
        .parse_next(input)
}

fn parse_two_digits(input: &mut &str) -> Result<u32> {
    take_while(2, '0'..='9')
        .try_map(str::parse::<u32>)
        .parse_next(input)
}

fn parse_separator(input: &mut &str) -> Result<char> {
    one_of(['-', '/']).parse_next(input)
}
