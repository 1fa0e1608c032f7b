use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::form::FieldErrors;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid todo: {0}")]
    Validation(FieldErrors),
    #[error("todo {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    /// The code stored in the `priority` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPriority(pub String);

impl fmt::Display for UnknownPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown priority `{}`", self.0)
    }
}

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPriority(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub is_resolved: bool,
}

impl Todo {
    /// Unresolved and due strictly before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_resolved && self.due_date.is_some_and(|due| due < today)
    }
}

/// Caller supplied fields for a new record. Everything else takes the
/// column defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
}

impl NewTodo {
    pub fn new(title: &str) -> Self {
        NewTodo {
            title: title.to_string(),
            description: String::new(),
            due_date: None,
            priority: Priority::default(),
        }
    }
}

/// Partial update. `None` leaves the stored value alone; `due_date` nests so
/// that an explicit `Some(None)` clears the date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub priority: Option<Priority>,
    pub is_resolved: Option<bool>,
}

impl TodoChanges {
    pub fn apply(self, todo: &mut Todo) {
        if let Some(title) = self.title {
            todo.title = title;
        }
        if let Some(description) = self.description {
            todo.description = description;
        }
        if let Some(due_date) = self.due_date {
            todo.due_date = due_date;
        }
        if let Some(priority) = self.priority {
            todo.priority = priority;
        }
        if let Some(is_resolved) = self.is_resolved {
            todo.is_resolved = is_resolved;
        }
    }
}

/// How `priority` ranks when sorting descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityRank {
    /// urgent > high > medium > low
    #[default]
    Severity,
    /// Descending by stored code: urgent > medium > low > high
    Lexical,
}

impl PriorityRank {
    fn rank(&self, priority: Priority) -> u8 {
        match self {
            PriorityRank::Severity => match priority {
                Priority::Low => 0,
                Priority::Medium => 1,
                Priority::High => 2,
                Priority::Urgent => 3,
            },
            PriorityRank::Lexical => match priority {
                Priority::High => 0,
                Priority::Low => 1,
                Priority::Medium => 2,
                Priority::Urgent => 3,
            },
        }
    }
}

/// Where items without a due date land inside their resolved-group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndatedPlacement {
    #[default]
    Last,
    First,
}

/// Sort specification handed to `TodoStore::list_all`.
///
/// Keys, in order: `is_resolved` ascending, `due_date` ascending, `priority`
/// descending, then `id` ascending so that the order is total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ListOrder {
    #[serde(default, rename = "priority_order")]
    pub priority_rank: PriorityRank,
    #[serde(default)]
    pub undated: UndatedPlacement,
}

impl ListOrder {
    pub fn compare(&self, a: &Todo, b: &Todo) -> Ordering {
        a.is_resolved
            .cmp(&b.is_resolved)
            .then_with(|| self.compare_due(a.due_date, b.due_date))
            .then_with(|| {
                self.priority_rank
                    .rank(b.priority)
                    .cmp(&self.priority_rank.rank(a.priority))
            })
            .then_with(|| a.id.cmp(&b.id))
    }

    pub fn sort(&self, todos: &mut [Todo]) {
        todos.sort_by(|a, b| self.compare(a, b));
    }

    fn compare_due(&self, a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => a.cmp(&b),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => match self.undated {
                UndatedPlacement::Last => Ordering::Greater,
                UndatedPlacement::First => Ordering::Less,
            },
            (Some(_), None) => match self.undated {
                UndatedPlacement::Last => Ordering::Less,
                UndatedPlacement::First => Ordering::Greater,
            },
        }
    }
}
