//! Core data types for the task tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Priority given to a task when the create request leaves it out.
pub const DEFAULT_PRIORITY: i32 = 5;

/// A single todo item, the only entity in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Assigned by storage, never reused
    pub id: i64,

    pub title: String,

    pub description: Option<String>,

    pub completed: bool,

    /// Priority 1-10 (not enforced)
    pub priority: i32,

    /// Freeform grouping key
    pub category: Option<String>,

    pub due_date: Option<DateTime<Utc>>,

    /// When created
    pub created_at: DateTime<Utc>,

    /// Last modification
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task.
///
/// Only `title` is required. Everything else falls back to the storage
/// defaults: not completed, priority 5, no description, category or due date.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTask {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub completed: bool,

    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub due_date: Option<DateTime<Utc>>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl NewTask {
    /// Create an input with just a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            completed: false,
            priority: DEFAULT_PRIORITY,
            category: None,
            due_date: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the due date.
    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Mark the task as already completed.
    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }
}

/// Partial update of a task.
///
/// Every field is independently present or absent. Nullable columns use a
/// nested `Option`: `None` leaves the value alone, `Some(None)` clears it.
/// Non-nullable columns reject an explicit `null` during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskPatch {
    #[serde(default, deserialize_with = "non_null")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "non_null")]
    pub completed: Option<bool>,

    #[serde(default, deserialize_with = "non_null")]
    pub priority: Option<i32>,

    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,

    #[serde(default, deserialize_with = "timestamp::deserialize_patch")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set or clear the description.
    pub fn description(mut self, description: Option<&str>) -> Self {
        self.description = Some(description.map(String::from));
        self
    }

    /// Set the completion flag.
    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Set the priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set or clear the category.
    pub fn category(mut self, category: Option<&str>) -> Self {
        self.category = Some(category.map(String::from));
        self
    }

    /// Set or clear the due date.
    pub fn due_date(mut self, due_date: Option<DateTime<Utc>>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
            && self.category.is_none()
            && self.due_date.is_none()
    }

    /// Apply the present fields to `task` and stamp it with `now`.
    ///
    /// `updated_at` never moves backwards, even if the clock does.
    pub fn apply(self, task: Task, now: DateTime<Utc>) -> Task {
        Task {
            id: task.id,
            title: self.title.unwrap_or(task.title),
            description: self.description.unwrap_or(task.description),
            completed: self.completed.unwrap_or(task.completed),
            priority: self.priority.unwrap_or(task.priority),
            category: self.category.unwrap_or(task.category),
            due_date: self.due_date.unwrap_or(task.due_date),
            created_at: task.created_at,
            updated_at: now.max(task.updated_at),
        }
    }
}

/// Restriction on the `completed` flag when listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Pending,
}

impl StatusFilter {
    /// Parse a filter name. Anything unrecognized means no restriction.
    pub fn parse(name: &str) -> Self {
        match name {
            "completed" => StatusFilter::Completed,
            "pending" => StatusFilter::Pending,
            _ => StatusFilter::All,
        }
    }

    /// The `completed` value to match, if any.
    pub fn completed(&self) -> Option<bool> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Completed => Some(true),
            StatusFilter::Pending => Some(false),
        }
    }
}

/// Columns a listing can be sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    Id,
    Title,
    Description,
    Completed,
    Priority,
    Category,
    DueDate,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortKey {
    /// Map an attribute name to a sort key. Unknown names sort by creation time.
    pub fn from_name(name: &str) -> Self {
        match name {
            "id" => SortKey::Id,
            "title" => SortKey::Title,
            "description" => SortKey::Description,
            "completed" => SortKey::Completed,
            "priority" => SortKey::Priority,
            "category" => SortKey::Category,
            "due_date" => SortKey::DueDate,
            "updated_at" => SortKey::UpdatedAt,
            _ => SortKey::CreatedAt,
        }
    }

    /// The storage column backing this key.
    pub fn column(&self) -> &'static str {
        match self {
            SortKey::Id => "id",
            SortKey::Title => "title",
            SortKey::Description => "description",
            SortKey::Completed => "completed",
            SortKey::Priority => "priority",
            SortKey::Category => "category",
            SortKey::DueDate => "due_date",
            SortKey::CreatedAt => "created_at",
            SortKey::UpdatedAt => "updated_at",
        }
    }
}

/// Sort direction. Anything other than `asc` sorts descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Parse a direction name. Only `asc` sorts ascending.
    pub fn parse(name: &str) -> Self {
        match name {
            "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    /// SQL keyword for this direction.
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Options for listing tasks.
///
/// Deserializes from URL query pairs; every field is optional. A repeated
/// parameter keeps its last value and unknown parameters are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQuery {
    /// Case-insensitive substring across title, description and category
    pub search: Option<String>,

    pub status: StatusFilter,

    /// Exact category match
    pub category: Option<String>,

    pub sort_by: SortKey,

    pub sort_order: SortOrder,
}

impl<'de> Deserialize<'de> for TaskQuery {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(String, String)>::deserialize(deserializer)?;
        Ok(Self::from_pairs(pairs))
    }
}

impl TaskQuery {
    /// Create a query that lists everything, newest first.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query from `name=value` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        pairs.into_iter().fold(Self::new(), |query, (name, value)| {
            let value: String = value.into();
            match name.as_ref() {
                "search" => query.search(value),
                "status" => query.status(StatusFilter::parse(&value)),
                "category" => query.category(value),
                "sort_by" => query.sort_by(SortKey::from_name(&value)),
                "sort_order" => query.sort_order(SortOrder::parse(&value)),
                _ => query,
            }
        })
    }

    /// Match a term against title, description and category.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Filter by completion status.
    pub fn status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    /// Filter by exact category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sort by this column.
    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort_by = key;
        self
    }

    /// Sort direction.
    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = order;
        self
    }

    /// The search term, if one was given and is not empty.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }

    /// The category restriction, if one was given and is not empty.
    pub fn category_filter(&self) -> Option<&str> {
        self.category.as_deref().filter(|s| !s.is_empty())
    }
}

fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Timestamp parsing and storage formatting.
pub mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
    use serde::{Deserialize, Deserializer, de::Error};

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    /// Current time at storage precision (microseconds).
    pub fn now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }

    /// Render a timestamp the way it is stored: RFC 3339, microseconds, `Z`.
    pub fn format(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Parse a client-supplied timestamp. Values without an offset are UTC.
    pub fn parse(input: &str) -> Option<DateTime<Utc>> {
        let input = input.trim();

        if let Ok(at) = DateTime::parse_from_rfc3339(input) {
            return Some(at.with_timezone(&Utc).trunc_subsecs(6));
        }

        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
                return Some(naive.and_utc().trunc_subsecs(6));
            }
        }

        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub(crate) fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid datetime '{}'", raw))),
        }
    }

    pub(crate) fn deserialize_patch<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_option(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_task(title: &str) -> Task {
        let now = timestamp::now();
        Task {
            id: 1,
            title: title.to_string(),
            description: None,
            completed: false,
            priority: DEFAULT_PRIORITY,
            category: None,
            due_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_new_task_defaults_from_json() {
        let input: NewTask = serde_json::from_str(r#"{"title": "Buy milk"}"#).unwrap();
        assert_eq!(input, NewTask::new("Buy milk"));
        assert_eq!(input.priority, 5);
        assert!(!input.completed);
    }

    #[test]
    fn test_new_task_requires_title() {
        let result = serde_json::from_str::<NewTask>(r#"{"priority": 3}"#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("title"), "unexpected error: {}", err);
    }

    #[test]
    fn test_new_task_accepts_empty_title() {
        let input: NewTask = serde_json::from_str(r#"{"title": ""}"#).unwrap();
        assert_eq!(input.title, "");
    }

    #[test]
    fn test_new_task_rejects_null_priority() {
        assert!(serde_json::from_str::<NewTask>(r#"{"title": "x", "priority": null}"#).is_err());
    }

    #[test]
    fn test_new_task_due_date_forms() {
        let input: NewTask = serde_json::from_str(r#"{"title": "x", "due_date": "2024-05-01T09:30"}"#).unwrap();
        assert_eq!(input.due_date, Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()));

        let input: NewTask = serde_json::from_str(r#"{"title": "x", "due_date": null}"#).unwrap();
        assert_eq!(input.due_date, None);

        assert!(serde_json::from_str::<NewTask>(r#"{"title": "x", "due_date": "tomorrow"}"#).is_err());
    }

    #[test]
    fn test_patch_distinguishes_absent_from_null() {
        let patch: TaskPatch = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.category, None);
        assert_eq!(patch.due_date, None);

        let patch: TaskPatch = serde_json::from_str(r#"{"category": "work", "due_date": null}"#).unwrap();
        assert_eq!(patch.category, Some(Some("work".to_string())));
        assert_eq!(patch.due_date, Some(None));
    }

    #[test]
    fn test_patch_rejects_null_for_required_fields() {
        assert!(serde_json::from_str::<TaskPatch>(r#"{"title": null}"#).is_err());
        assert!(serde_json::from_str::<TaskPatch>(r#"{"completed": null}"#).is_err());
        assert!(serde_json::from_str::<TaskPatch>(r#"{"priority": null}"#).is_err());
    }

    #[test]
    fn test_empty_patch() {
        let patch: TaskPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
        assert!(!TaskPatch::new().completed(true).is_empty());
    }

    #[test]
    fn test_patch_apply_only_touches_present_fields() {
        let mut task = make_task("Original");
        task.description = Some("keep me".to_string());
        task.category = Some("home".to_string());

        let later = task.updated_at + chrono::Duration::seconds(5);
        let updated = TaskPatch::new().completed(true).category(None).apply(task.clone(), later);

        assert!(updated.completed);
        assert_eq!(updated.category, None);
        assert_eq!(updated.title, task.title);
        assert_eq!(updated.description, task.description);
        assert_eq!(updated.priority, task.priority);
        assert_eq!(updated.created_at, task.created_at);
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn test_patch_apply_never_moves_updated_at_backwards() {
        let task = make_task("Task");
        let earlier = task.updated_at - chrono::Duration::seconds(30);
        let updated = TaskPatch::new().apply(task.clone(), earlier);
        assert_eq!(updated.updated_at, task.updated_at);
    }

    #[test]
    fn test_status_filter_parse() {
        assert_eq!(StatusFilter::parse("completed"), StatusFilter::Completed);
        assert_eq!(StatusFilter::parse("pending"), StatusFilter::Pending);
        assert_eq!(StatusFilter::parse("all"), StatusFilter::All);
        assert_eq!(StatusFilter::parse("bogus"), StatusFilter::All);

        assert_eq!(StatusFilter::Completed.completed(), Some(true));
        assert_eq!(StatusFilter::Pending.completed(), Some(false));
        assert_eq!(StatusFilter::All.completed(), None);
    }

    #[test]
    fn test_sort_key_mapping() {
        for name in [
            "id",
            "title",
            "description",
            "completed",
            "priority",
            "category",
            "due_date",
            "created_at",
            "updated_at",
        ] {
            assert_eq!(SortKey::from_name(name).column(), name);
        }
    }

    #[test]
    fn test_sort_key_unknown_falls_back_to_created_at() {
        assert_eq!(SortKey::from_name("password"), SortKey::CreatedAt);
        assert_eq!(SortKey::from_name("id; DROP TABLE tasks"), SortKey::CreatedAt);
        assert_eq!(SortKey::from_name(""), SortKey::CreatedAt);
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("desc"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("ASC"), SortOrder::Desc);
        assert_eq!(SortOrder::Asc.keyword(), "ASC");
    }

    #[test]
    fn test_task_query_defaults() {
        let query: TaskQuery = serde_json::from_str("[]").unwrap();
        assert_eq!(query, TaskQuery::new());
        assert_eq!(query.sort_by, SortKey::CreatedAt);
        assert_eq!(query.sort_order, SortOrder::Desc);
        assert_eq!(query.status, StatusFilter::All);
    }

    #[test]
    fn test_task_query_from_pairs() {
        let query = TaskQuery::from_pairs([
            ("search", "milk"),
            ("status", "pending"),
            ("category", "errands"),
            ("sort_by", "priority"),
            ("sort_order", "asc"),
            ("page", "2"),
        ]);

        assert_eq!(
            query,
            TaskQuery::new()
                .search("milk")
                .status(StatusFilter::Pending)
                .category("errands")
                .sort_by(SortKey::Priority)
                .sort_order(SortOrder::Asc)
        );
    }

    #[test]
    fn test_task_query_repeated_parameter_keeps_last() {
        let query = TaskQuery::from_pairs([("status", "pending"), ("status", "completed")]);
        assert_eq!(query.status, StatusFilter::Completed);
    }

    #[test]
    fn test_task_query_empty_strings_mean_no_filter() {
        let query = TaskQuery::new().search("").category("");
        assert_eq!(query.search_term(), None);
        assert_eq!(query.category_filter(), None);

        let query = TaskQuery::new().search("milk").category("errands");
        assert_eq!(query.search_term(), Some("milk"));
        assert_eq!(query.category_filter(), Some("errands"));
    }

    #[test]
    fn test_task_serializes_absent_fields_as_null() {
        let task = make_task("Test");
        let value = serde_json::to_value(&task).unwrap();
        assert!(value["description"].is_null());
        assert!(value["category"].is_null());
        assert!(value["due_date"].is_null());
        assert!(value["created_at"].is_string());
        assert_eq!(value["priority"], 5);
    }

    #[test]
    fn test_timestamp_parse_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        assert_eq!(timestamp::parse("2024-05-01T09:30:00Z"), Some(expected));
        assert_eq!(timestamp::parse("2024-05-01T11:30:00+02:00"), Some(expected));
        assert_eq!(timestamp::parse("2024-05-01T09:30:00"), Some(expected));
        assert_eq!(timestamp::parse("2024-05-01T09:30"), Some(expected));
        assert_eq!(timestamp::parse("2024-05-01 09:30:00"), Some(expected));
        assert_eq!(
            timestamp::parse("2024-05-01"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(timestamp::parse("not a date"), None);
    }

    #[test]
    fn test_timestamp_format_sorts_chronologically() {
        let a = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        assert_eq!(timestamp::format(&a), "2024-05-01T09:30:00.000000Z");
        assert!(timestamp::format(&a) < timestamp::format(&b));
    }
}
