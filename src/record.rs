use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder for every field the page did not provide.
pub const UNKNOWN: &str = "N/A";

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digit pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

// Checked in this order, so "gr" also catches "graduate student".
const CLASS_OFFSETS: &[(&str, u16)] = &[
    ("fr", 4),
    ("freshman", 4),
    ("so", 3),
    ("sophomore", 3),
    ("jr", 2),
    ("junior", 2),
    ("sr", 1),
    ("senior", 1),
    ("gr", 0),
    ("graduate", 0),
];

// ============================================================================
// Work units
// ============================================================================

/// One fetch-extract unit of work: a category slug for one roster year.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    pub category: String,
    pub year: u16,
}

impl Task {
    pub fn new(category: impl Into<String>, year: u16) -> Self {
        Self {
            category: category.into(),
            year,
        }
    }
}

/// Outcome of one task, produced exactly once per task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task: Task,
    pub success: bool,
    pub records: Vec<Record>,
    pub source_url: Option<String>,
}

impl TaskResult {
    pub fn hit(task: Task, url: String, records: Vec<Record>) -> Self {
        Self {
            task,
            success: true,
            records,
            source_url: Some(url),
        }
    }

    pub fn miss(task: Task) -> Self {
        Self {
            task,
            success: false,
            records: Vec::new(),
            source_url: None,
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// Output columns that extraction strategies can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    ClassStanding,
    Position,
    Hometown,
    HighSchool,
    Height,
    Weight,
}

/// One athlete roster entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Record {
    // Field order drives the derived ordering: category, year, name first.
    pub category: String,
    pub year: u16,
    pub name: String,
    pub class_standing: String,
    pub position: String,
    pub hometown: String,
    pub high_school: String,
    pub height: String,
    pub weight: String,
    pub source_url: String,
}

impl Record {
    /// A record with every optional field set to [`UNKNOWN`].
    pub fn blank(category_slug: &str, year: u16, source_url: &str) -> Self {
        Self {
            category: display_category(category_slug),
            year,
            name: UNKNOWN.to_string(),
            class_standing: UNKNOWN.to_string(),
            position: UNKNOWN.to_string(),
            hometown: UNKNOWN.to_string(),
            high_school: UNKNOWN.to_string(),
            height: UNKNOWN.to_string(),
            weight: UNKNOWN.to_string(),
            source_url: source_url.to_string(),
        }
    }

    pub fn set(&mut self, field: Field, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        match field {
            Field::Name => self.name = clean_name(value),
            Field::ClassStanding => self.class_standing = value.to_string(),
            Field::Position => self.position = value.to_string(),
            Field::Hometown => self.hometown = value.to_string(),
            Field::HighSchool => self.high_school = value.to_string(),
            Field::Height => self.height = value.to_string(),
            Field::Weight => self.weight = value.to_string(),
        }
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty() && self.name != UNKNOWN
    }

    /// Key used to collapse duplicates across tasks.
    pub fn identity(&self) -> (&str, &str, u16) {
        (&self.name, &self.category, self.year)
    }

    /// Year the athlete is expected to finish, inferred from class standing.
    pub fn completion_year(&self) -> u16 {
        let standing = self.class_standing.trim().to_lowercase();
        if standing.is_empty() || self.class_standing == UNKNOWN {
            return self.year;
        }
        CLASS_OFFSETS
            .iter()
            .find(|(key, _)| standing.contains(key))
            .map(|(_, offset)| self.year.saturating_add(*offset))
            .unwrap_or(self.year)
    }
}

/// Strips jersey numbers and collapses whitespace.
pub fn clean_name(raw: &str) -> String {
    let without_digits = DIGITS.replace_all(raw, "");
    WHITESPACE
        .replace_all(without_digits.trim(), " ")
        .into_owned()
}

/// "mens-swimming-and-diving" -> "Mens Swimming And Diving"
pub fn display_category(slug: &str) -> String {
    slug.replace('-', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
