use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use tracing::debug;

use crate::html::element_text;
use crate::record::{clean_name, Field, Record};

/// One layout heuristic. An empty result means "not this layout".
type Strategy = fn(&Html, &PageContext) -> Vec<Record>;

/// Tried in order; the first strategy that yields records wins.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("table", tabular),
    ("player-list", player_list),
    ("player-rows", player_rows),
    ("roster-container", roster_container),
];

// ============================================================================
// Lookup tables
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Column {
    Single(Field),
    // "Ithaca, NY / Ithaca HS": two fields in one cell when a slash is present.
    HometownAndSchool,
}

static COLUMNS: Lazy<HashMap<&'static str, Column>> = Lazy::new(|| {
    use Column::*;
    HashMap::from([
        ("name", Single(Field::Name)),
        ("full name", Single(Field::Name)),
        ("player", Single(Field::Name)),
        ("pos", Single(Field::Position)),
        ("position", Single(Field::Position)),
        ("cl", Single(Field::ClassStanding)),
        ("class", Single(Field::ClassStanding)),
        ("yr", Single(Field::ClassStanding)),
        ("year", Single(Field::ClassStanding)),
        ("academic year", Single(Field::ClassStanding)),
        ("ht", Single(Field::Height)),
        ("height", Single(Field::Height)),
        ("wt", Single(Field::Weight)),
        ("weight", Single(Field::Weight)),
        ("hometown", HometownAndSchool),
        ("high school", Single(Field::HighSchool)),
        ("hometown/high school", HometownAndSchool),
        ("hometown / high school", HometownAndSchool),
    ])
});

const NAME_CLASSES: &[&str] = &[
    "sidearm-roster-player-name",
    "sidearm-roster-player-name-last-first",
    "roster-player-name",
];

const FIELD_CLASSES: &[(Field, &[&str])] = &[
    (
        Field::ClassStanding,
        &[
            "sidearm-roster-player-academic-year",
            "sidearm-roster-player-year",
            "sidearm-roster-player-class",
            "roster-player-year",
            "roster-player-class",
            "academic-year",
            "class-year",
        ],
    ),
    (
        Field::Position,
        &["sidearm-roster-player-position", "roster-player-position", "position"],
    ),
    (
        Field::Hometown,
        &["sidearm-roster-player-hometown", "roster-player-hometown", "hometown"],
    ),
    (
        Field::HighSchool,
        &["sidearm-roster-player-highschool", "roster-player-highschool", "high-school"],
    ),
    (
        Field::Height,
        &["sidearm-roster-player-height", "roster-player-height", "height"],
    ),
    (
        Field::Weight,
        &["sidearm-roster-player-weight", "roster-player-weight", "weight"],
    ),
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e:?}"))
}

fn class_selectors(classes: &[&str]) -> Vec<Selector> {
    classes.iter().map(|class| selector(&format!(".{class}"))).collect()
}

static TABLE: Lazy<Selector> = Lazy::new(|| selector("table"));
static ROW: Lazy<Selector> = Lazy::new(|| selector("tr"));
static HEADER_CELL: Lazy<Selector> = Lazy::new(|| selector("th"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td, th"));
static LIST_PLAYERS: Lazy<Selector> = Lazy::new(|| selector("li.sidearm-roster-player"));
static ROW_PLAYERS: Lazy<Selector> = Lazy::new(|| selector("tr.sidearm-roster-player"));
static CONTAINER_PLAYERS: Lazy<Selector> = Lazy::new(|| {
    selector(".sidearm-roster-players li, .sidearm-roster-players tr")
});
static PROFILE_LINK: Lazy<Selector> = Lazy::new(|| selector("a[href*='/roster/']"));
static NAME_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| class_selectors(NAME_CLASSES));
static FIELD_SELECTORS: Lazy<Vec<(Field, Vec<Selector>)>> = Lazy::new(|| {
    FIELD_CLASSES
        .iter()
        .map(|(field, classes)| (*field, class_selectors(classes)))
        .collect()
});

// ============================================================================
// Entry point
// ============================================================================

/// Where the records on a page belong.
pub struct PageContext<'a> {
    pub category: &'a str,
    pub year: u16,
    pub source_url: &'a str,
}

impl PageContext<'_> {
    fn blank(&self) -> Record {
        Record::blank(self.category, self.year, self.source_url)
    }
}

/// Pulls roster records out of a validated page. Never fails; a page no
/// strategy understands simply yields nothing.
pub fn extract(document: &Html, category: &str, year: u16, source_url: &str) -> Vec<Record> {
    let ctx = PageContext {
        category,
        year,
        source_url,
    };

    for (name, strategy) in STRATEGIES {
        let records = strategy(document, &ctx);
        if !records.is_empty() {
            debug!("{} {}: {} records via {} strategy", category, year, records.len(), name);
            return records;
        }
    }
    Vec::new()
}

// ============================================================================
// Table layout
// ============================================================================

fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches('.')
        .to_string()
}

fn tabular(document: &Html, ctx: &PageContext) -> Vec<Record> {
    for table in document.select(&TABLE) {
        let rows: Vec<ElementRef> = table.select(&ROW).collect();
        let Some(header_at) = rows
            .iter()
            .position(|row| row.select(&HEADER_CELL).next().is_some())
        else {
            continue;
        };

        let headers: Vec<String> = rows[header_at]
            .select(&CELL)
            .map(|cell| normalize_header(&element_text(cell)))
            .collect();

        let has_name_column = headers
            .iter()
            .any(|h| matches!(COLUMNS.get(h.as_str()), Some(Column::Single(Field::Name))));
        if !has_name_column {
            continue;
        }

        let records: Vec<Record> = rows[header_at + 1..]
            .iter()
            .filter_map(|row| table_row(*row, &headers, ctx))
            .collect();
        if !records.is_empty() {
            return records;
        }
    }
    Vec::new()
}

fn table_row(row: ElementRef, headers: &[String], ctx: &PageContext) -> Option<Record> {
    let cells: Vec<String> = row.select(&CELL).map(element_text).collect();
    if cells.len() < 2 {
        return None;
    }

    let mut record = ctx.blank();
    for (header, text) in headers.iter().zip(&cells) {
        match COLUMNS.get(header.as_str()) {
            Some(Column::Single(field)) => record.set(*field, text),
            Some(Column::HometownAndSchool) => match text.split_once('/') {
                Some((town, school)) => {
                    record.set(Field::Hometown, town);
                    record.set(Field::HighSchool, school);
                }
                None => record.set(Field::Hometown, text),
            },
            None => {}
        }
    }

    record.has_name().then_some(record)
}

// ============================================================================
// Player card layouts
// ============================================================================

fn player_list(document: &Html, ctx: &PageContext) -> Vec<Record> {
    player_cards(document, ctx, &LIST_PLAYERS)
}

// Older archives render each player as a table row with the same classes.
fn player_rows(document: &Html, ctx: &PageContext) -> Vec<Record> {
    player_cards(document, ctx, &ROW_PLAYERS)
}

fn roster_container(document: &Html, ctx: &PageContext) -> Vec<Record> {
    player_cards(document, ctx, &CONTAINER_PLAYERS)
}

fn player_cards(document: &Html, ctx: &PageContext, cards: &Selector) -> Vec<Record> {
    document
        .select(cards)
        .filter_map(|card| player_card(card, ctx))
        .collect()
}

/// First descendant matching any of `selectors` (in priority order) with text.
fn first_text(card: ElementRef, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        card.select(sel)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

fn player_card(card: ElementRef, ctx: &PageContext) -> Option<Record> {
    let name = first_text(card, &NAME_SELECTORS)
        .map(|raw| clean_name(&raw))
        .filter(|name| !name.is_empty())
        .or_else(|| {
            card.select(&PROFILE_LINK)
                .map(element_text)
                .find(|text| !text.is_empty())
        })?;

    let mut record = ctx.blank();
    record.set(Field::Name, &name);
    for (field, selectors) in FIELD_SELECTORS.iter() {
        if let Some(text) = first_text(card, selectors) {
            record.set(*field, &text);
        }
    }

    record.has_name().then_some(record)
}
