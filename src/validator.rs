use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::html::{element_text, visible_text};
use crate::resolver::split_season;

const NOT_FOUND_MARKER: &str = "page not found";
const STATUS_WINDOW: usize = 500;
const YEAR_WINDOW: usize = 2000;

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("title selector"));
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("h1 selector"));
static H2: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").expect("h2 selector"));
static SELECT: Lazy<Selector> = Lazy::new(|| Selector::parse("select[name]").expect("select selector"));
static SELECTED_OPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse("option[selected]").expect("option selector"));

/// Decides whether a 200 page really is the roster we asked for.
///
/// Out-of-range seasons are commonly redirected to the current roster with a
/// 200, so when `expected_year` is given the page must also mention that
/// season in its title, heading, season selector or opening text. This is a
/// substring heuristic: an unrelated year in the opening text can let a wrong
/// page through, and a year drawn only by script is missed.
pub fn validate(document: &Html, expected_year: Option<u16>) -> bool {
    let title = document
        .select(&TITLE)
        .next()
        .map(element_text)
        .unwrap_or_default();

    if title.to_lowercase().contains(NOT_FOUND_MARKER) {
        return false;
    }

    let text = visible_text(document).to_lowercase();
    if text.contains(NOT_FOUND_MARKER) || leading(&text, STATUS_WINDOW).contains("404") {
        return false;
    }

    let Some(year) = expected_year else {
        return true;
    };
    let single = year.to_string();
    let split = split_season(year);
    let mentions = |haystack: &str| haystack.contains(&single) || haystack.contains(&split);

    let heading = document
        .select(&H1)
        .next()
        .or_else(|| document.select(&H2).next())
        .map(element_text)
        .unwrap_or_default();
    if mentions(&format!("{title} {heading}")) {
        return true;
    }

    let season_selector = document.select(&SELECT).find(|el| {
        el.value()
            .attr("name")
            .is_some_and(|name| name.to_lowercase().contains("roster"))
    });

    match season_selector {
        // A selector without a marked option tells us nothing either way.
        Some(selector) => selector
            .select(&SELECTED_OPTION)
            .next()
            .map_or(true, |option| mentions(&element_text(option))),
        None => mentions(leading(&text, YEAR_WINDOW)),
    }
}

/// First `n` characters of `text`, on a char boundary.
fn leading(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn not_found_title_is_rejected_for_any_year() {
        let doc = page(
            "<html><head><title>Page Not Found | Athletics</title></head>\
             <body><h1>2005 Roster</h1></body></html>",
        );
        assert!(!validate(&doc, None));
        assert!(!validate(&doc, Some(2005)));
    }

    #[test]
    fn not_found_body_and_early_404_are_rejected() {
        let body = page("<html><body><p>Sorry, page not found.</p></body></html>");
        assert!(!validate(&body, None));

        let status = page("<html><body><h1>Error 404</h1><p>Nothing here</p></body></html>");
        assert!(!validate(&status, None));
    }

    #[test]
    fn genuine_page_passes_without_year() {
        let doc = page("<html><head><title>Football Roster</title></head><body><table></table></body></html>");
        assert!(validate(&doc, None));
    }

    #[test]
    fn redirect_to_current_season_is_rejected() {
        let doc = page(
            "<html><head><title>2019-20 Football Roster</title></head>\
             <body><h1>2019 Football Roster</h1><p>Season 2019-20</p></body></html>",
        );
        assert!(!validate(&doc, Some(2005)));
        assert!(validate(&doc, Some(2019)));
    }

    #[test]
    fn year_in_heading_is_enough() {
        let doc = page(
            "<html><head><title>Roster</title></head>\
             <body><h2>2005-06 Men's Ice Hockey</h2></body></html>",
        );
        assert!(validate(&doc, Some(2005)));
    }

    #[test]
    fn season_selector_decides_when_heading_is_silent() {
        let wrong = page(
            "<html><head><title>Roster</title></head><body><h1>Roster</h1>\
             <select name='ctl00$roster_season'>\
               <option>2005-06</option><option selected>2023-24</option>\
             </select><p>2005-06</p></body></html>",
        );
        assert!(!validate(&wrong, Some(2005)));

        let right = page(
            "<html><head><title>Roster</title></head><body><h1>Roster</h1>\
             <select name='Roster'>\
               <option selected>2005-06</option><option>2023-24</option>\
             </select></body></html>",
        );
        assert!(validate(&right, Some(2005)));
    }

    #[test]
    fn selector_without_selected_option_is_accepted() {
        let doc = page(
            "<html><head><title>Roster</title></head><body>\
             <select name='roster'><option>2023-24</option></select></body></html>",
        );
        assert!(validate(&doc, Some(1980)));
    }

    #[test]
    fn year_must_appear_early_without_selector() {
        let filler = "lorem ipsum ".repeat(250);
        let late = page(&format!(
            "<html><head><title>Roster</title></head><body><p>{filler}</p><p>2005</p></body></html>"
        ));
        assert!(!validate(&late, Some(2005)));

        let early = page(&format!(
            "<html><head><title>Roster</title></head><body><p>Season 2005</p><p>{filler}</p></body></html>"
        ));
        assert!(validate(&early, Some(2005)));
    }

    #[test]
    fn leading_respects_char_boundaries() {
        assert_eq!(leading("héllo", 2), "hé");
        assert_eq!(leading("ab", 10), "ab");
    }
}
