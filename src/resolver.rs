use once_cell::sync::Lazy;
use std::collections::HashSet;

// Spring seasons sit inside one calendar year; everything else is published
// under a split "YYYY-YY" season.
static SINGLE_YEAR_CATEGORIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "baseball",
        "softball",
        "mens-lacrosse",
        "womens-lacrosse",
        "mens-golf",
        "womens-golf",
        "mens-tennis",
        "womens-tennis",
        "rowing",
        "mens-rowing",
        "womens-rowing",
        "mens-track-and-field",
        "womens-track-and-field",
        "womens-sailing",
    ]
    .into_iter()
    .collect()
});

/// How a season is written in roster URLs and page headings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonConvention {
    SingleYear,
    SplitYear,
}

impl SeasonConvention {
    pub fn for_category(category: &str) -> Self {
        if SINGLE_YEAR_CATEGORIES.contains(category) {
            SeasonConvention::SingleYear
        } else {
            SeasonConvention::SplitYear
        }
    }

    pub fn alternate(self) -> Self {
        match self {
            SeasonConvention::SingleYear => SeasonConvention::SplitYear,
            SeasonConvention::SplitYear => SeasonConvention::SingleYear,
        }
    }

    /// "2005" or "2005-06".
    pub fn season_label(self, year: u16) -> String {
        match self {
            SeasonConvention::SingleYear => year.to_string(),
            SeasonConvention::SplitYear => split_season(year),
        }
    }
}

pub fn split_season(year: u16) -> String {
    format!("{}-{:02}", year, (u32::from(year) + 1) % 100)
}

/// Produces candidate roster URLs for a (category, year) key.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    base_url: String,
}

impl UrlResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Preferred convention first, alternate second.
    pub fn resolve(&self, category: &str, year: u16) -> Vec<String> {
        let preferred = SeasonConvention::for_category(category);
        [preferred, preferred.alternate()]
            .into_iter()
            .map(|convention| {
                format!(
                    "{}/sports/{}/roster/{}",
                    self.base_url,
                    category,
                    convention.season_label(year)
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CATEGORIES;

    #[test]
    fn spring_categories_try_single_year_first() {
        let resolver = UrlResolver::new("https://example.edu/");
        assert_eq!(
            resolver.resolve("mens-lacrosse", 2010),
            vec![
                "https://example.edu/sports/mens-lacrosse/roster/2010".to_string(),
                "https://example.edu/sports/mens-lacrosse/roster/2010-11".to_string(),
            ]
        );
    }

    #[test]
    fn other_categories_try_split_year_first() {
        let resolver = UrlResolver::new("https://example.edu");
        assert_eq!(
            resolver.resolve("football", 1999),
            vec![
                "https://example.edu/sports/football/roster/1999-00".to_string(),
                "https://example.edu/sports/football/roster/1999".to_string(),
            ]
        );
    }

    #[test]
    fn every_default_category_orders_by_its_convention() {
        let resolver = UrlResolver::new("http://h");
        for category in DEFAULT_CATEGORIES {
            let urls = resolver.resolve(category, 2005);
            assert_eq!(urls.len(), 2);
            let split_first = urls[0].ends_with("/2005-06") && urls[1].ends_with("/2005");
            let single_first = urls[0].ends_with("/2005") && urls[1].ends_with("/2005-06");
            match SeasonConvention::for_category(category) {
                SeasonConvention::SplitYear => assert!(split_first, "{category}"),
                SeasonConvention::SingleYear => assert!(single_first, "{category}"),
            }
        }
    }

    #[test]
    fn split_season_pads_the_short_year() {
        assert_eq!(split_season(2008), "2008-09");
        assert_eq!(split_season(1999), "1999-00");
        assert_eq!(split_season(u16::MAX), "65535-36");
        assert_eq!(SeasonConvention::SingleYear.season_label(2019), "2019");
    }
}
