use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::asset::Asset;
use crate::error::ErrorDescriptor;
use crate::query::fields;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// One free-text-plus-filter query. Built per call and never mutated by the
/// search layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub text: String,
    pub filters: SearchFilters,
    pub options: SearchOptions,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        SearchQuery {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }
}

/// Accepted values for a categorical filter: one value or any of several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Categorical {
    One(String),
    Many(Vec<String>),
}

impl Categorical {
    /// Non-blank values, trimmed. Empty means "no constraint".
    pub fn values(&self) -> Vec<&str> {
        match self {
            Categorical::One(s) => vec![s.trim()],
            Categorical::Many(v) => v.iter().map(|s| s.trim()).collect(),
        }
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

impl From<&str> for Categorical {
    fn from(s: &str) -> Self {
        Categorical::One(s.to_string())
    }
}

impl From<Vec<&str>> for Categorical {
    fn from(v: Vec<&str>) -> Self {
        Categorical::Many(v.into_iter().map(str::to_string).collect())
    }
}

/// A borrowed, non-empty filter entry as seen by translators and predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue<'a> {
    One(&'a str),
    Many(Vec<&'a str>),
    Number(f64),
}

/// Sparse structured filters. Absent, null and blank values mean "no
/// constraint"; numeric bounds also accept numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub property_type: Option<Categorical>,
    pub province: Option<Categorical>,
    pub municipality: Option<Categorical>,
    pub legal_phase: Option<Categorical>,
    pub marketing_status: Option<Categorical>,
    #[serde(deserialize_with = "lenient_number")]
    pub price_min: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub price_max: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub surface_min: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub surface_max: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub year_min: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub year_max: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub rooms_min: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub bathrooms_min: Option<f64>,
}

impl SearchFilters {
    fn categorical(&self, key: &str) -> Option<&Categorical> {
        match key {
            "property_type" => self.property_type.as_ref(),
            "province" => self.province.as_ref(),
            "municipality" => self.municipality.as_ref(),
            "legal_phase" => self.legal_phase.as_ref(),
            "marketing_status" => self.marketing_status.as_ref(),
            _ => None,
        }
    }

    fn bound(&self, key: &str) -> Option<f64> {
        match key {
            "price_min" => self.price_min,
            "price_max" => self.price_max,
            "surface_min" => self.surface_min,
            "surface_max" => self.surface_max,
            "year_min" => self.year_min,
            "year_max" => self.year_max,
            "rooms_min" => self.rooms_min,
            "bathrooms_min" => self.bathrooms_min,
            _ => None,
        }
    }

    /// Set entries in the fixed order of [`fields::FILTER_FIELDS`], keyed by
    /// their public name. Empty values are already dropped.
    pub fn entries(&self) -> Vec<(&'static str, FilterValue<'_>)> {
        let mut out = Vec::new();
        for mapping in fields::FILTER_FIELDS {
            let key = mapping.public;
            if let Some(cat) = self.categorical(key) {
                let values = cat.values();
                match (cat, values.len()) {
                    (_, 0) => {}
                    (Categorical::One(_), _) => out.push((key, FilterValue::One(values[0]))),
                    (Categorical::Many(_), _) => out.push((key, FilterValue::Many(values))),
                }
            } else if let Some(n) = self.bound(key) {
                if n.is_finite() {
                    out.push((key, FilterValue::Number(n)));
                }
            }
        }
        out
    }

    pub fn active_count(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }

    /// In-process predicate: does `asset` satisfy every set filter?
    ///
    /// Categoricals compare exactly after trimming, like the primary
    /// backend's `ANY(...)` test. A bound on a field the record lacks does
    /// not match.
    pub fn matches(&self, asset: &Asset) -> bool {
        self.entries().into_iter().all(|(key, value)| {
            let field = fields::backend_field(key);
            match value {
                FilterValue::One(expected) => asset
                    .text_field(field)
                    .is_some_and(|actual| actual.trim() == expected),
                FilterValue::Many(accepted) => asset.text_field(field).is_some_and(|actual| {
                    accepted
                        .iter()
                        .any(|expected| actual.trim() == *expected)
                }),
                FilterValue::Number(bound) => {
                    match (asset.numeric_field(field), fields::bound_of(key)) {
                        (Some(actual), fields::Bound::Min) => actual >= bound,
                        (Some(actual), fields::Bound::Max) => actual <= bound,
                        (Some(actual), fields::Bound::Exact) => actual == bound,
                        (None, _) => false,
                    }
                }
            }
        })
    }
}

fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
    SurfaceAsc,
    SurfaceDesc,
    AuctionDateAsc,
    Newest,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(SortOrder::Relevance),
            "price_asc" => Ok(SortOrder::PriceAsc),
            "price_desc" => Ok(SortOrder::PriceDesc),
            "surface_asc" => Ok(SortOrder::SurfaceAsc),
            "surface_desc" => Ok(SortOrder::SurfaceDesc),
            "auction_date_asc" => Ok(SortOrder::AuctionDateAsc),
            "newest" => Ok(SortOrder::Newest),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub page_size: usize,
    /// Opaque backend cursor. Wins over `offset` when both are set.
    pub page_token: Option<String>,
    pub offset: Option<usize>,
    pub sort: SortOrder,
    /// Public facet keys to aggregate.
    pub facets: Vec<String>,
    /// Per-session pseudo identifier for personalization and analytics.
    pub user_pseudo_id: Option<String>,
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            page_size: DEFAULT_PAGE_SIZE,
            page_token: None,
            offset: None,
            sort: SortOrder::Relevance,
            facets: Vec::new(),
            user_pseudo_id: None,
            timeout: None,
        }
    }
}

impl SearchOptions {
    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn effective_page_size(&self) -> usize {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

/// A single facet value and its document count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

/// Results returned by a strategy or by [`crate::SearchManager::search`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// Records in backend order.
    pub assets: Vec<Asset>,
    /// Total matches before pagination.
    pub total: u64,
    /// Facet counts keyed by public facet key, in request order.
    pub facets: IndexMap<String, Vec<FacetCount>>,
    pub next_page_token: Option<String>,
    /// Spell-corrected query, when the backend rewrote it.
    pub corrected_query: Option<String>,
    pub elapsed_ms: u64,
    /// Name of the strategy that produced this result.
    pub strategy: String,
    /// Set when the result was served in degraded mode.
    pub error: Option<ErrorDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- entries ---

    #[test]
    fn empty_filters_have_no_entries() {
        assert!(SearchFilters::default().entries().is_empty());
        assert!(SearchFilters::default().is_empty());
    }

    #[test]
    fn blank_values_are_no_constraint() {
        let f = SearchFilters {
            province: Some(Categorical::One("  ".into())),
            municipality: Some(Categorical::Many(vec![])),
            legal_phase: Some(Categorical::Many(vec!["".into(), " ".into()])),
            price_min: Some(f64::NAN),
            ..Default::default()
        };
        assert!(f.entries().is_empty());
    }

    #[test]
    fn entries_follow_table_order() {
        let f = SearchFilters {
            rooms_min: Some(2.0),
            property_type: Some("RESIDENTIAL".into()),
            price_max: Some(100_000.0),
            ..Default::default()
        };
        let keys: Vec<_> = f.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["property_type", "price_max", "rooms_min"]);
    }

    #[test]
    fn many_drops_blank_members() {
        let f = SearchFilters {
            province: Some(Categorical::Many(vec!["Madrid".into(), "".into()])),
            ..Default::default()
        };
        assert_eq!(
            f.entries(),
            vec![("province", FilterValue::Many(vec!["Madrid"]))]
        );
    }

    // --- lenient deserialization ---

    #[test]
    fn numeric_strings_and_empty_strings() {
        let f: SearchFilters = serde_json::from_value(serde_json::json!({
            "price_min": "50000",
            "price_max": "",
            "surface_min": null,
            "rooms_min": 3,
            "province": ["Madrid", "Toledo"],
            "property_type": "RESIDENTIAL"
        }))
        .unwrap();
        assert_eq!(f.price_min, Some(50_000.0));
        assert_eq!(f.price_max, None);
        assert_eq!(f.surface_min, None);
        assert_eq!(f.rooms_min, Some(3.0));
        assert_eq!(f.province, Some(Categorical::from(vec!["Madrid", "Toledo"])));
        assert_eq!(f.active_count(), 4);
    }

    #[test]
    fn garbage_number_is_no_constraint() {
        let f: SearchFilters =
            serde_json::from_value(serde_json::json!({"price_min": "cheap"})).unwrap();
        assert_eq!(f.price_min, None);
    }

    // --- matches ---

    fn asset() -> Asset {
        Asset {
            id: "1".into(),
            province: Some("Madrid".into()),
            property_type: Some("RESIDENTIAL".into()),
            price_approx: Some(120_000.0),
            sqm: Some(80.0),
            rooms: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn matches_categorical_exactly() {
        let f = SearchFilters {
            province: Some(" Madrid ".into()),
            ..Default::default()
        };
        assert!(f.matches(&asset()));
        let f = SearchFilters {
            province: Some("madrid".into()),
            ..Default::default()
        };
        assert!(!f.matches(&asset()));
        let f = SearchFilters {
            property_type: Some(vec!["residential", "COMMERCIAL"].into()),
            ..Default::default()
        };
        assert!(!f.matches(&asset()));
    }

    #[test]
    fn matches_any_of_many() {
        let f = SearchFilters {
            province: Some(vec!["Toledo", "Madrid"].into()),
            ..Default::default()
        };
        assert!(f.matches(&asset()));
        let f = SearchFilters {
            province: Some(vec!["Toledo", "Cuenca"].into()),
            ..Default::default()
        };
        assert!(!f.matches(&asset()));
    }

    #[test]
    fn matches_ranges_on_remapped_fields() {
        let f = SearchFilters {
            surface_min: Some(80.0),
            price_max: Some(120_000.0),
            rooms_min: Some(2.0),
            ..Default::default()
        };
        assert!(f.matches(&asset()));
        let f = SearchFilters {
            surface_min: Some(81.0),
            ..Default::default()
        };
        assert!(!f.matches(&asset()));
    }

    #[test]
    fn range_on_missing_field_does_not_match() {
        let f = SearchFilters {
            year_min: Some(1990.0),
            ..Default::default()
        };
        assert!(!f.matches(&asset()));
    }

    #[test]
    fn empty_filters_match_everything() {
        assert!(SearchFilters::default().matches(&Asset::default()));
    }

    // --- options ---

    #[test]
    fn page_size_is_clamped() {
        let mut o = SearchOptions::default();
        assert_eq!(o.effective_page_size(), 20);
        o.page_size = 0;
        assert_eq!(o.effective_page_size(), 1);
        o.page_size = 10_000;
        assert_eq!(o.effective_page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn sort_order_parses() {
        assert_eq!("price_desc".parse::<SortOrder>(), Ok(SortOrder::PriceDesc));
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
