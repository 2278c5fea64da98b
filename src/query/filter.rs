use serde::{Deserialize, Serialize};

use crate::query::fields::{self, Bound};
use crate::types::{FilterValue, SearchFilters, SortOrder};

/// Query-language dialect of a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// `field: ANY("v")`, `field >= n` (managed discovery-style search).
    #[default]
    Discovery,
    /// `field:"v"`, `field:[n TO *]` (Lucene/tantivy query syntax).
    Lucene,
}

/// Turns [`SearchFilters`] into a backend filter expression.
///
/// Implementations share the public-key table in [`fields`] and its entry
/// order, so the same filters always produce the same string.
pub trait FilterTranslator: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Empty string when no filter is set.
    fn translate(&self, filters: &SearchFilters) -> String {
        filters
            .entries()
            .into_iter()
            .map(|(key, value)| {
                let field = fields::backend_field(key);
                match value {
                    FilterValue::One(v) => self.equals(field, v),
                    FilterValue::Many(vs) if vs.len() == 1 => self.equals(field, vs[0]),
                    FilterValue::Many(vs) => {
                        let parts: Vec<String> = vs.iter().map(|v| self.equals(field, v)).collect();
                        format!("({})", parts.join(" OR "))
                    }
                    FilterValue::Number(n) => match fields::bound_of(key) {
                        Bound::Min => self.at_least(field, n),
                        Bound::Max => self.at_most(field, n),
                        Bound::Exact => self.equals(field, &format_number(n)),
                    },
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn equals(&self, field: &str, value: &str) -> String;
    fn at_least(&self, field: &str, value: f64) -> String;
    fn at_most(&self, field: &str, value: f64) -> String;

    /// `None` keeps the backend's relevance order.
    fn order_by(&self, sort: SortOrder) -> Option<String>;
}

pub fn translator_for(kind: BackendKind) -> Box<dyn FilterTranslator> {
    match kind {
        BackendKind::Discovery => Box::new(DiscoveryTranslator),
        BackendKind::Lucene => Box::new(LuceneTranslator),
    }
}

fn sort_field(sort: SortOrder) -> Option<(&'static str, bool)> {
    match sort {
        SortOrder::Relevance => None,
        SortOrder::PriceAsc => Some(("price_approx", false)),
        SortOrder::PriceDesc => Some(("price_approx", true)),
        SortOrder::SurfaceAsc => Some(("sqm", false)),
        SortOrder::SurfaceDesc => Some(("sqm", true)),
        SortOrder::AuctionDateAsc => Some(("auction_date", false)),
        SortOrder::Newest => Some(("publication_date", true)),
    }
}

/// `100000.0` renders as `100000`, `99.5` as `99.5`.
fn format_number(n: f64) -> String {
    n.to_string()
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DiscoveryTranslator;

impl FilterTranslator for DiscoveryTranslator {
    fn backend(&self) -> BackendKind {
        BackendKind::Discovery
    }

    fn equals(&self, field: &str, value: &str) -> String {
        format!("{}: ANY({})", field, quote(value))
    }

    fn at_least(&self, field: &str, value: f64) -> String {
        format!("{} >= {}", field, format_number(value))
    }

    fn at_most(&self, field: &str, value: f64) -> String {
        format!("{} <= {}", field, format_number(value))
    }

    fn order_by(&self, sort: SortOrder) -> Option<String> {
        sort_field(sort).map(|(field, desc)| {
            if desc {
                format!("{} desc", field)
            } else {
                field.to_string()
            }
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LuceneTranslator;

impl FilterTranslator for LuceneTranslator {
    fn backend(&self) -> BackendKind {
        BackendKind::Lucene
    }

    fn equals(&self, field: &str, value: &str) -> String {
        format!("{}:{}", field, quote(value))
    }

    fn at_least(&self, field: &str, value: f64) -> String {
        format!("{}:[{} TO *]", field, format_number(value))
    }

    fn at_most(&self, field: &str, value: f64) -> String {
        format!("{}:[* TO {}]", field, format_number(value))
    }

    fn order_by(&self, sort: SortOrder) -> Option<String> {
        sort_field(sort).map(|(field, desc)| {
            format!("{}:{}", field, if desc { "desc" } else { "asc" })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Categorical;

    fn discovery() -> Box<dyn FilterTranslator> {
        translator_for(BackendKind::Discovery)
    }

    // ── empty input ─────────────────────────────────────────────────────

    #[test]
    fn no_filters_yields_empty_string() {
        assert_eq!(discovery().translate(&SearchFilters::default()), "");
        assert_eq!(
            translator_for(BackendKind::Lucene).translate(&SearchFilters::default()),
            ""
        );
    }

    #[test]
    fn blank_filters_yield_empty_string() {
        let f = SearchFilters {
            province: Some(Categorical::One(String::new())),
            municipality: Some(Categorical::Many(vec![])),
            ..Default::default()
        };
        assert_eq!(discovery().translate(&f), "");
    }

    // ── discovery dialect ───────────────────────────────────────────────

    #[test]
    fn scalar_categorical() {
        let f = SearchFilters {
            property_type: Some("RESIDENTIAL".into()),
            ..Default::default()
        };
        assert_eq!(discovery().translate(&f), r#"property_type: ANY("RESIDENTIAL")"#);
    }

    #[test]
    fn array_categorical_is_parenthesized_or() {
        let f = SearchFilters {
            province: Some(vec!["Madrid", "Toledo"].into()),
            ..Default::default()
        };
        assert_eq!(
            discovery().translate(&f),
            r#"(province: ANY("Madrid") OR province: ANY("Toledo"))"#
        );
    }

    #[test]
    fn single_element_array_has_no_parens() {
        let f = SearchFilters {
            province: Some(vec!["Madrid"].into()),
            ..Default::default()
        };
        assert_eq!(discovery().translate(&f), r#"province: ANY("Madrid")"#);
    }

    #[test]
    fn min_max_use_remapped_field_names() {
        let f = SearchFilters {
            surface_min: Some(80.0),
            surface_max: Some(120.5),
            price_min: Some(50_000.0),
            ..Default::default()
        };
        assert_eq!(
            discovery().translate(&f),
            "price_approx >= 50000 AND sqm >= 80 AND sqm <= 120.5"
        );
    }

    #[test]
    fn clauses_joined_with_and_in_table_order() {
        let f = SearchFilters {
            rooms_min: Some(3.0),
            province: Some("Madrid".into()),
            property_type: Some("RESIDENTIAL".into()),
            ..Default::default()
        };
        assert_eq!(
            discovery().translate(&f),
            r#"property_type: ANY("RESIDENTIAL") AND province: ANY("Madrid") AND rooms >= 3"#
        );
    }

    #[test]
    fn quotes_are_escaped() {
        let f = SearchFilters {
            municipality: Some(r#"L"Hospitalet"#.into()),
            ..Default::default()
        };
        assert_eq!(
            discovery().translate(&f),
            r#"municipality: ANY("L\"Hospitalet")"#
        );
    }

    #[test]
    fn discovery_order_by() {
        let t = discovery();
        assert_eq!(t.order_by(SortOrder::Relevance), None);
        assert_eq!(t.order_by(SortOrder::PriceDesc).as_deref(), Some("price_approx desc"));
        assert_eq!(t.order_by(SortOrder::SurfaceAsc).as_deref(), Some("sqm"));
    }

    // ── lucene dialect ──────────────────────────────────────────────────

    #[test]
    fn lucene_ranges_and_terms() {
        let f = SearchFilters {
            property_type: Some("RESIDENTIAL".into()),
            year_min: Some(1990.0),
            price_max: Some(200_000.0),
            ..Default::default()
        };
        assert_eq!(
            translator_for(BackendKind::Lucene).translate(&f),
            r#"property_type:"RESIDENTIAL" AND price_approx:[* TO 200000] AND construction_year:[1990 TO *]"#
        );
    }

    #[test]
    fn lucene_or_group() {
        let f = SearchFilters {
            legal_phase: Some(vec!["AUCTION", "POSSESSION"].into()),
            ..Default::default()
        };
        assert_eq!(
            translator_for(BackendKind::Lucene).translate(&f),
            r#"(legal_phase:"AUCTION" OR legal_phase:"POSSESSION")"#
        );
    }

    #[test]
    fn translator_reports_backend() {
        assert_eq!(discovery().backend(), BackendKind::Discovery);
        assert_eq!(translator_for(BackendKind::Lucene).backend(), BackendKind::Lucene);
    }
}
