//! Public filter/facet/sort keys and the backend schema fields they map to.
//!
//! Both translators and the in-process predicate go through this table, so a
//! public key never leaks into a backend expression.

/// Which side of a range a key constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Exact,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub public: &'static str,
    pub backend: &'static str,
}

/// Filter keys in the order translators emit them.
pub const FILTER_FIELDS: &[FieldMapping] = &[
    FieldMapping { public: "property_type", backend: "property_type" },
    FieldMapping { public: "province", backend: "province" },
    FieldMapping { public: "municipality", backend: "municipality" },
    FieldMapping { public: "legal_phase", backend: "legal_phase" },
    FieldMapping { public: "marketing_status", backend: "marketing_status" },
    FieldMapping { public: "price_min", backend: "price_approx" },
    FieldMapping { public: "price_max", backend: "price_approx" },
    FieldMapping { public: "surface_min", backend: "sqm" },
    FieldMapping { public: "surface_max", backend: "sqm" },
    FieldMapping { public: "year_min", backend: "construction_year" },
    FieldMapping { public: "year_max", backend: "construction_year" },
    FieldMapping { public: "rooms_min", backend: "rooms" },
    FieldMapping { public: "bathrooms_min", backend: "bathrooms" },
];

/// Facet keys the backend can aggregate on.
pub const FACET_FIELDS: &[FieldMapping] = &[
    FieldMapping { public: "property_type", backend: "property_type" },
    FieldMapping { public: "province", backend: "province" },
    FieldMapping { public: "municipality", backend: "municipality" },
    FieldMapping { public: "legal_phase", backend: "legal_phase" },
    FieldMapping { public: "marketing_status", backend: "marketing_status" },
    FieldMapping { public: "surface", backend: "sqm" },
    FieldMapping { public: "price", backend: "price_approx" },
];

/// Backend field for a public filter key. Unknown keys pass through unchanged.
pub fn backend_field(public: &str) -> &str {
    FILTER_FIELDS
        .iter()
        .find(|m| m.public == public)
        .map(|m| m.backend)
        .unwrap_or(public)
}

/// Backend field for a public facet key, or `None` if it cannot be faceted.
pub fn facet_backend_field(public: &str) -> Option<&'static str> {
    FACET_FIELDS
        .iter()
        .find(|m| m.public == public)
        .map(|m| m.backend)
}

/// Public facet key for a backend field name as echoed in a response.
pub fn facet_public_key(backend: &str) -> Option<&'static str> {
    FACET_FIELDS
        .iter()
        .find(|m| m.backend == backend)
        .map(|m| m.public)
}

pub fn bound_of(public: &str) -> Bound {
    if public.ends_with("_min") {
        Bound::Min
    } else if public.ends_with("_max") {
        Bound::Max
    } else {
        Bound::Exact
    }
}
