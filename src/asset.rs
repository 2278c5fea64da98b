use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The canonical property record every strategy produces.
///
/// Every field except `id` is independently optional. Field names follow the
/// backend schema, so a filter remapped to a backend field can be evaluated
/// against an `Asset` with [`Asset::text_field`] / [`Asset::numeric_field`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Asset {
    // ── identification ──
    pub id: String,
    pub reference_code: Option<String>,
    pub provider_reference: Option<String>,
    pub cadastral_reference: Option<String>,
    pub registry_property_number: Option<String>,
    pub portfolio: Option<String>,
    pub servicer: Option<String>,

    // ── location ──
    pub region: Option<String>,
    pub province: Option<String>,
    pub municipality: Option<String>,
    pub postal_code: Option<String>,
    pub street_type: Option<String>,
    pub street_name: Option<String>,
    pub street_number: Option<String>,
    pub block: Option<String>,
    pub staircase: Option<String>,
    pub floor: Option<String>,
    pub door: Option<String>,
    pub full_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    // ── physical ──
    pub property_type: Option<String>,
    pub property_subtype: Option<String>,
    pub sqm: Option<f64>,
    pub sqm_usable: Option<f64>,
    pub sqm_plot: Option<f64>,
    pub rooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub construction_year: Option<i32>,
    pub has_garage: Option<bool>,
    pub has_storage_room: Option<bool>,
    pub has_elevator: Option<bool>,
    pub energy_rating: Option<String>,

    // ── financial ──
    pub price_approx: Option<f64>,
    pub price_per_sqm: Option<f64>,
    pub appraisal_value: Option<f64>,
    pub market_value: Option<f64>,
    pub auction_value: Option<f64>,
    pub auction_min_bid: Option<f64>,
    pub auction_deposit: Option<f64>,
    pub reserve_price: Option<f64>,
    pub total_debt: Option<f64>,
    pub principal_debt: Option<f64>,
    pub interest_debt: Option<f64>,
    pub legal_costs: Option<f64>,
    pub annual_property_tax: Option<f64>,
    pub community_fees: Option<f64>,

    // ── legal / status ──
    pub legal_phase: Option<String>,
    pub procedure_phase: Option<String>,
    pub procedure_type: Option<String>,
    pub court: Option<String>,
    pub court_case_number: Option<String>,
    pub marketing_status: Option<String>,
    pub occupancy_status: Option<String>,
    pub possession_status: Option<String>,
    pub charges: Option<String>,

    // ── dates ──
    pub closing_date: Option<NaiveDate>,
    pub auction_date: Option<NaiveDate>,
    pub auction_end_date: Option<NaiveDate>,
    pub adjudication_date: Option<NaiveDate>,
    pub possession_date: Option<NaiveDate>,
    pub valuation_date: Option<NaiveDate>,
    pub publication_date: Option<NaiveDate>,
    pub created_at: Option<NaiveDate>,
    pub updated_at: Option<NaiveDate>,

    // ── presentation ──
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub listing_url: Option<String>,
}

impl Asset {
    /// String-valued field by backend name.
    pub fn text_field(&self, field: &str) -> Option<&str> {
        let v = match field {
            "id" => return Some(self.id.as_str()),
            "reference_code" => &self.reference_code,
            "cadastral_reference" => &self.cadastral_reference,
            "region" => &self.region,
            "province" => &self.province,
            "municipality" => &self.municipality,
            "postal_code" => &self.postal_code,
            "street_type" => &self.street_type,
            "street_name" => &self.street_name,
            "property_type" => &self.property_type,
            "property_subtype" => &self.property_subtype,
            "legal_phase" => &self.legal_phase,
            "procedure_phase" => &self.procedure_phase,
            "marketing_status" => &self.marketing_status,
            "occupancy_status" => &self.occupancy_status,
            _ => return None,
        };
        v.as_deref()
    }

    /// Numeric field by backend name, widened to `f64`.
    pub fn numeric_field(&self, field: &str) -> Option<f64> {
        match field {
            "price_approx" => self.price_approx,
            "price_per_sqm" => self.price_per_sqm,
            "appraisal_value" => self.appraisal_value,
            "auction_value" => self.auction_value,
            "total_debt" => self.total_debt,
            "sqm" => self.sqm,
            "sqm_usable" => self.sqm_usable,
            "rooms" => self.rooms.map(f64::from),
            "bathrooms" => self.bathrooms.map(f64::from),
            "construction_year" => self.construction_year.map(f64::from),
            _ => None,
        }
    }

    /// Lower-cased text the fallback strategy substring-matches against.
    pub fn searchable_text(&self) -> String {
        [
            &self.province,
            &self.municipality,
            &self.street_type,
            &self.street_name,
            &self.property_type,
            &self.reference_code,
        ]
        .iter()
        .filter_map(|f| f.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }
}
