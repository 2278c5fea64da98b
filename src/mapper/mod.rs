//! Backend document → canonical [`Asset`].
//!
//! A raw document carries its fields one of two ways: a structured payload of
//! typed values (`structData` / `fields`) that must be unwrapped recursively,
//! or a serialized JSON string (`jsonData`) that needs one parse. The shape is
//! resolved once by [`RawDocument::detect`]; both paths converge on a plain
//! JSON object, and every `Asset` field is then coerced from that object.
//!
//! Mapping never fails. Missing or malformed values become `None`, and a
//! missing identifier is replaced by a fresh UUID.

pub mod coerce;
pub mod tagged;

use serde_json::{Map, Value};

use crate::asset::Asset;

const STRUCTURED_MARKERS: &[&str] = &["structData", "derivedStructData", "fields"];
const SERIALIZED_MARKER: &str = "jsonData";
const ID_KEYS: &[&str] = &["id", "asset_id", "_id"];

/// The shape a raw document arrived in.
#[derive(Debug)]
pub enum RawDocument<'a> {
    Structured(&'a Map<String, Value>),
    Serialized(&'a str),
    Empty,
}

impl<'a> RawDocument<'a> {
    pub fn detect(raw: &'a Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return RawDocument::Empty;
        };
        for marker in STRUCTURED_MARKERS {
            if let Some(Value::Object(payload)) = obj.get(*marker) {
                // A protobuf Struct nests its map one level down.
                if let Some(Value::Object(inner)) = payload.get("fields") {
                    if payload.len() == 1 {
                        return RawDocument::Structured(inner);
                    }
                }
                return RawDocument::Structured(payload);
            }
        }
        match obj.get(SERIALIZED_MARKER) {
            Some(Value::String(s)) => RawDocument::Serialized(s),
            Some(Value::Object(payload)) => RawDocument::Structured(payload),
            _ => RawDocument::Empty,
        }
    }

    /// The loosely-typed record every field is coerced from.
    pub fn into_record(self) -> Map<String, Value> {
        match self {
            RawDocument::Structured(fields) => tagged::untag_map(fields),
            RawDocument::Serialized(payload) => match serde_json::from_str::<Value>(payload) {
                Ok(Value::Object(obj)) => obj,
                Ok(_) => {
                    tracing::debug!("serialized document payload is not an object");
                    Map::new()
                }
                Err(e) => {
                    tracing::debug!(error = %e, "unparseable serialized document payload");
                    Map::new()
                }
            },
            RawDocument::Empty => Map::new(),
        }
    }
}

/// Maps backend documents to [`Asset`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentMapper;

impl DocumentMapper {
    pub fn new() -> Self {
        DocumentMapper
    }

    pub fn map_document(&self, raw: &Value) -> Asset {
        let record = RawDocument::detect(raw).into_record();
        let id = resolve_id(&record, raw);
        build_asset(id, &Fields(&record))
    }

    pub fn map_all<'a, I>(&self, docs: I) -> Vec<Asset>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        docs.into_iter().map(|d| self.map_document(d)).collect()
    }
}

/// Record id, else the envelope's `id`, else the last segment of its
/// resource `name`, else a new UUID.
fn resolve_id(record: &Map<String, Value>, envelope: &Value) -> String {
    ID_KEYS
        .iter()
        .find_map(|k| coerce::text(record.get(*k)))
        .or_else(|| coerce::text(envelope.get("id")))
        .or_else(|| {
            coerce::text(envelope.get("name"))
                .and_then(|n| n.rsplit('/').next().map(str::to_string))
                .filter(|n| !n.is_empty())
        })
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Field lookup with aliases: the first present, non-null key wins.
struct Fields<'a>(&'a Map<String, Value>);

impl Fields<'_> {
    fn get(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find(|v| !v.is_null())
    }

    fn text(&self, keys: &[&str]) -> Option<String> {
        coerce::text(self.get(keys))
    }

    fn number(&self, keys: &[&str]) -> Option<f64> {
        coerce::number(self.get(keys))
    }

    fn integer<T: TryFrom<i64>>(&self, keys: &[&str]) -> Option<T> {
        coerce::integer(self.get(keys))
    }

    fn flag(&self, keys: &[&str]) -> Option<bool> {
        coerce::flag(self.get(keys))
    }

    fn date(&self, keys: &[&str]) -> Option<chrono::NaiveDate> {
        coerce::date(self.get(keys))
    }

    /// Latitude/longitude, either flat or inside a geo point object.
    fn coordinate(&self, flat: &str, point_key: &str) -> Option<f64> {
        self.number(&[flat]).or_else(|| {
            ["location", "geo", "coordinates"]
                .iter()
                .filter_map(|k| self.0.get(*k))
                .find_map(|p| coerce::number(p.get(point_key)))
        })
    }
}

fn build_asset(id: String, f: &Fields<'_>) -> Asset {
    Asset {
        id,
        reference_code: f.text(&["reference_code", "reference"]),
        provider_reference: f.text(&["provider_reference"]),
        cadastral_reference: f.text(&["cadastral_reference", "ref_catastral"]),
        registry_property_number: f.text(&["registry_property_number", "finca_registral"]),
        portfolio: f.text(&["portfolio"]),
        servicer: f.text(&["servicer"]),

        region: f.text(&["region", "autonomous_community"]),
        province: f.text(&["province"]),
        municipality: f.text(&["municipality", "city"]),
        postal_code: f.text(&["postal_code", "zip_code"]),
        street_type: f.text(&["street_type"]),
        street_name: f.text(&["street_name"]),
        street_number: f.text(&["street_number"]),
        block: f.text(&["block"]),
        staircase: f.text(&["staircase"]),
        floor: f.text(&["floor"]),
        door: f.text(&["door"]),
        full_address: f.text(&["full_address", "address"]),
        latitude: f.coordinate("latitude", "latitude"),
        longitude: f.coordinate("longitude", "longitude"),

        property_type: f.text(&["property_type"]),
        property_subtype: f.text(&["property_subtype"]),
        sqm: f.number(&["sqm", "surface_area", "built_area"]),
        sqm_usable: f.number(&["sqm_usable", "usable_area"]),
        sqm_plot: f.number(&["sqm_plot", "plot_area"]),
        rooms: f.integer(&["rooms", "bedrooms"]),
        bathrooms: f.integer(&["bathrooms"]),
        construction_year: f.integer(&["construction_year", "year_built"]),
        has_garage: f.flag(&["has_garage", "garage"]),
        has_storage_room: f.flag(&["has_storage_room", "storage_room"]),
        has_elevator: f.flag(&["has_elevator", "elevator"]),
        energy_rating: f.text(&["energy_rating"]),

        price_approx: f.number(&["price_approx", "price"]),
        price_per_sqm: f.number(&["price_per_sqm"]),
        appraisal_value: f.number(&["appraisal_value"]),
        market_value: f.number(&["market_value"]),
        auction_value: f.number(&["auction_value"]),
        auction_min_bid: f.number(&["auction_min_bid"]),
        auction_deposit: f.number(&["auction_deposit"]),
        reserve_price: f.number(&["reserve_price"]),
        total_debt: f.number(&["total_debt", "debt"]),
        principal_debt: f.number(&["principal_debt"]),
        interest_debt: f.number(&["interest_debt"]),
        legal_costs: f.number(&["legal_costs"]),
        annual_property_tax: f.number(&["annual_property_tax", "ibi"]),
        community_fees: f.number(&["community_fees"]),

        legal_phase: f.text(&["legal_phase"]),
        procedure_phase: f.text(&["procedure_phase"]),
        procedure_type: f.text(&["procedure_type"]),
        court: f.text(&["court"]),
        court_case_number: f.text(&["court_case_number"]),
        marketing_status: f.text(&["marketing_status"]),
        occupancy_status: f.text(&["occupancy_status"]),
        possession_status: f.text(&["possession_status"]),
        charges: f.text(&["charges"]),

        closing_date: f.date(&["closing_date"]),
        auction_date: f.date(&["auction_date"]),
        auction_end_date: f.date(&["auction_end_date"]),
        adjudication_date: f.date(&["adjudication_date"]),
        possession_date: f.date(&["possession_date"]),
        valuation_date: f.date(&["valuation_date"]),
        publication_date: f.date(&["publication_date"]),
        created_at: f.date(&["created_at"]),
        updated_at: f.date(&["updated_at"]),

        description: f.text(&["description"]),
        image_url: f.text(&["image_url"]),
        listing_url: f.text(&["listing_url", "url"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn map(v: Value) -> Asset {
        DocumentMapper::new().map_document(&v)
    }

    // --- shape detection ---

    #[test]
    fn plain_struct_data() {
        let a = map(json!({
            "id": "doc-1",
            "structData": {"province": "Madrid", "rooms": 3, "price_approx": 99000}
        }));
        assert_eq!(a.id, "doc-1");
        assert_eq!(a.province.as_deref(), Some("Madrid"));
        assert_eq!(a.rooms, Some(3));
        assert_eq!(a.price_approx, Some(99000.0));
    }

    #[test]
    fn tagged_struct_data() {
        let a = map(json!({
            "structData": {"fields": {
                "id": {"stringValue": "A-7"},
                "municipality": {"stringValue": "Alcalá de Henares"},
                "sqm": {"numberValue": 85.5},
                "bathrooms": {"stringValue": "2"},
                "has_garage": {"boolValue": true}
            }}
        }));
        assert_eq!(a.id, "A-7");
        assert_eq!(a.municipality.as_deref(), Some("Alcalá de Henares"));
        assert_eq!(a.sqm, Some(85.5));
        assert_eq!(a.bathrooms, Some(2));
        assert_eq!(a.has_garage, Some(true));
    }

    #[test]
    fn document_store_fields() {
        let a = map(json!({
            "name": "projects/p/databases/(default)/documents/assets/xyz-9",
            "fields": {
                "province": {"stringValue": "Toledo"},
                "rooms": {"integerValue": "4"},
                "auction_date": {"timestampValue": "2024-06-01T09:00:00Z"}
            }
        }));
        assert_eq!(a.id, "xyz-9");
        assert_eq!(a.province.as_deref(), Some("Toledo"));
        assert_eq!(a.rooms, Some(4));
        assert_eq!(a.auction_date, NaiveDate::from_ymd_opt(2024, 6, 1));
    }

    #[test]
    fn serialized_json_payload() {
        let payload = json!({"id": "s-1", "price_approx": "150000.50", "province": "Madrid"});
        let a = map(json!({"jsonData": payload.to_string()}));
        assert_eq!(a.id, "s-1");
        assert_eq!(a.price_approx, Some(150000.50));
        assert_eq!(a.province.as_deref(), Some("Madrid"));
    }

    #[test]
    fn locale_prices_keep_their_magnitude() {
        let a = map(json!({
            "structData": {"price_approx": "150.000", "total_debt": "1.250,75 €", "sqm": "85,5"}
        }));
        assert_eq!(a.price_approx, Some(150_000.0));
        assert_eq!(a.total_debt, Some(1250.75));
        assert_eq!(a.sqm, Some(85.5));
    }

    #[test]
    fn unparseable_payload_degrades_to_empty_record() {
        let a = map(json!({"id": "broken", "jsonData": "{not json"}));
        assert_eq!(a.id, "broken");
        assert_eq!(a.province, None);
    }

    #[test]
    fn no_marker_is_empty_record() {
        let a = map(json!({"province": "Madrid"}));
        assert_eq!(a.province, None);
        assert!(!a.id.is_empty());
    }

    #[test]
    fn non_object_input() {
        let a = map(json!("just a string"));
        assert!(!a.id.is_empty());
        assert_eq!(a.rooms, None);
    }

    // --- coercion through the mapper ---

    #[test]
    fn missing_rooms_is_none_not_zero() {
        let a = map(json!({"structData": {"province": "Madrid"}}));
        assert_eq!(a.rooms, None);
    }

    #[test]
    fn non_numeric_string_is_none() {
        let a = map(json!({"structData": {
            "price_approx": "consultar",
            "sqm": "n/a",
            "rooms": "varias",
            "construction_year": ""
        }}));
        assert_eq!(a.price_approx, None);
        assert_eq!(a.sqm, None);
        assert_eq!(a.rooms, None);
        assert_eq!(a.construction_year, None);
    }

    #[test]
    fn zero_is_a_real_value() {
        let a = map(json!({"structData": {"rooms": "0", "total_debt": 0}}));
        assert_eq!(a.rooms, Some(0));
        assert_eq!(a.total_debt, Some(0.0));
    }

    #[test]
    fn invalid_date_is_none() {
        let a = map(json!({"structData": {
            "closing_date": "31/02/2024",
            "auction_date": "15/03/2024"
        }}));
        assert_eq!(a.closing_date, None);
        assert_eq!(a.auction_date, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn aliases_and_nulls() {
        let a = map(json!({"structData": {
            "price_approx": null,
            "price": "95.000,00",
            "city": "Getafe"
        }}));
        assert_eq!(a.price_approx, Some(95000.0));
        assert_eq!(a.municipality.as_deref(), Some("Getafe"));
    }

    #[test]
    fn coordinates_from_geo_point() {
        let a = map(json!({"fields": {
            "location": {"geoPointValue": {"latitude": 40.4, "longitude": -3.7}}
        }}));
        assert_eq!(a.latitude, Some(40.4));
        assert_eq!(a.longitude, Some(-3.7));
    }

    // --- identifier backfill ---

    #[test]
    fn missing_id_gets_unique_uuid() {
        let a = map(json!({"structData": {}}));
        let b = map(json!({"structData": {}}));
        assert!(uuid::Uuid::parse_str(&a.id).is_ok());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn numeric_id_is_rendered() {
        let a = map(json!({"structData": {"id": 1234}}));
        assert_eq!(a.id, "1234");
    }

    #[test]
    fn map_all_preserves_order() {
        let docs = vec![
            json!({"id": "1", "structData": {}}),
            json!({"id": "2", "structData": {}}),
        ];
        let ids: Vec<_> = DocumentMapper::new()
            .map_all(&docs)
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
