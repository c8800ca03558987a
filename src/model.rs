//! The in-memory record produced by the parser and consumed by the
//! transformer. See spec §3 "Logical entities".

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

/// A single SPL document, parsed from one XML file. Short-lived: it exists
/// only between parser emission and transformer consumption and must not be
/// retained across a batch flush (spec §3 "Lifecycles").
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub document_id: Uuid,
    pub set_id: Uuid,
    pub version_number: i32,
    pub effective_time: NaiveDate,

    pub product_name: Option<String>,
    pub manufacturer_name: Option<String>,
    pub dosage_form: Option<String>,
    pub route_of_administration: Option<String>,

    pub ndcs: Vec<String>,
    pub ingredients: Vec<Ingredient>,
    pub packaging: Vec<Packaging>,
    pub marketing_status: Vec<MarketingStatus>,

    /// Canonical JSON representation of the source XML tree (spec §4.1
    /// "raw_payload"). Built by `parser::json` as the event stream is read,
    /// never as an intermediate DOM.
    pub raw_payload: Value,

    /// Archive-relative path the document was read from, e.g.
    /// `prescription/20230101/ABCD1234.xml`.
    pub source_filename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ingredient {
    pub name: Option<String>,
    pub substance_code: Option<String>,
    pub strength_numerator: Option<BigDecimal>,
    pub strength_denominator: Option<BigDecimal>,
    pub unit_of_measure: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packaging {
    pub package_ndc: Option<String>,
    pub package_description: Option<String>,
    pub package_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketingStatus {
    pub marketing_category: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Trims a possibly-empty string per spec §4.1 "Data cleaning": all
/// extracted strings are whitespace-trimmed and empty strings become null.
pub fn clean(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_trims_and_nulls_empty() {
        assert_eq!(clean("  Tablet \n".to_string()), Some("Tablet".to_string()));
        assert_eq!(clean("   ".to_string()), None);
        assert_eq!(clean(String::new()), None);
    }
}
