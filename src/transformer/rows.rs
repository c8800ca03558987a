//! Per-table row structs produced by `transform()` (spec.md §3, §4.2).
//!
//! Shape grounded on the teacher's `loggers/names.rs` `Record` struct: one
//! plain struct per destination table, deriving `serde::Serialize` so the
//! writer can hand rows straight to a `csv::Writer` without an intermediate
//! mapping step.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::writer::csv::{serialize_bool_flag, serialize_opt_date, serialize_opt_decimal, serialize_opt_string};

#[derive(Debug, Clone, Serialize)]
pub struct RawDocumentRow {
    pub document_id: Uuid,
    pub set_id: Uuid,
    pub version_number: i32,
    pub source_filename: String,
    pub raw_payload: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductRow {
    pub document_id: Uuid,
    pub set_id: Uuid,
    pub version_number: i32,
    pub effective_time: NaiveDate,
    #[serde(serialize_with = "serialize_opt_string")]
    pub product_name: Option<String>,
    #[serde(serialize_with = "serialize_opt_string")]
    pub manufacturer_name: Option<String>,
    #[serde(serialize_with = "serialize_opt_string")]
    pub dosage_form: Option<String>,
    #[serde(serialize_with = "serialize_opt_string")]
    pub route_of_administration: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductNdcRow {
    pub document_id: Uuid,
    pub ndc_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngredientRow {
    pub document_id: Uuid,
    #[serde(serialize_with = "serialize_opt_string")]
    pub name: Option<String>,
    #[serde(serialize_with = "serialize_opt_string")]
    pub substance_code: Option<String>,
    #[serde(serialize_with = "serialize_opt_decimal")]
    pub strength_numerator: Option<BigDecimal>,
    #[serde(serialize_with = "serialize_opt_decimal")]
    pub strength_denominator: Option<BigDecimal>,
    #[serde(serialize_with = "serialize_opt_string")]
    pub unit_of_measure: Option<String>,
    #[serde(serialize_with = "serialize_bool_flag")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackagingRow {
    pub document_id: Uuid,
    #[serde(serialize_with = "serialize_opt_string")]
    pub package_ndc: Option<String>,
    #[serde(serialize_with = "serialize_opt_string")]
    pub package_description: Option<String>,
    #[serde(serialize_with = "serialize_opt_string")]
    pub package_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketingStatusRow {
    pub document_id: Uuid,
    #[serde(serialize_with = "serialize_opt_string")]
    pub marketing_category: Option<String>,
    #[serde(serialize_with = "serialize_opt_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(serialize_with = "serialize_opt_date")]
    pub end_date: Option<NaiveDate>,
}

/// One logical unit of output: the set of rows derived from a single
/// `ParsedDocument`, grouped by destination table. The writer flushes these
/// in batches; the loader never sees a `ParsedDocument` directly.
#[derive(Debug, Clone, Default)]
pub struct RowBatch {
    pub raw_documents: Vec<RawDocumentRow>,
    pub products: Vec<ProductRow>,
    pub product_ndcs: Vec<ProductNdcRow>,
    pub ingredients: Vec<IngredientRow>,
    pub packaging: Vec<PackagingRow>,
    pub marketing_status: Vec<MarketingStatusRow>,
}

impl RowBatch {
    pub fn is_empty(&self) -> bool {
        self.raw_documents.is_empty()
            && self.products.is_empty()
            && self.product_ndcs.is_empty()
            && self.ingredients.is_empty()
            && self.packaging.is_empty()
            && self.marketing_status.is_empty()
    }

    pub fn merge(&mut self, other: RowBatch) {
        self.raw_documents.extend(other.raw_documents);
        self.products.extend(other.products);
        self.product_ndcs.extend(other.product_ndcs);
        self.ingredients.extend(other.ingredients);
        self.packaging.extend(other.packaging);
        self.marketing_status.extend(other.marketing_status);
    }
}
