//! Transforms a `ParsedDocument` into per-table row batches (spec.md §4.2).
//!
//! A pure function with no I/O: the orchestrator calls `transform` once per
//! document emitted by the parser and appends the result onto a running
//! `RowBatch` until the writer's chunk threshold is reached. There is no
//! teacher counterpart for this exact split (the teacher fans parsed records
//! straight into its CRDT frame log), so the batch type itself is new, built
//! in the row-struct idiom of `loggers/names.rs`.

pub mod rows;

use serde_json::to_string;

use crate::errors::ParseError;
use crate::model::ParsedDocument;
use rows::{IngredientRow, MarketingStatusRow, PackagingRow, ProductNdcRow, ProductRow, RawDocumentRow, RowBatch};

pub fn transform(document: &ParsedDocument) -> Result<RowBatch, ParseError> {
    let mut batch = RowBatch::default();

    let raw_payload = to_string(&document.raw_payload)
        .map_err(|e| ParseError::InvalidValue(format!("raw_payload serialization failed: {e}")))?;

    batch.raw_documents.push(RawDocumentRow {
        document_id: document.document_id,
        set_id: document.set_id,
        version_number: document.version_number,
        source_filename: document.source_filename.clone(),
        raw_payload,
    });

    batch.products.push(ProductRow {
        document_id: document.document_id,
        set_id: document.set_id,
        version_number: document.version_number,
        effective_time: document.effective_time,
        product_name: document.product_name.clone(),
        manufacturer_name: document.manufacturer_name.clone(),
        dosage_form: document.dosage_form.clone(),
        route_of_administration: document.route_of_administration.clone(),
    });

    for ndc in &document.ndcs {
        batch.product_ndcs.push(ProductNdcRow { document_id: document.document_id, ndc_code: ndc.clone() });
    }

    for ingredient in &document.ingredients {
        batch.ingredients.push(IngredientRow {
            document_id: document.document_id,
            name: ingredient.name.clone(),
            substance_code: ingredient.substance_code.clone(),
            strength_numerator: ingredient.strength_numerator.clone(),
            strength_denominator: ingredient.strength_denominator.clone(),
            unit_of_measure: ingredient.unit_of_measure.clone(),
            is_active: ingredient.is_active,
        });
    }

    for package in &document.packaging {
        batch.packaging.push(PackagingRow {
            document_id: document.document_id,
            package_ndc: package.package_ndc.clone(),
            package_description: package.package_description.clone(),
            package_type: package.package_type.clone(),
        });
    }

    for status in &document.marketing_status {
        batch.marketing_status.push(MarketingStatusRow {
            document_id: document.document_id,
            marketing_category: status.marketing_category.clone(),
            start_date: status.start_date,
            end_date: status.end_date,
        });
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ingredient, MarketingStatus, Packaging};
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::str::FromStr;
    use uuid::Uuid;

    fn sample_document() -> ParsedDocument {
        ParsedDocument {
            document_id: Uuid::new_v4(),
            set_id: Uuid::new_v4(),
            version_number: 2,
            effective_time: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            product_name: Some("Acetaminophen".to_string()),
            manufacturer_name: Some("Acme Pharma".to_string()),
            dosage_form: Some("TABLET".to_string()),
            route_of_administration: Some("ORAL".to_string()),
            ndcs: vec!["12345-678-90".to_string()],
            ingredients: vec![Ingredient {
                name: Some("ACETAMINOPHEN".to_string()),
                substance_code: Some("362O9ITL9D".to_string()),
                strength_numerator: Some(BigDecimal::from_str("500").unwrap()),
                strength_denominator: Some(BigDecimal::from_str("1").unwrap()),
                unit_of_measure: Some("mg".to_string()),
                is_active: true,
            }],
            packaging: vec![Packaging {
                package_ndc: Some("12345-678-01".to_string()),
                package_description: Some("BOTTLE".to_string()),
                package_type: Some("BOTTLE".to_string()),
            }],
            marketing_status: vec![MarketingStatus {
                marketing_category: Some("active".to_string()),
                start_date: Some(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()),
                end_date: None,
            }],
            raw_payload: json!({"tag": "document"}),
            source_filename: "sample.xml".to_string(),
        }
    }

    #[test]
    fn produces_exactly_one_row_per_table_section() {
        let batch = transform(&sample_document()).unwrap();
        assert_eq!(batch.raw_documents.len(), 1);
        assert_eq!(batch.products.len(), 1);
        assert_eq!(batch.product_ndcs.len(), 1);
        assert_eq!(batch.ingredients.len(), 1);
        assert_eq!(batch.packaging.len(), 1);
        assert_eq!(batch.marketing_status.len(), 1);
    }

    #[test]
    fn carries_document_id_onto_every_child_row() {
        let document = sample_document();
        let batch = transform(&document).unwrap();
        assert_eq!(batch.products[0].document_id, document.document_id);
        assert_eq!(batch.ingredients[0].document_id, document.document_id);
        assert_eq!(batch.packaging[0].document_id, document.document_id);
        assert_eq!(batch.marketing_status[0].document_id, document.document_id);
        assert_eq!(batch.product_ndcs[0].document_id, document.document_id);
    }

    #[test]
    fn empty_batch_reports_empty() {
        assert!(RowBatch::default().is_empty());
    }
}
