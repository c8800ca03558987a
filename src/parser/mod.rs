//! Streaming SPL XML parser (spec.md §4.1).
//!
//! Reads one document at a time with a bounded `quick_xml::NsReader` buffer —
//! never the whole file as a DOM — and emits a single `ParsedDocument` per
//! call to `parse_document`. The event-loop shape (`start_eq`/
//! `parse_attribute` helpers, a `Reader` driven by `read_event_into` into a
//! reused buffer) is the teacher's `readers/plazi/document.rs` idiom, carried
//! over from Plazi's custom dialect to the HL7 SPL v3 namespace; the
//! namespace resolution itself (spec.md §4.1 "recognized by URI, not by
//! prefix") has no teacher analogue, since Plazi's dialect is unprefixed, so
//! it's built directly on `quick_xml::NsReader::read_resolved_event_into`.

mod json;

use std::io::BufRead;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use uuid::Uuid;

use crate::errors::ParseError;
use crate::model::{clean, Ingredient, MarketingStatus, Packaging, ParsedDocument};

/// HL7 SPL v3 XML namespace URI. Elements outside this namespace are still
/// walked (so the JSON payload stays a faithful mirror of the source tree)
/// but are never matched for field extraction, regardless of what local
/// name or prefix they carry.
const SPL_NAMESPACE: &str = "urn:hl7-org:v3";

/// NDC code system OID used to disambiguate `<code codeSystem="...">`
/// elements that carry an NDC from those carrying some other coded value.
const NDC_CODE_SYSTEM: &str = "2.16.840.1.113883.6.69";

/// Parses one SPL XML document from a buffered reader, returning the fully
/// populated record plus its canonical JSON payload. `source_filename` is
/// the archive-relative path recorded for provenance and quarantine
/// reporting; it plays no role in extraction.
pub fn parse_document<R: BufRead>(source: R, source_filename: &str) -> Result<ParsedDocument, ParseError> {
    let mut reader = NsReader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut builder = json::JsonBuilder::new();
    let mut state = ExtractState::default();
    let mut path: Vec<String> = Vec::new();
    // Parallel to `path`: whether each open element resolved into the SPL
    // namespace, so `on_end` (fired unconditionally to keep push/pop
    // balanced) only mutates extraction state for elements `on_start` also
    // saw.
    let mut in_spl: Vec<bool> = Vec::new();

    loop {
        let (ns, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| malformed(source_filename, e.to_string()))?;

        match &event {
            Event::Start(start) => {
                let uri = resolved_uri(ns);
                let is_spl = uri.as_deref() == Some(SPL_NAMESPACE);
                builder
                    .handle_start(start, uri)
                    .map_err(|e| malformed(source_filename, e.to_string()))?;
                path.push(local_name(start));
                in_spl.push(is_spl);
                if is_spl {
                    state.on_start(&path, start)?;
                }
            }
            Event::Empty(start) => {
                let uri = resolved_uri(ns);
                let is_spl = uri.as_deref() == Some(SPL_NAMESPACE);
                builder
                    .handle_start(start, uri)
                    .map_err(|e| malformed(source_filename, e.to_string()))?;
                path.push(local_name(start));
                if is_spl {
                    state.on_start(&path, start)?;
                    state.on_end(&path);
                }
                builder.handle_end();
                path.pop();
            }
            Event::Text(text) => {
                let unescaped = text.unescape().map_err(|e| malformed(source_filename, e.to_string()))?;
                builder.handle_text(&unescaped);
                if in_spl.last().copied().unwrap_or(false) {
                    state.on_text(&path, &unescaped);
                }
            }
            Event::End(_) => {
                if in_spl.pop().unwrap_or(false) {
                    state.on_end(&path);
                }
                builder.handle_end();
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let raw_payload = builder.finish();
    state.into_document(source_filename, raw_payload)
}

fn malformed(path: &str, detail: String) -> ParseError {
    ParseError::MalformedDocument { path: path.to_string(), detail }
}

fn resolved_uri(ns: ResolveResult) -> Option<String> {
    match ns {
        ResolveResult::Bound(namespace) => Some(String::from_utf8_lossy(namespace.as_ref()).into_owned()),
        ResolveResult::Unbound | ResolveResult::Unknown(_) => None,
    }
}

fn local_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.name().local_name().as_ref()).into_owned()
}

fn attr(start: &BytesStart, name: &str) -> Result<Option<String>, ParseError> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| ParseError::InvalidValue(e.to_string()))?;
        if attribute.key.as_ref() == name.as_bytes() {
            let value = attribute
                .unescape_value()
                .map_err(|e| ParseError::InvalidValue(e.to_string()))?
                .into_owned();
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn parse_hl7_date(raw: &str) -> Result<NaiveDate, ParseError> {
    // HL7 TS values are `CCYYMMDD[HHMM[SS]]`, but truncated precision is
    // common: `CCYYMM` (day defaults to the 1st) and bare `CCYYYY` (month
    // and day default to January 1st) both appear in the wild (spec.md §4.1
    // "permit YYYYMM -> first of month; YYYY -> Jan 1").
    let invalid = || ParseError::InvalidValue(format!("invalid date value: {raw}"));
    match raw.len() {
        0..=3 => Err(ParseError::InvalidValue(format!("date value too short: {raw}"))),
        4 => {
            let year: i32 = raw.parse().map_err(|_| invalid())?;
            NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)
        }
        5..=6 => {
            let year: i32 = raw[0..4].parse().map_err(|_| invalid())?;
            let month: u32 = raw[4..6].parse().map_err(|_| invalid())?;
            NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)
        }
        _ => NaiveDate::parse_from_str(&raw[0..8], "%Y%m%d").map_err(ParseError::from),
    }
}

/// Accumulates extraction state across the event stream. A document is a
/// flat-ish tree, but ingredients/packaging/marketing statuses each live
/// inside their own repeated section, so we track "am I currently inside an
/// `<ingredient>`/`<containerPackagedProduct>`/`<marketingAct>` block" by
/// path suffix rather than by a DOM lookup.
#[derive(Default)]
struct ExtractState {
    document_id: Option<Uuid>,
    set_id: Option<Uuid>,
    version_number: Option<i32>,
    effective_time: Option<NaiveDate>,

    product_name: Option<String>,
    manufacturer_name: Option<String>,
    dosage_form: Option<String>,
    route_of_administration: Option<String>,

    ndcs: Vec<String>,
    ingredients: Vec<Ingredient>,
    packaging: Vec<Packaging>,
    marketing_status: Vec<MarketingStatus>,

    current_ingredient: Option<Ingredient>,
    // Stack, not a single slot: `containerPackagedProduct` elements nest
    // (case > carton > bottle) and spec.md §4.1 flattens them depth-first,
    // one row per level.
    packaging_stack: Vec<Packaging>,
    current_marketing: Option<MarketingStatus>,
    in_manufacturer_org: bool,
}

impl ExtractState {
    fn on_start(&mut self, path: &[String], start: &BytesStart) -> Result<(), ParseError> {
        match path.last().map(String::as_str) {
            Some("id") => self.handle_id(path, start)?,
            Some("effectiveTime") if path_is(path, &["document", "effectiveTime"]) => {
                if let Some(value) = attr(start, "value")? {
                    self.effective_time = Some(parse_hl7_date(&value)?);
                }
            }
            Some("versionNumber") if path_is(path, &["document", "versionNumber"]) => {
                if let Some(value) = attr(start, "value")? {
                    self.version_number = Some(
                        value
                            .parse::<i32>()
                            .map_err(ParseError::from)?,
                    );
                }
            }
            Some("name") if path_ends_with(path, &["manufacturedProduct", "name"]) => {
                // captured on text; nothing to do from attributes
            }
            Some("formCode") if self.packaging_stack.is_empty() => {
                if let Some(display) = attr(start, "displayName")? {
                    self.dosage_form = clean(display);
                }
            }
            Some("routeCode") => {
                if let Some(display) = attr(start, "displayName")? {
                    // collapsed to the first distinct value if multiple (spec.md §4.1)
                    if self.route_of_administration.is_none() {
                        self.route_of_administration = clean(display);
                    }
                }
            }
            Some("code") => self.handle_code(path, start)?,
            Some("representedOrganization") => self.in_manufacturer_org = true,
            Some("ingredient") | Some("activeIngredient") | Some("inactiveIngredient") => {
                self.current_ingredient = Some(Ingredient {
                    name: None,
                    substance_code: None,
                    strength_numerator: None,
                    strength_denominator: None,
                    unit_of_measure: None,
                    is_active: path.last().map(String::as_str) != Some("inactiveIngredient"),
                });
            }
            Some("quantity") if self.current_ingredient.is_some() => {
                // numerator/denominator are nested <numerator>/<denominator>; handled there
            }
            Some("numerator") => {
                if let Some(ingredient) = self.current_ingredient.as_mut() {
                    if let Some(value) = attr(start, "value")? {
                        ingredient.strength_numerator = parse_decimal(&value)?;
                    }
                    if let Some(unit) = attr(start, "unit")? {
                        ingredient.unit_of_measure = clean(unit);
                    }
                }
            }
            Some("denominator") => {
                if let Some(ingredient) = self.current_ingredient.as_mut() {
                    if let Some(value) = attr(start, "value")? {
                        ingredient.strength_denominator = parse_decimal(&value)?;
                    }
                }
            }
            Some("containerPackagedProduct") => {
                self.packaging_stack.push(Packaging {
                    package_ndc: None,
                    package_description: None,
                    package_type: None,
                });
            }
            Some("formCode") if !self.packaging_stack.is_empty() => {
                if let Some(display) = attr(start, "displayName")? {
                    if let Some(pkg) = self.packaging_stack.last_mut() {
                        pkg.package_type = clean(display);
                    }
                }
            }
            Some("marketingAct") => {
                self.current_marketing = Some(MarketingStatus {
                    marketing_category: None,
                    start_date: None,
                    end_date: None,
                });
            }
            Some("statusCode") if self.current_marketing.is_some() => {
                if let Some(code) = attr(start, "code")? {
                    if let Some(m) = self.current_marketing.as_mut() {
                        m.marketing_category = clean(code);
                    }
                }
            }
            Some("low") if self.current_marketing.is_some() => {
                if let Some(value) = attr(start, "value")? {
                    if let Some(m) = self.current_marketing.as_mut() {
                        m.start_date = Some(parse_hl7_date(&value)?);
                    }
                }
            }
            Some("high") if self.current_marketing.is_some() => {
                if let Some(value) = attr(start, "value")? {
                    if let Some(m) = self.current_marketing.as_mut() {
                        m.end_date = Some(parse_hl7_date(&value)?);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_id(&mut self, path: &[String], start: &BytesStart) -> Result<(), ParseError> {
        let root = attr(start, "root")?;
        let extension = attr(start, "extension")?;

        if path_is(path, &["document", "id"]) {
            if let Some(root) = root {
                self.document_id = Some(parse_uuid(&root)?);
            }
        } else if path_is(path, &["document", "setId"]) || path.last().map(String::as_str) == Some("setId") {
            if let Some(root) = root {
                self.set_id = Some(parse_uuid(&root)?);
            }
        } else if path_ends_with(path, &["manufacturedProduct", "code"]) {
            // some producers encode NDC as a product-level code id, not code
            if let Some(extension) = extension {
                self.ndcs.push(extension);
            }
        }
        Ok(())
    }

    fn handle_code(&mut self, path: &[String], start: &BytesStart) -> Result<(), ParseError> {
        let code = attr(start, "code")?;
        let code_system = attr(start, "codeSystem")?;
        let display_name = attr(start, "displayName")?;

        if path_ends_with(path, &["containerPackagedProduct", "code"]) {
            if let (Some(code), Some(pkg)) = (code.clone(), self.packaging_stack.last_mut()) {
                pkg.package_ndc = Some(code);
            }
            return Ok(());
        }

        if code_system.as_deref() == Some(NDC_CODE_SYSTEM) {
            if let Some(code) = code.clone() {
                self.ndcs.push(code);
            }
        }

        if let Some(ingredient) = self.current_ingredient.as_mut() {
            if path_ends_with(path, &["ingredientSubstance", "code"]) {
                ingredient.substance_code = code;
                return Ok(());
            }
        }

        if self.in_manufacturer_org {
            // organization identifiers aren't modeled as a code field; ignore
        }

        let _ = display_name;
        Ok(())
    }

    fn on_text(&mut self, path: &[String], text: &str) {
        if path_ends_with(path, &["manufacturedProduct", "name"]) {
            // first `manufacturedProduct/name` text wins (spec.md §4.1), the
            // same first-occurrence rule `routeCode` above applies.
            if self.product_name.is_none() {
                self.product_name = clean(text.to_string());
            }
        } else if self.in_manufacturer_org && path_ends_with(path, &["representedOrganization", "name"]) {
            if self.manufacturer_name.is_none() {
                self.manufacturer_name = clean(text.to_string());
            }
        } else if let Some(ingredient) = self.current_ingredient.as_mut() {
            if path_ends_with(path, &["ingredientSubstance", "name"]) {
                ingredient.name = clean(text.to_string()).or(ingredient.name.take());
            }
        } else if path_ends_with(path, &["containerPackagedProduct", "name"]) {
            if let Some(pkg) = self.packaging_stack.last_mut() {
                pkg.package_description = clean(text.to_string()).or(pkg.package_description.take());
            }
        }
    }

    fn on_end(&mut self, path: &[String]) {
        match path.last().map(String::as_str) {
            Some("ingredient") | Some("activeIngredient") | Some("inactiveIngredient") => {
                if let Some(ingredient) = self.current_ingredient.take() {
                    self.ingredients.push(ingredient);
                }
            }
            Some("containerPackagedProduct") => {
                if let Some(pkg) = self.packaging_stack.pop() {
                    self.packaging.push(pkg);
                }
            }
            Some("marketingAct") => {
                if let Some(m) = self.current_marketing.take() {
                    self.marketing_status.push(m);
                }
            }
            Some("representedOrganization") => self.in_manufacturer_org = false,
            _ => {}
        }
    }

    fn into_document(
        self,
        source_filename: &str,
        raw_payload: serde_json::Value,
    ) -> Result<ParsedDocument, ParseError> {
        let document_id = self
            .document_id
            .ok_or_else(|| ParseError::NotFound("document/id[@root]".to_string()))?;
        let set_id = self
            .set_id
            .ok_or_else(|| ParseError::NotFound("document/setId[@root]".to_string()))?;
        let effective_time = self
            .effective_time
            .ok_or_else(|| ParseError::NotFound("document/effectiveTime[@value]".to_string()))?;
        let version_number = self
            .version_number
            .ok_or_else(|| ParseError::NotFound("document/versionNumber[@value]".to_string()))?;
        if version_number <= 0 {
            return Err(ParseError::InvalidValue(format!(
                "versionNumber must be positive, got {version_number}"
            )));
        }

        // Distinct by exact string match, preserving first-seen order
        // (spec.md §4.1 "ndcs"): a plain sort+dedup would reorder them
        // alphabetically instead.
        let mut seen_ndcs = std::collections::HashSet::new();
        let ndcs: Vec<String> = self.ndcs.into_iter().filter(|ndc| seen_ndcs.insert(ndc.clone())).collect();

        Ok(ParsedDocument {
            document_id,
            set_id,
            version_number,
            effective_time,
            product_name: self.product_name,
            manufacturer_name: self.manufacturer_name,
            dosage_form: self.dosage_form,
            route_of_administration: self.route_of_administration,
            ndcs,
            ingredients: self.ingredients,
            packaging: self.packaging,
            marketing_status: self.marketing_status,
            raw_payload,
            source_filename: source_filename.to_string(),
        })
    }
}

fn parse_uuid(root: &str) -> Result<Uuid, ParseError> {
    Uuid::parse_str(root).map_err(|e| ParseError::InvalidValue(format!("invalid UUID '{root}': {e}")))
}

fn parse_decimal(raw: &str) -> Result<Option<BigDecimal>, ParseError> {
    use std::str::FromStr;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    BigDecimal::from_str(raw)
        .map(Some)
        .map_err(|e| ParseError::InvalidValue(format!("invalid decimal '{raw}': {e}")))
}

fn path_is(path: &[String], suffix: &[&str]) -> bool {
    path_ends_with(path, suffix) && path.len() == suffix.len()
}

fn path_ends_with(path: &[String], suffix: &[&str]) -> bool {
    if path.len() < suffix.len() {
        return false;
    }
    path[path.len() - suffix.len()..]
        .iter()
        .zip(suffix.iter())
        .all(|(a, b)| a == b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<document xmlns="urn:hl7-org:v3">
  <id root="11111111-1111-1111-1111-111111111111"/>
  <setId root="22222222-2222-2222-2222-222222222222"/>
  <versionNumber value="3"/>
  <effectiveTime value="20230115"/>
  <manufacturedProduct>
    <manufacturedProduct>
      <code code="12345-678-90" codeSystem="2.16.840.1.113883.6.69"/>
      <name>Acetaminophen</name>
      <formCode code="C42998" displayName="TABLET"/>
      <routeCode code="C38288" displayName="ORAL"/>
      <ingredient classCode="ACTIB">
        <quantity>
          <numerator value="500" unit="mg"/>
          <denominator value="1" unit="1"/>
        </quantity>
        <ingredientSubstance>
          <code code="362O9ITL9D"/>
          <name>ACETAMINOPHEN</name>
        </ingredientSubstance>
      </ingredient>
      <asEntityWithPackaging>
        <containerPackagedProduct>
          <code code="12345-678-01"/>
          <name>BOTTLE, 100 TABLETS</name>
          <formCode code="C43169" displayName="BOTTLE"/>
        </containerPackagedProduct>
      </asEntityWithPackaging>
      <subjectOf>
        <marketingAct>
          <statusCode code="active"/>
          <effectiveTime>
            <low value="20230101"/>
          </effectiveTime>
        </marketingAct>
      </subjectOf>
      <manufacturerOrganization>
        <representedOrganization>
          <name>Acme Pharma Inc</name>
        </representedOrganization>
      </manufacturerOrganization>
    </manufacturedProduct>
  </manufacturedProduct>
</document>
"#;

    #[test]
    fn extracts_identity_and_effective_time() {
        let doc = parse_document(SAMPLE.as_bytes(), "sample.xml").unwrap();
        assert_eq!(doc.document_id.to_string(), "11111111-1111-1111-1111-111111111111");
        assert_eq!(doc.set_id.to_string(), "22222222-2222-2222-2222-222222222222");
        assert_eq!(doc.effective_time, NaiveDate::from_ymd_opt(2023, 1, 15).unwrap());
        assert_eq!(doc.version_number, 3);
    }

    #[test]
    fn missing_version_number_is_malformed() {
        let xml = r#"<document xmlns="urn:hl7-org:v3">
            <id root="11111111-1111-1111-1111-111111111111"/>
            <setId root="22222222-2222-2222-2222-222222222222"/>
            <effectiveTime value="20230101"/>
        </document>"#;
        let err = parse_document(xml.as_bytes(), "broken.xml").unwrap_err();
        assert!(matches!(err, ParseError::NotFound(_)));
    }

    #[test]
    fn non_positive_version_number_is_rejected() {
        let xml = r#"<document xmlns="urn:hl7-org:v3">
            <id root="11111111-1111-1111-1111-111111111111"/>
            <setId root="22222222-2222-2222-2222-222222222222"/>
            <versionNumber value="0"/>
            <effectiveTime value="20230101"/>
        </document>"#;
        let err = parse_document(xml.as_bytes(), "broken.xml").unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue(_)));
    }

    #[test]
    fn extracts_product_fields() {
        let doc = parse_document(SAMPLE.as_bytes(), "sample.xml").unwrap();
        assert_eq!(doc.product_name.as_deref(), Some("Acetaminophen"));
        assert_eq!(doc.dosage_form.as_deref(), Some("TABLET"));
        assert_eq!(doc.route_of_administration.as_deref(), Some("ORAL"));
        assert_eq!(doc.manufacturer_name.as_deref(), Some("Acme Pharma Inc"));
        assert!(doc.ndcs.contains(&"12345-678-90".to_string()));
    }

    #[test]
    fn extracts_ingredient_strength() {
        let doc = parse_document(SAMPLE.as_bytes(), "sample.xml").unwrap();
        assert_eq!(doc.ingredients.len(), 1);
        let ingredient = &doc.ingredients[0];
        assert_eq!(ingredient.name.as_deref(), Some("ACETAMINOPHEN"));
        assert_eq!(ingredient.substance_code.as_deref(), Some("362O9ITL9D"));
        assert!(ingredient.is_active);
        assert_eq!(ingredient.strength_numerator, parse_decimal("500").unwrap());
    }

    #[test]
    fn extracts_packaging_and_marketing_status() {
        let doc = parse_document(SAMPLE.as_bytes(), "sample.xml").unwrap();
        assert_eq!(doc.packaging.len(), 1);
        assert_eq!(doc.packaging[0].package_ndc.as_deref(), Some("12345-678-01"));
        assert_eq!(doc.marketing_status.len(), 1);
        assert_eq!(doc.marketing_status[0].marketing_category.as_deref(), Some("active"));
        assert_eq!(
            doc.marketing_status[0].start_date,
            Some(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
        );
    }

    #[test]
    fn flattens_nested_packaging_depth_first() {
        let xml = r#"<document xmlns="urn:hl7-org:v3">
            <id root="11111111-1111-1111-1111-111111111111"/>
            <setId root="22222222-2222-2222-2222-222222222222"/>
            <versionNumber value="1"/>
            <effectiveTime value="20230101"/>
            <manufacturedProduct>
              <manufacturedProduct>
                <asEntityWithPackaging>
                  <containerPackagedProduct>
                    <code code="OUTER-CASE"/>
                    <name>CASE OF 10 CARTONS</name>
                    <formCode code="C1" displayName="CASE"/>
                    <asEntityWithPackaging>
                      <containerPackagedProduct>
                        <code code="INNER-BOTTLE"/>
                        <name>BOTTLE, 100 TABLETS</name>
                        <formCode code="C2" displayName="BOTTLE"/>
                      </containerPackagedProduct>
                    </asEntityWithPackaging>
                  </containerPackagedProduct>
                </asEntityWithPackaging>
              </manufacturedProduct>
            </manufacturedProduct>
        </document>"#;
        let doc = parse_document(xml.as_bytes(), "nested.xml").unwrap();
        assert_eq!(doc.packaging.len(), 2);
        // innermost level closes (and is emitted) before its parent
        assert_eq!(doc.packaging[0].package_ndc.as_deref(), Some("INNER-BOTTLE"));
        assert_eq!(doc.packaging[0].package_type.as_deref(), Some("BOTTLE"));
        assert_eq!(doc.packaging[1].package_ndc.as_deref(), Some("OUTER-CASE"));
        assert_eq!(doc.packaging[1].package_type.as_deref(), Some("CASE"));
    }

    #[test]
    fn truncated_effective_time_precision_defaults_to_first_of_period() {
        assert_eq!(parse_hl7_date("2023").unwrap(), NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(parse_hl7_date("202305").unwrap(), NaiveDate::from_ymd_opt(2023, 5, 1).unwrap());
        assert_eq!(parse_hl7_date("20230517").unwrap(), NaiveDate::from_ymd_opt(2023, 5, 17).unwrap());
        assert_eq!(
            parse_hl7_date("202305171530").unwrap(),
            NaiveDate::from_ymd_opt(2023, 5, 17).unwrap()
        );
    }

    #[test]
    fn missing_document_id_is_malformed() {
        let xml = r#"<document xmlns="urn:hl7-org:v3"><effectiveTime value="20230101"/></document>"#;
        let err = parse_document(xml.as_bytes(), "broken.xml").unwrap_err();
        assert!(matches!(err, ParseError::NotFound(_)));
    }

    #[test]
    fn raw_payload_round_trips_root_tag_and_namespace() {
        let doc = parse_document(SAMPLE.as_bytes(), "sample.xml").unwrap();
        assert_eq!(doc.raw_payload["@name"], "document");
        assert_eq!(doc.raw_payload["@ns"], "urn:hl7-org:v3");
    }

    #[test]
    fn elements_outside_the_spl_namespace_are_ignored_for_extraction() {
        // A foreign-namespace wrapper around the same field-shaped elements:
        // the element order/names match but the values must not leak into
        // the parsed document.
        let xml = r#"<document xmlns="urn:hl7-org:v3">
            <id root="11111111-1111-1111-1111-111111111111"/>
            <setId root="22222222-2222-2222-2222-222222222222"/>
            <versionNumber value="1"/>
            <effectiveTime value="20230101"/>
            <foreign:wrapper xmlns:foreign="urn:example:not-spl">
                <foreign:formCode displayName="SHOULD_NOT_APPEAR"/>
            </foreign:wrapper>
        </document>"#;
        let doc = parse_document(xml.as_bytes(), "mixed-ns.xml").unwrap();
        assert_eq!(doc.dosage_form, None);
    }
}
