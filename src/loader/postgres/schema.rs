//! Diesel `table!` definitions for the warehouse's relational model
//! (spec.md §3). Hand-written rather than generated by `diesel print-schema`
//! since this crate ships its own DDL (see `ddl.rs`) instead of migrating
//! against a live database during development.

diesel::table! {
    spl_raw_documents (document_id) {
        document_id -> Uuid,
        set_id -> Uuid,
        version_number -> Integer,
        source_filename -> Text,
        raw_payload -> Jsonb,
        loaded_at -> Timestamptz,
    }
}

diesel::table! {
    products (document_id) {
        document_id -> Uuid,
        set_id -> Uuid,
        version_number -> Integer,
        effective_time -> Date,
        product_name -> Nullable<Text>,
        manufacturer_name -> Nullable<Text>,
        dosage_form -> Nullable<Text>,
        route_of_administration -> Nullable<Text>,
        is_latest_version -> Bool,
        loaded_at -> Timestamptz,
    }
}

diesel::table! {
    product_ndcs (document_id, ndc_code) {
        document_id -> Uuid,
        ndc_code -> Text,
    }
}

diesel::table! {
    ingredients (id) {
        id -> Int8,
        document_id -> Uuid,
        name -> Nullable<Text>,
        substance_code -> Nullable<Text>,
        strength_numerator -> Nullable<Numeric>,
        strength_denominator -> Nullable<Numeric>,
        unit_of_measure -> Nullable<Text>,
        is_active -> Bool,
    }
}

diesel::table! {
    packaging (id) {
        id -> Int8,
        document_id -> Uuid,
        package_ndc -> Nullable<Text>,
        package_description -> Nullable<Text>,
        package_type -> Nullable<Text>,
    }
}

diesel::table! {
    marketing_status (id) {
        id -> Int8,
        document_id -> Uuid,
        marketing_category -> Nullable<Text>,
        start_date -> Nullable<Date>,
        end_date -> Nullable<Date>,
    }
}

diesel::table! {
    etl_load_history (run_id) {
        run_id -> Uuid,
        mode -> Text,
        status -> Text,
        started_at -> Timestamptz,
        finished_at -> Nullable<Timestamptz>,
        error_log -> Nullable<Text>,
    }
}

diesel::table! {
    etl_processed_archives (archive_name) {
        archive_name -> Text,
        checksum -> Text,
        run_id -> Uuid,
        document_count -> Int8,
        processed_at -> Timestamptz,
    }
}

diesel::table! {
    staging_spl_raw_documents (document_id) {
        document_id -> Uuid,
        set_id -> Uuid,
        version_number -> Integer,
        source_filename -> Text,
        raw_payload -> Jsonb,
    }
}

diesel::table! {
    staging_products (document_id) {
        document_id -> Uuid,
        set_id -> Uuid,
        version_number -> Integer,
        effective_time -> Date,
        product_name -> Nullable<Text>,
        manufacturer_name -> Nullable<Text>,
        dosage_form -> Nullable<Text>,
        route_of_administration -> Nullable<Text>,
    }
}

diesel::table! {
    staging_product_ndcs (document_id, ndc_code) {
        document_id -> Uuid,
        ndc_code -> Text,
    }
}

diesel::table! {
    staging_ingredients (document_id) {
        document_id -> Uuid,
        name -> Nullable<Text>,
        substance_code -> Nullable<Text>,
        strength_numerator -> Nullable<Numeric>,
        strength_denominator -> Nullable<Numeric>,
        unit_of_measure -> Nullable<Text>,
        is_active -> Bool,
    }
}

diesel::table! {
    staging_packaging (document_id) {
        document_id -> Uuid,
        package_ndc -> Nullable<Text>,
        package_description -> Nullable<Text>,
        package_type -> Nullable<Text>,
    }
}

diesel::table! {
    staging_marketing_status (document_id) {
        document_id -> Uuid,
        marketing_category -> Nullable<Text>,
        start_date -> Nullable<Date>,
        end_date -> Nullable<Date>,
    }
}

diesel::joinable!(product_ndcs -> products (document_id));
diesel::joinable!(ingredients -> products (document_id));
diesel::joinable!(packaging -> products (document_id));
diesel::joinable!(marketing_status -> products (document_id));

diesel::allow_tables_to_appear_in_same_query!(
    spl_raw_documents,
    products,
    product_ndcs,
    ingredients,
    packaging,
    marketing_status,
    etl_load_history,
    etl_processed_archives,
);
