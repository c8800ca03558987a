//! Idempotent schema creation for `PostgresLoader::initialize_schema`.
//! Every statement is `CREATE ... IF NOT EXISTS` so a second run against an
//! already-initialized warehouse is a no-op, matching the teacher's habit
//! (`database.rs`) of treating schema setup as safe to call unconditionally.

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS spl_raw_documents (
    document_id    UUID PRIMARY KEY,
    set_id         UUID NOT NULL,
    version_number INTEGER NOT NULL,
    source_filename TEXT NOT NULL,
    raw_payload    JSONB NOT NULL,
    loaded_at      TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    document_id    UUID PRIMARY KEY,
    set_id         UUID NOT NULL,
    version_number INTEGER NOT NULL,
    effective_time DATE NOT NULL,
    product_name   TEXT,
    manufacturer_name TEXT,
    dosage_form    TEXT,
    route_of_administration TEXT,
    is_latest_version BOOLEAN NOT NULL DEFAULT false,
    loaded_at      TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS product_ndcs (
    document_id UUID NOT NULL REFERENCES products(document_id),
    ndc_code    TEXT NOT NULL,
    PRIMARY KEY (document_id, ndc_code)
);

CREATE TABLE IF NOT EXISTS ingredients (
    id              BIGSERIAL PRIMARY KEY,
    document_id     UUID NOT NULL REFERENCES products(document_id),
    name            TEXT,
    substance_code  TEXT,
    strength_numerator   NUMERIC,
    strength_denominator NUMERIC,
    unit_of_measure TEXT,
    is_active       BOOLEAN NOT NULL DEFAULT true
);

CREATE TABLE IF NOT EXISTS packaging (
    id                  BIGSERIAL PRIMARY KEY,
    document_id         UUID NOT NULL REFERENCES products(document_id),
    package_ndc         TEXT,
    package_description TEXT,
    package_type        TEXT
);

CREATE TABLE IF NOT EXISTS marketing_status (
    id                 BIGSERIAL PRIMARY KEY,
    document_id        UUID NOT NULL REFERENCES products(document_id),
    marketing_category TEXT,
    start_date         DATE,
    end_date           DATE
);

CREATE TABLE IF NOT EXISTS etl_load_history (
    run_id      UUID PRIMARY KEY,
    mode        TEXT NOT NULL,
    status      TEXT NOT NULL,
    started_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    finished_at TIMESTAMPTZ,
    error_log   TEXT
);

CREATE TABLE IF NOT EXISTS etl_processed_archives (
    archive_name    TEXT PRIMARY KEY,
    checksum        TEXT NOT NULL,
    run_id          UUID NOT NULL REFERENCES etl_load_history(run_id),
    document_count  BIGINT NOT NULL,
    processed_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_products_set_id ON products(set_id);
CREATE INDEX IF NOT EXISTS idx_ingredients_document_id ON ingredients(document_id);
CREATE INDEX IF NOT EXISTS idx_packaging_document_id ON packaging(document_id);
CREATE INDEX IF NOT EXISTS idx_marketing_status_document_id ON marketing_status(document_id);
"#;

/// Staging tables carry exactly the columns the writer emits into CSV
/// (`transformer/rows.rs`) and the `schema.rs` `table!` declarations name —
/// no constraints, no surrogate `id`, and no `is_latest_version`/`loaded_at`
/// (those are computed or stamped only at merge time, spec.md §4.4). A
/// bare `LIKE production INCLUDING DEFAULTS` would drag those production-only
/// columns along and desync the staging table's column count from the CSV
/// chunk files' field count, breaking `COPY`.
pub const CREATE_STAGING_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS staging_spl_raw_documents (
    document_id    UUID NOT NULL,
    set_id         UUID NOT NULL,
    version_number INTEGER NOT NULL,
    source_filename TEXT NOT NULL,
    raw_payload    JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS staging_products (
    document_id    UUID NOT NULL,
    set_id         UUID NOT NULL,
    version_number INTEGER NOT NULL,
    effective_time DATE NOT NULL,
    product_name   TEXT,
    manufacturer_name TEXT,
    dosage_form    TEXT,
    route_of_administration TEXT
);

CREATE TABLE IF NOT EXISTS staging_product_ndcs (
    document_id UUID NOT NULL,
    ndc_code    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS staging_ingredients (
    document_id     UUID NOT NULL,
    name            TEXT,
    substance_code  TEXT,
    strength_numerator   NUMERIC,
    strength_denominator NUMERIC,
    unit_of_measure TEXT,
    is_active       BOOLEAN NOT NULL
);

CREATE TABLE IF NOT EXISTS staging_packaging (
    document_id         UUID NOT NULL,
    package_ndc         TEXT,
    package_description TEXT,
    package_type        TEXT
);

CREATE TABLE IF NOT EXISTS staging_marketing_status (
    document_id        UUID NOT NULL,
    marketing_category  TEXT,
    start_date         DATE,
    end_date           DATE
);
"#;

pub const TRUNCATE_STAGING_TABLES: &str = r#"
TRUNCATE staging_spl_raw_documents, staging_products, staging_product_ndcs,
         staging_ingredients, staging_packaging, staging_marketing_status;
"#;

/// Drops all non-primary-key indexes ahead of a full load
/// (SPEC_FULL.md §C.6); `post_load_cleanup` recreates them from
/// `ddl::CREATE_TABLES`.
pub const DROP_SECONDARY_INDEXES: &str = r#"
DROP INDEX IF EXISTS idx_products_set_id;
DROP INDEX IF EXISTS idx_ingredients_document_id;
DROP INDEX IF EXISTS idx_packaging_document_id;
DROP INDEX IF EXISTS idx_marketing_status_document_id;
"#;

pub fn disable_triggers(table: &str) -> String {
    format!("ALTER TABLE {table} DISABLE TRIGGER ALL;")
}

pub fn enable_triggers(table: &str) -> String {
    format!("ALTER TABLE {table} ENABLE TRIGGER ALL;")
}

pub const DEPENDENT_TABLES: &[&str] =
    &["product_ndcs", "ingredients", "packaging", "marketing_status"];

/// Staleness check used by `start_run`'s crash-recovery step
/// (SPEC_FULL.md §C.1): any row in `RUNNING` status older than the
/// threshold is a crashed run.
pub const MARK_STALE_RUNS_FAILED: &str = r#"
UPDATE etl_load_history
SET status = 'FAILED', error_log = 'crashed', finished_at = now()
WHERE status = 'RUNNING' AND started_at < $1;
"#;

/// Recomputes `is_latest_version` for every `set_id` in one set-based
/// statement (spec.md §9 "never row-by-row"). The winner within a `set_id`
/// is the row with the greatest `version_number`, ties broken by the latest
/// `effective_time`, ties broken by the lexicographically greatest
/// `document_id` (spec.md §3 invariant 2).
pub const RECOMPUTE_LATEST_VERSION: &str = r#"
UPDATE products p
SET is_latest_version = (p.document_id = winner.document_id)
FROM (
    SELECT DISTINCT ON (set_id) set_id, document_id
    FROM products
    ORDER BY set_id, version_number DESC, effective_time DESC, document_id DESC
) AS winner
WHERE p.set_id = winner.set_id;
"#;
