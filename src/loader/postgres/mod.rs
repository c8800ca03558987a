//! The reference `Loader` implementation (spec.md §4.5): a row-oriented
//! RDBMS backend using native `COPY` for bulk ingest and a
//! truncate-then-insert swap for atomic publication. Grounded on the
//! teacher's `database.rs` pool plumbing and `loggers/names.rs`/
//! `loggers/datasets.rs` upsert idiom (`diesel::upsert::excluded`), though
//! the bulk `COPY` path itself is new: the teacher never bulk-loads, it
//! inserts row-by-row in chunks of 10,000.

pub mod ddl;
pub mod schema;

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use diesel::pg::Pg;
use diesel::sql_types::Timestamptz;
use diesel::prelude::*;
use uuid::Uuid;

use crate::database::PgPool;
use crate::errors::LoaderError;
use crate::loader::{Loader, ProcessedArchive, RunMode, RunStatus, StagingSummary};

pub struct PostgresLoader {
    pool: PgPool,
    stale_run_threshold: Duration,
}

impl PostgresLoader {
    /// `stale_run_threshold` is the config value from spec.md §5 "Recovery"
    /// (default 6h): a `RUNNING` row older than this is treated as crashed.
    pub fn new(pool: PgPool, stale_run_threshold: Duration) -> Self {
        PostgresLoader { pool, stale_run_threshold }
    }

    fn conn(&self) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>, LoaderError> {
        self.pool.get().map_err(|e| LoaderError::Transient { attempts: 1, detail: e.to_string() })
    }
}

impl Loader for PostgresLoader {
    fn initialize_schema(&self) -> Result<(), LoaderError> {
        let mut conn = self.conn()?;
        diesel::sql_query(ddl::CREATE_TABLES)
            .execute(&mut conn)
            .map_err(|e| LoaderError::Staging(e.to_string()))?;
        diesel::sql_query(ddl::CREATE_STAGING_TABLES)
            .execute(&mut conn)
            .map_err(|e| LoaderError::Staging(e.to_string()))?;
        Ok(())
    }

    fn start_run(&self, mode: RunMode) -> Result<Uuid, LoaderError> {
        use schema::etl_load_history::dsl::*;

        let mut conn = self.conn()?;

        conn.transaction(|conn| {
            // Crash recovery: a RUNNING row older than the staleness
            // threshold is a crashed run (SPEC_FULL.md §C.1). The caller is
            // expected to have already checked for a genuinely-active run
            // before calling start_run; this sweep only clears out rows
            // abandoned by a prior process that never reached end_run.
            let threshold = Utc::now()
                - chrono::Duration::from_std(self.stale_run_threshold).unwrap_or_else(|_| chrono::Duration::hours(6));
            diesel::sql_query(ddl::MARK_STALE_RUNS_FAILED)
                .bind::<Timestamptz, _>(threshold)
                .execute(conn)?;

            let still_running: i64 = etl_load_history
                .filter(status.eq("RUNNING"))
                .count()
                .get_result(conn)?;
            if still_running > 0 {
                return Err(diesel::result::Error::RollbackTransaction);
            }

            let new_run_id = Uuid::new_v4();
            let mode_label = match mode {
                RunMode::Full => "FULL",
                RunMode::Delta => "DELTA",
            };
            diesel::insert_into(etl_load_history)
                .values((
                    run_id.eq(new_run_id),
                    schema::etl_load_history::mode.eq(mode_label),
                    status.eq("RUNNING"),
                    started_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            Ok(new_run_id)
        })
        .map_err(|e: diesel::result::Error| match e {
            diesel::result::Error::RollbackTransaction => LoaderError::AlreadyRunning(Uuid::nil()),
            other => LoaderError::Staging(other.to_string()),
        })
    }

    fn get_processed_archives(&self) -> Result<Vec<ProcessedArchive>, LoaderError> {
        use schema::etl_processed_archives::dsl::*;

        let mut conn = self.conn()?;
        etl_processed_archives
            .select((archive_name, checksum))
            .load::<(String, String)>(&mut conn)
            .map(|rows| rows.into_iter().map(|(name, sum)| ProcessedArchive { name, checksum: sum }).collect())
            .map_err(|e| LoaderError::Staging(e.to_string()))
    }

    fn pre_load_optimization(&self, mode: RunMode) -> Result<(), LoaderError> {
        if mode != RunMode::Full {
            return Ok(());
        }
        let mut conn = self.conn()?;
        diesel::sql_query(ddl::DROP_SECONDARY_INDEXES)
            .execute(&mut conn)
            .map_err(|e| LoaderError::Staging(e.to_string()))?;
        for table in ddl::DEPENDENT_TABLES {
            diesel::sql_query(ddl::disable_triggers(table))
                .execute(&mut conn)
                .map_err(|e| LoaderError::Staging(e.to_string()))?;
        }
        Ok(())
    }

    fn bulk_load_to_staging(&self, table: &str, chunk_files: &[&Path]) -> Result<StagingSummary, LoaderError> {
        let mut conn = self.conn()?;
        let mut rows_staged = 0u64;

        for path in chunk_files {
            let file = std::io::BufReader::new(
                File::open(path).map_err(|e| LoaderError::Staging(e.to_string()))?,
            );
            // diesel's COPY API is generic over a compile-time `Table` type,
            // but this method is handed a runtime table name (spec.md §4.4
            // "bulk_load_to_staging"), so dispatch over the concrete
            // `table!` types declared in `schema.rs` instead of trying to
            // build a table handle dynamically. Column order in each
            // staging table matches the corresponding row struct in
            // `transformer/rows.rs` field for field.
            let count = match table {
                "spl_raw_documents" => diesel::copy_from(schema::staging_spl_raw_documents::table)
                    .from_raw_data(diesel::pg::CopyFormat::Csv, file)
                    .execute(&mut conn),
                "products" => diesel::copy_from(schema::staging_products::table)
                    .from_raw_data(diesel::pg::CopyFormat::Csv, file)
                    .execute(&mut conn),
                "product_ndcs" => diesel::copy_from(schema::staging_product_ndcs::table)
                    .from_raw_data(diesel::pg::CopyFormat::Csv, file)
                    .execute(&mut conn),
                "ingredients" => diesel::copy_from(schema::staging_ingredients::table)
                    .from_raw_data(diesel::pg::CopyFormat::Csv, file)
                    .execute(&mut conn),
                "packaging" => diesel::copy_from(schema::staging_packaging::table)
                    .from_raw_data(diesel::pg::CopyFormat::Csv, file)
                    .execute(&mut conn),
                "marketing_status" => diesel::copy_from(schema::staging_marketing_status::table)
                    .from_raw_data(diesel::pg::CopyFormat::Csv, file)
                    .execute(&mut conn),
                other => {
                    return Err(LoaderError::Staging(format!("unknown staging table '{other}'")));
                }
            }
            .map_err(|e| LoaderError::Staging(e.to_string()))?;
            rows_staged += count as u64;
        }

        Ok(StagingSummary { rows_staged })
    }

    fn merge_from_staging(&self, mode: RunMode) -> Result<(), LoaderError> {
        let mut conn = self.conn()?;
        // Single timestamp for the whole merge (spec.md §4.2 "loaded_at is
        // left unset [by the transformer]; the Loader assigns it per batch
        // using a single run timestamp"): every row published by this call
        // gets the same `loaded_at`, not a per-row `now()`.
        let loaded_at = Utc::now();

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            match mode {
                RunMode::Full => {
                    // Swap publication: truncate production and re-populate
                    // from staging within the same transaction, so a
                    // concurrent reader never observes an empty table
                    // (spec.md §4.4 "Atomic publication").
                    diesel::sql_query(
                        "TRUNCATE spl_raw_documents, products, product_ndcs, ingredients, packaging, marketing_status CASCADE",
                    )
                    .execute(conn)?;
                }
                RunMode::Delta => {
                    // Delete-then-insert on document_id (spec.md §4.4
                    // "DELTA mode"): children first, then products, then
                    // the raw-document row, so no foreign key ever points
                    // at a row this transaction is about to remove.
                    diesel::sql_query(
                        "DELETE FROM product_ndcs WHERE document_id IN (SELECT document_id FROM staging_products)",
                    )
                    .execute(conn)?;
                    diesel::sql_query(
                        "DELETE FROM ingredients WHERE document_id IN (SELECT document_id FROM staging_products)",
                    )
                    .execute(conn)?;
                    diesel::sql_query(
                        "DELETE FROM packaging WHERE document_id IN (SELECT document_id FROM staging_products)",
                    )
                    .execute(conn)?;
                    diesel::sql_query(
                        "DELETE FROM marketing_status WHERE document_id IN (SELECT document_id FROM staging_products)",
                    )
                    .execute(conn)?;
                    diesel::sql_query(
                        "DELETE FROM products WHERE document_id IN (SELECT document_id FROM staging_products)",
                    )
                    .execute(conn)?;
                    diesel::sql_query(
                        "DELETE FROM spl_raw_documents WHERE document_id IN (SELECT document_id FROM staging_spl_raw_documents)",
                    )
                    .execute(conn)?;
                }
            }

            diesel::sql_query(
                "INSERT INTO spl_raw_documents SELECT *, $1 FROM staging_spl_raw_documents",
            )
            .bind::<Timestamptz, _>(loaded_at)
            .execute(conn)?;
            diesel::sql_query("INSERT INTO products SELECT *, false, $1 FROM staging_products")
                .bind::<Timestamptz, _>(loaded_at)
                .execute(conn)?;
            diesel::sql_query("INSERT INTO product_ndcs SELECT * FROM staging_product_ndcs")
                .execute(conn)?;
            diesel::sql_query("INSERT INTO ingredients (document_id, name, substance_code, strength_numerator, strength_denominator, unit_of_measure, is_active) SELECT document_id, name, substance_code, strength_numerator, strength_denominator, unit_of_measure, is_active FROM staging_ingredients")
                .execute(conn)?;
            diesel::sql_query("INSERT INTO packaging (document_id, package_ndc, package_description, package_type) SELECT document_id, package_ndc, package_description, package_type FROM staging_packaging")
                .execute(conn)?;
            diesel::sql_query("INSERT INTO marketing_status (document_id, marketing_category, start_date, end_date) SELECT document_id, marketing_category, start_date, end_date FROM staging_marketing_status")
                .execute(conn)?;

            diesel::sql_query(ddl::RECOMPUTE_LATEST_VERSION).execute(conn)?;
            diesel::sql_query(ddl::TRUNCATE_STAGING_TABLES).execute(conn)?;

            Ok(())
        })
        .map_err(|e| LoaderError::Merge(e.to_string()))
    }

    fn post_load_cleanup(&self, mode: RunMode) -> Result<(), LoaderError> {
        if mode != RunMode::Full {
            return Ok(());
        }
        let mut conn = self.conn()?;
        for table in ddl::DEPENDENT_TABLES {
            diesel::sql_query(ddl::enable_triggers(table))
                .execute(&mut conn)
                .map_err(|e| LoaderError::Integrity(e.to_string()))?;
        }
        diesel::sql_query(
            "CREATE INDEX IF NOT EXISTS idx_products_set_id ON products(set_id);\
             CREATE INDEX IF NOT EXISTS idx_ingredients_document_id ON ingredients(document_id);\
             CREATE INDEX IF NOT EXISTS idx_packaging_document_id ON packaging(document_id);\
             CREATE INDEX IF NOT EXISTS idx_marketing_status_document_id ON marketing_status(document_id);",
        )
        .execute(&mut conn)
        .map_err(|e| LoaderError::Integrity(e.to_string()))?;
        diesel::sql_query("ANALYZE")
            .execute(&mut conn)
            .map_err(|e| LoaderError::Integrity(e.to_string()))?;
        Ok(())
    }

    fn record_processed_archive(
        &self,
        loader_run_id: Uuid,
        archive_name_value: &str,
        archive_checksum: &str,
        count: u64,
    ) -> Result<(), LoaderError> {
        use schema::etl_processed_archives::dsl::*;

        let mut conn = self.conn()?;
        diesel::insert_into(etl_processed_archives)
            .values((
                archive_name.eq(archive_name_value),
                checksum.eq(archive_checksum),
                run_id.eq(loader_run_id),
                document_count.eq(count as i64),
                processed_at.eq(Utc::now()),
            ))
            .on_conflict(archive_name)
            .do_update()
            .set((
                checksum.eq(archive_checksum),
                run_id.eq(loader_run_id),
                document_count.eq(count as i64),
                processed_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .map_err(|e| LoaderError::Staging(e.to_string()))?;
        Ok(())
    }

    fn end_run(&self, run_id: Uuid, status: RunStatus, error_log: Option<&str>) -> Result<(), LoaderError> {
        use schema::etl_load_history::dsl as h;

        let mut conn = self.conn()?;
        let status_label = match status {
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCESS",
            RunStatus::Failed => "FAILED",
        };
        diesel::update(h::etl_load_history.filter(h::run_id.eq(run_id)))
            .set((
                h::status.eq(status_label),
                h::finished_at.eq(Some(Utc::now())),
                h::error_log.eq(error_log),
            ))
            .execute(&mut conn)
            .map_err(|e| LoaderError::Staging(e.to_string()))?;
        Ok(())
    }
}
