//! Connection pooling, grounded on the teacher's `database.rs` (`PgPool`
//! type alias, `get_pool()`), but built against the in-crate schema instead
//! of `arga_core`'s.

use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;

use crate::errors::Error;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub fn get_pool(database_url: &str) -> Result<PgPool, Error> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder().build(manager)?;
    Ok(pool)
}
