//! Process-wide cache of class handlers.
//!
//! Each record type gets its own `OnceLock` cell. The map lock is held only long enough to
//! fetch or create the cell, so building one handler never blocks lookups of another, and
//! concurrent first lookups of the same type wait on the cell instead of building twice.

use super::Record;
use super::class::ClassHandler;
use crate::error::{OrmError, OrmResult};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, OnceLock, PoisonError};

type Cell = Arc<OnceLock<Result<Arc<ClassHandler>, String>>>;

static REGISTRY: LazyLock<Mutex<HashMap<TypeId, Cell>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub(crate) fn handler_for<R: Record>() -> OrmResult<Arc<ClassHandler>> {
    let type_id = TypeId::of::<R>();
    let cell = {
        let mut map = REGISTRY.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(type_id).or_default())
    };
    cell.get_or_init(|| ClassHandler::build(type_id, R::descriptor()).map(Arc::new))
        .clone()
        .map_err(OrmError::Mapping)
}
