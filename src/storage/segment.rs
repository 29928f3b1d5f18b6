//! Process-wide registry of named shared segments.
//!
//! A segment is created once per name by the first caller, which runs the
//! initializer under the registry lock. Every later caller gets the same
//! segment back and never runs its initializer.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use log::debug;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::constants::MAX_NAMESPACE_LEN;
use crate::error::{KvError, Result};

type Segment = Arc<dyn Any + Send + Sync>;

static SEGMENTS: Lazy<Mutex<HashMap<String, Segment, RandomState>>> =
    Lazy::new(|| Mutex::new(HashMap::default()));

/// Look up the segment called `name`, creating it with `init` if absent.
///
/// Returns the segment and whether it already existed. If `init` fails, no
/// segment is registered and the next caller retries initialization.
///
/// # Errors
///
/// * `InvalidConfig` - the name is empty, too long, or registered with a
///   different segment type
/// * any error returned by `init`
pub fn get_or_init<T, F>(name: &str, init: F) -> Result<(Arc<T>, bool)>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> Result<T>,
{
    if name.is_empty() || name.len() > MAX_NAMESPACE_LEN {
        return Err(KvError::InvalidConfig(format!(
            "segment name must be 1-{} bytes",
            MAX_NAMESPACE_LEN
        )));
    }

    let mut segments = SEGMENTS.lock();
    if let Some(existing) = segments.get(name) {
        let segment = Arc::clone(existing).downcast::<T>().map_err(|_| {
            KvError::InvalidConfig(format!("segment '{}' holds a different type", name))
        })?;
        return Ok((segment, true));
    }

    let segment = Arc::new(init()?);
    segments.insert(name.to_owned(), segment.clone() as Segment);
    debug!("named segment '{}' initialized", name);
    Ok((segment, false))
}

/// Whether a segment called `name` exists.
pub fn exists(name: &str) -> bool {
    SEGMENTS.lock().contains_key(name)
}
