//! Encoding registry
//!
//! Maps an [`Encoding`] to its [`ConverterWrapper`], building the wrapper the
//! first time the encoding is requested. Wrappers are leaked into the
//! process-wide cache and never recycled, so a returned reference stays valid
//! for the life of the program. The lock is held only while checking for and
//! inserting a wrapper; conversion through a wrapper takes no lock.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::descriptor;
use crate::wrapper::ConverterWrapper;
use crate::{Encoding, Error, Result};

static WRAPPERS: Lazy<Mutex<HashMap<Encoding, &'static ConverterWrapper>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Wrapper for `encoding`, or `None` when no converter is registered
pub fn lookup(encoding: Encoding) -> Option<&'static ConverterWrapper> {
    let mut wrappers = WRAPPERS.lock();
    if let Some(&wrapper) = wrappers.get(&encoding) {
        return Some(wrapper);
    }
    let descriptor = descriptor::builtin(encoding)?;
    let wrapper: &'static ConverterWrapper = Box::leak(Box::new(ConverterWrapper::new(descriptor)));
    log::debug!("built converter wrapper for {encoding} ({})", wrapper.shape_name());
    wrappers.insert(encoding, wrapper);
    Some(wrapper)
}

/// Like [`lookup`], failing with [`Error::UnknownEncoding`]
pub fn require(encoding: Encoding) -> Result<&'static ConverterWrapper> {
    lookup(encoding).ok_or(Error::UnknownEncoding(encoding))
}

/// Every encoding the registry can build a wrapper for
pub fn available_encodings() -> Vec<Encoding> {
    descriptor::builtin_encodings().collect()
}
