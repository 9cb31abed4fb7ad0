use std::sync::{Mutex, MutexGuard, PoisonError};

use log::*;

use crate::enti::Classify;
use crate::Error;

type Loader<'a> = Box<dyn Fn() -> Result<Box<dyn Classify>, Error> + 'a>;

/// Holds the model for the lifetime of the process.
///
/// The model is built on first use and reused afterwards. A failed load
/// leaves the slot empty, so the next request tries again.
pub struct ModelHolder<'a> {
    loader: Loader<'a>,
    slot: Mutex<Option<Box<dyn Classify>>>,
}

impl<'a> ModelHolder<'a> {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Classify>, Error> + 'a,
    {
        Self {
            loader: Box::new(loader),
            slot: Mutex::new(None),
        }
    }

    pub fn is_online(&self) -> bool {
        self.lock().is_some()
    }

    /// Load the model unless it is already loaded.
    pub fn load(&self) -> Result<(), Error> {
        let mut slot = self.lock();
        self.fill(&mut slot)
    }

    /// Run `f` against the model, loading it first when needed.
    ///
    /// The lock is held for the whole call, so callers are served one at a
    /// time.
    pub fn with_model<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&dyn Classify) -> R,
    {
        let mut slot = self.lock();
        self.fill(&mut slot)?;
        match slot.as_deref() {
            Some(model) => Ok(f(model)),
            None => Err(Error::ModelUnavailable("model slot is empty".to_string())),
        }
    }

    fn fill(&self, slot: &mut Option<Box<dyn Classify>>) -> Result<(), Error> {
        if slot.is_none() {
            debug!("Model not loaded yet");
            match (self.loader)() {
                Ok(model) => *slot = Some(model),
                Err(e) => {
                    error!("Failed to load model: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    // The slot is only ever replaced whole, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn Classify>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
