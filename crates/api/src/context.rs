//! Thread-scoped class path context.
//!
//! A scanner resolves "which deployment's classes am I looking at" from the
//! class path installed on the current thread, the way a class loader is
//! picked up from the thread context. [`ClassPathScope`] installs one and
//! restores the previous value when dropped, on every exit path including
//! unwinding.

use crate::models::SourceLocation;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

thread_local! {
    static CURRENT: RefCell<Option<Arc<ClassPath>>> = const { RefCell::new(None) };
}

/// The locations one deployment loads classes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPath {
    pub deployment: String,
    pub locations: Vec<SourceLocation>,
    /// Roots shared between deployments; never scanned.
    pub shared: BTreeSet<PathBuf>,
}

impl ClassPath {
    pub fn new(deployment: impl Into<String>, locations: Vec<SourceLocation>) -> Self {
        Self {
            deployment: deployment.into(),
            locations,
            shared: BTreeSet::new(),
        }
    }

    pub fn with_shared(mut self, shared: BTreeSet<PathBuf>) -> Self {
        self.shared = shared;
        self
    }

    /// Locations that belong to this deployment alone, in declaration order.
    pub fn scannable(&self) -> impl Iterator<Item = &SourceLocation> {
        self.locations
            .iter()
            .filter(|location| !location.is_under_any(&self.shared))
    }

    /// The class path installed on the current thread, if any.
    pub fn current() -> Option<Arc<ClassPath>> {
        CURRENT.with(|slot| slot.borrow().clone())
    }
}

/// Guard keeping a class path installed on the current thread.
#[must_use = "the class path is uninstalled as soon as the scope is dropped"]
pub struct ClassPathScope {
    previous: Option<Arc<ClassPath>>,
    // Restoration must happen on the thread that installed the value.
    _not_send: PhantomData<*const ()>,
}

impl ClassPathScope {
    pub fn enter(class_path: Arc<ClassPath>) -> Self {
        let previous = CURRENT.with(|slot| slot.replace(Some(class_path)));
        Self {
            previous,
            _not_send: PhantomData,
        }
    }
}

impl Drop for ClassPathScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|slot| *slot.borrow_mut() = previous);
    }
}
