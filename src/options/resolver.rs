use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};

use super::error::OptionsError;
use super::value::{
    DEFAULT_HIGH_WATER_MARK, DEFAULT_LOW_WATER_MARK, DEFAULT_MAX_PARALLEL, HIGH_WATER_MARK,
    LOW_WATER_MARK, MAX_PARALLEL, OptionValue, StreamOptions,
};

/// One stream's layer in the options lookup chain
///
/// Reads walk the layer's own values first, then the referrer (the upstream
/// stream the owner was derived from or piped from), then the built-in
/// defaults. Nothing is cached: a value set upstream after the link was made
/// is visible on the next read, while an own value always wins.
#[derive(Debug, Default)]
pub struct Options {
    own: RwLock<StreamOptions>,
    referrer: OnceLock<Weak<Options>>,
}

impl Options {
    pub fn new(own: StreamOptions) -> Arc<Self> {
        Arc::new(Self {
            own: RwLock::new(own),
            referrer: OnceLock::new(),
        })
    }

    /// Effective value of `key`
    pub fn get(&self, key: &str) -> Option<OptionValue> {
        if let Some(value) = self.own(key) {
            return Some(value);
        }

        let mut next = self.referrer();
        while let Some(layer) = next {
            if let Some(value) = layer.own(key) {
                return Some(value);
            }
            next = layer.referrer();
        }

        None
    }

    /// Value explicitly set on this layer
    pub fn own(&self, key: &str) -> Option<OptionValue> {
        self.own
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Upstream layer, if it was linked and is still alive
    pub fn referrer(&self) -> Option<Arc<Options>> {
        self.referrer.get().and_then(Weak::upgrade)
    }

    /// True if `other` is this layer's referrer
    pub fn is_referred_by(&self, other: &Arc<Options>) -> bool {
        self.referrer()
            .is_some_and(|referrer| Arc::ptr_eq(&referrer, other))
    }

    /// Link this layer to its upstream
    ///
    /// The link is set once; later calls and links that would close a cycle
    /// are ignored. Returns whether the link was made.
    pub fn set_referrer(self: &Arc<Self>, parent: &Arc<Options>) -> bool {
        let mut cursor = Some(parent.clone());
        while let Some(layer) = cursor {
            if Arc::ptr_eq(&layer, self) {
                return false;
            }
            cursor = layer.referrer();
        }

        self.referrer.set(Arc::downgrade(parent)).is_ok()
    }

    /// Overlay new own values
    ///
    /// The merged result is validated before it replaces the current values,
    /// so a rejected update leaves the layer untouched.
    pub fn set(&self, options: StreamOptions) -> Result<(), OptionsError> {
        let mut own = self.own.write().unwrap_or_else(PoisonError::into_inner);
        let mut merged = own.clone();
        merged.merge(options);
        merged.validate()?;
        *own = merged;
        Ok(())
    }

    pub fn max_parallel(&self) -> usize {
        self.get(MAX_PARALLEL)
            .and_then(|v| v.as_usize())
            .filter(|n| *n >= 1)
            .unwrap_or(DEFAULT_MAX_PARALLEL)
    }

    pub fn high_water_mark(&self) -> usize {
        self.get(HIGH_WATER_MARK)
            .and_then(|v| v.as_usize())
            .filter(|n| *n >= 1)
            .unwrap_or(DEFAULT_HIGH_WATER_MARK)
    }

    /// Resume threshold, never above the effective high-water mark
    pub fn low_water_mark(&self) -> usize {
        let high = self.high_water_mark();
        self.get(LOW_WATER_MARK)
            .and_then(|v| v.as_usize())
            .unwrap_or(DEFAULT_LOW_WATER_MARK.min(high / 2))
            .min(high)
    }
}
