use std::any::{Any, type_name};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use tracing::debug;

use super::chain::OperatorChain;
use super::error::PluginError;
use super::resolve::{normalize, resolve};
use crate::stream::{DataStream, StreamError, Variant};

pub type Transform<T, V> = Arc<dyn Fn(DataStream<T, V>) -> DataStream<T, V> + Send + Sync>;

/// A loadable stream extension
pub enum Plugin<T: Send + 'static, V: Variant> {
    /// Arbitrary stream-to-stream function
    Transform(Transform<T, V>),
    /// Declarative operator sequence
    Chain(OperatorChain<T>),
}

impl<T: Send + 'static, V: Variant> Clone for Plugin<T, V> {
    fn clone(&self) -> Self {
        match self {
            Plugin::Transform(f) => Plugin::Transform(f.clone()),
            Plugin::Chain(chain) => Plugin::Chain(chain.clone()),
        }
    }
}

impl<T: Send + 'static, V: Variant> Plugin<T, V> {
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(DataStream<T, V>) -> DataStream<T, V> + Send + Sync + 'static,
    {
        Plugin::Transform(Arc::new(f))
    }

    pub fn apply(&self, stream: DataStream<T, V>) -> DataStream<T, V> {
        match self {
            Plugin::Transform(f) => f(stream),
            Plugin::Chain(chain) => chain.apply(stream),
        }
    }
}

impl<T: Send + 'static, V: Variant> From<OperatorChain<T>> for Plugin<T, V> {
    fn from(chain: OperatorChain<T>) -> Self {
        Plugin::Chain(chain)
    }
}

/// Source of plugins addressed by specifier
pub trait PluginLoader: Send + Sync {
    /// Load the plugin `specifier` names, relative to `base`
    fn load<T: Send + 'static, V: Variant>(
        &self,
        base: &Path,
        specifier: &str,
    ) -> Result<Plugin<T, V>, PluginError>;
}

/// In-memory plugin loader keyed by normalized logical path
#[derive(Default)]
pub struct Registry {
    plugins: DashMap<PathBuf, Arc<dyn Any + Send + Sync>>,
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

impl Registry {
    pub fn new() -> Self {
        Self {
            plugins: DashMap::new(),
        }
    }

    /// Process-wide registry used by [`DataStream::use_plugin`]
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Register `plugin` under `path`, replacing any previous entry
    pub fn register<T, V>(&self, path: impl AsRef<Path>, plugin: impl Into<Plugin<T, V>>)
    where
        T: Send + 'static,
        V: Variant,
    {
        let key = normalize(path.as_ref());
        debug!(path = %key.display(), item = type_name::<T>(), "Plugin registered");
        self.plugins.insert(key, Arc::new(plugin.into()));
    }

    pub fn unregister(&self, path: impl AsRef<Path>) -> bool {
        self.plugins.remove(&normalize(path.as_ref())).is_some()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.plugins.contains_key(&normalize(path.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl PluginLoader for Registry {
    fn load<T: Send + 'static, V: Variant>(
        &self,
        base: &Path,
        specifier: &str,
    ) -> Result<Plugin<T, V>, PluginError> {
        let resolved = resolve(base, specifier)?;
        let entry = self
            .plugins
            .get(&resolved)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PluginError::NotFound {
                specifier: specifier.to_string(),
                resolved: resolved.clone(),
            })?;

        entry
            .downcast_ref::<Plugin<T, V>>()
            .cloned()
            .ok_or_else(|| PluginError::TypeMismatch(resolved.display().to_string()))
    }
}

impl<T: Send + 'static, V: Variant> DataStream<T, V> {
    /// Apply a plugin from the global [`Registry`]
    ///
    /// Relative specifiers resolve against the stream variant's origin.
    pub fn use_plugin(self, specifier: &str) -> Result<Self, StreamError> {
        self.use_with(Registry::global(), specifier)
    }

    /// Apply a plugin from `loader`
    pub fn use_with<L: PluginLoader>(self, loader: &L, specifier: &str) -> Result<Self, StreamError> {
        let plugin = loader.load::<T, V>(self.variant.origin(), specifier)?;
        debug!(stream = self.core.id(), specifier, "Plugin applied");
        Ok(plugin.apply(self))
    }
}
