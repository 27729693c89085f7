//! Acoustic engine registry with per-stream interpolation weights.
//!
//! Each entry owns its engine and its weight vector as one value, so removing
//! an entry releases both together. The registry and every weight vector sit
//! behind a single lock ([`RegistryHandle`]): mutations and the controller's
//! duration/parameter pass both take it, and nothing finer-grained is exposed,
//! since renormalization touches every entry.

use crate::args::{EngineArgs, EngineLoader};
use crate::config::ArgLimits;
use crate::engine::{AcousticEngine, BlendSource};
use crate::lockfree::AtomicFlag;
use crate::stream::{InterpolationWeights, FULL_WEIGHTS, NUM_WEIGHTS};
use crate::{Error, Result};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Result of [`EngineRegistry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The registry was empty; the new engine is the default.
    AddedAsDefault,
    Added,
    /// An engine with this name exists; it was kept and the new one dropped.
    AlreadyExists,
}

/// One registered engine and its interpolation weights.
pub struct EngineEntry {
    weights: InterpolationWeights,
    engine: Box<dyn AcousticEngine>,
}

impl EngineEntry {
    pub fn weights(&self) -> &InterpolationWeights {
        &self.weights
    }

    pub fn engine(&self) -> &dyn AcousticEngine {
        self.engine.as_ref()
    }
}

/// Named acoustic engines, one of which is the default.
///
/// Invariant: the default name resolves to an entry whenever the registry is
/// non-empty, and is `None` when it is empty.
pub struct EngineRegistry {
    entries: BTreeMap<String, EngineEntry>,
    default: Option<String>,
    /// Per-stream sum of absolute weights from the last renormalization.
    aggregate: [f64; NUM_WEIGHTS],
    default_weight: f64,
}

impl EngineRegistry {
    /// Empty registry; new entries start with `default_weight` on every stream.
    pub fn new(default_weight: f64) -> Self {
        Self {
            entries: BTreeMap::new(),
            default: None,
            aggregate: [0.0; NUM_WEIGHTS],
            default_weight,
        }
    }

    pub fn add(&mut self, name: impl Into<String>, engine: Box<dyn AcousticEngine>) -> AddOutcome {
        let name = name.into();
        if self.entries.contains_key(&name) {
            tracing::warn!("Engine '{}' already exists, keeping the registered one", name);
            return AddOutcome::AlreadyExists;
        }

        let mut weights = InterpolationWeights::uniform(self.default_weight);
        engine.check_interpolation_weights(&mut weights);
        self.entries.insert(name.clone(), EngineEntry { weights, engine });
        self.renormalize();

        if self.default.is_none() {
            tracing::info!("Default engine is '{}'", name);
            self.default = Some(name);
            AddOutcome::AddedAsDefault
        } else {
            tracing::info!("Added engine '{}'", name);
            AddOutcome::Added
        }
    }

    /// Remove and release an engine. Returns false if the name is unknown.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(entry) = self.entries.remove(name) else {
            return false;
        };
        drop(entry);

        if self.entries.is_empty() {
            tracing::warn!(
                "No engine remaining, default engine is now undefined (was '{}')",
                name
            );
            self.default = None;
        } else if self.default.as_deref() == Some(name) {
            self.default = self.entries.keys().next().cloned();
            tracing::info!(
                "Removed default engine '{}', default is now '{}'",
                name,
                self.default.as_deref().unwrap_or_default()
            );
        } else {
            tracing::info!("Removed engine '{}'", name);
        }

        self.renormalize();
        true
    }

    /// Make `name` the default. No-op (returns false) if it is not registered.
    pub fn set_default(&mut self, name: &str) -> bool {
        if !self.entries.contains_key(name) {
            return false;
        }
        self.default = Some(name.to_string());
        true
    }

    /// Normalize each stream so its weights sum to 1 across engines.
    ///
    /// Streams where every engine has zero weight stay at zero.
    pub fn renormalize(&mut self) {
        self.aggregate = [0.0; NUM_WEIGHTS];
        for entry in self.entries.values() {
            for (i, w) in entry.weights.iter().enumerate() {
                self.aggregate[i] += w.abs();
            }
        }

        for entry in self.entries.values_mut() {
            for i in 0..NUM_WEIGHTS {
                if self.aggregate[i] != 0.0 {
                    entry.weights[i] /= self.aggregate[i];
                }
            }
        }
    }

    /// Overwrite the weights of the named engines, then renormalize.
    ///
    /// Unknown names are ignored. Returns the number of engines updated.
    pub fn set_weights(&mut self, weights: &HashMap<String, InterpolationWeights>) -> usize {
        let mut changed = 0;
        for (name, new_weights) in weights {
            if let Some(entry) = self.entries.get_mut(name) {
                entry.weights = *new_weights;
                entry.engine.check_interpolation_weights(&mut entry.weights);
                changed += 1;
            }
        }
        if changed > 0 {
            self.renormalize();
        }
        changed
    }

    /// Set every weight of every engine to zero.
    pub fn zero_weights(&mut self) {
        for entry in self.entries.values_mut() {
            entry.weights = InterpolationWeights::zero();
        }
        self.aggregate = [0.0; NUM_WEIGHTS];
    }

    /// Restore the default weight on every stream that carried weight at the
    /// last renormalization, then renormalize.
    pub fn reset_weights(&mut self) {
        for entry in self.entries.values_mut() {
            for i in 0..NUM_WEIGHTS {
                if self.aggregate[i] != 0.0 {
                    entry.weights[i] = self.default_weight;
                }
            }
        }
        self.renormalize();
    }

    /// Dump every weight at debug level.
    pub fn log_weights(&self) {
        for (name, entry) in &self.entries {
            tracing::debug!("weights {}: {:?}", name, entry.weights.as_array());
        }
    }

    /// Engines to blend for one computation pass.
    ///
    /// Without interpolation this is the default engine alone at full weight.
    /// Returns `None` when the registry is empty.
    pub fn blend_sources(&self, interpolate: bool) -> Option<Vec<BlendSource<'_>>> {
        if interpolate {
            if self.entries.is_empty() {
                return None;
            }
            Some(
                self.entries
                    .values()
                    .map(|entry| BlendSource::new(entry.engine.as_ref(), &entry.weights))
                    .collect(),
            )
        } else {
            self.default_engine()
                .map(|engine| vec![BlendSource::new(engine, &FULL_WEIGHTS)])
        }
    }

    pub fn default_engine(&self) -> Option<&dyn AcousticEngine> {
        self.default
            .as_ref()
            .and_then(|name| self.entries.get(name))
            .map(EngineEntry::engine)
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.default.is_some()
    }

    pub fn get(&self, name: &str) -> Option<&EngineEntry> {
        self.entries.get(name)
    }

    pub fn weights(&self, name: &str) -> Option<InterpolationWeights> {
        self.entries.get(name).map(|entry| entry.weights)
    }

    /// Per-stream weight sums from the last renormalization.
    pub fn aggregate(&self) -> &[f64; NUM_WEIGHTS] {
        &self.aggregate
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every engine in name order. Returns how many were released.
    pub fn clear(&mut self) -> usize {
        let released = self.entries.len();
        self.default = None;
        while let Some((name, entry)) = self.entries.pop_first() {
            drop(entry);
            tracing::debug!("Released engine '{}'", name);
        }
        self.aggregate = [0.0; NUM_WEIGHTS];
        released
    }
}

/// Shared, lock-guarded registry plus a lock-free readiness mirror.
///
/// Cloning yields another handle to the same registry. Readiness is written
/// while the lock is held, so it never disagrees with a completed mutation.
#[derive(Clone)]
pub struct RegistryHandle {
    registry: Arc<Mutex<EngineRegistry>>,
    ready: Arc<AtomicFlag>,
}

impl RegistryHandle {
    pub fn new(default_weight: f64) -> Self {
        Self {
            registry: Arc::new(Mutex::new(EngineRegistry::new(default_weight))),
            ready: Arc::new(AtomicFlag::new(false)),
        }
    }

    /// Acquire the registry lock for a computation pass.
    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineRegistry> {
        self.registry.lock()
    }

    /// Read the registry under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&EngineRegistry) -> R) -> R {
        f(&self.registry.lock())
    }

    /// Run a mutation under the lock and refresh readiness.
    pub fn update<R>(&self, f: impl FnOnce(&mut EngineRegistry) -> R) -> R {
        let mut registry = self.registry.lock();
        let result = f(&mut registry);
        self.ready.set(registry.is_ready());
        result
    }

    pub fn add(&self, name: impl Into<String>, engine: Box<dyn AcousticEngine>) -> AddOutcome {
        self.update(|registry| registry.add(name, engine))
    }

    /// Tokenize a configuration file and register the engine it describes.
    ///
    /// Loading happens before the lock is taken. On any failure the registry
    /// is left untouched.
    pub fn add_from_file(
        &self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        limits: &ArgLimits,
        loader: &dyn EngineLoader,
    ) -> Result<AddOutcome> {
        let name = name.into();
        let args = EngineArgs::from_file(path.as_ref(), limits).map_err(|e| {
            tracing::warn!("Could not read config for engine '{}': {}", name, e);
            e
        })?;
        self.add_from_args(name, &args, loader)
    }

    /// Build an engine from an argument list and register it.
    pub fn add_from_args(
        &self,
        name: impl Into<String>,
        args: &EngineArgs,
        loader: &dyn EngineLoader,
    ) -> Result<AddOutcome> {
        let name = name.into();
        if args.is_empty() {
            return Err(Error::EngineLoad {
                name,
                reason: "empty argument list".to_string(),
            });
        }
        let engine = loader.load(args).map_err(|e| Error::EngineLoad {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        Ok(self.add(name, engine))
    }

    pub fn remove(&self, name: &str) -> bool {
        self.update(|registry| registry.remove(name))
    }

    pub fn set_default(&self, name: &str) -> bool {
        self.update(|registry| registry.set_default(name))
    }

    pub fn set_weights(&self, weights: &HashMap<String, InterpolationWeights>) -> usize {
        self.update(|registry| registry.set_weights(weights))
    }

    pub fn zero_weights(&self) {
        self.update(EngineRegistry::zero_weights)
    }

    pub fn reset_weights(&self) {
        self.update(EngineRegistry::reset_weights)
    }

    pub fn clear(&self) -> usize {
        self.update(EngineRegistry::clear)
    }

    /// Lock-free readiness check.
    pub fn is_ready(&self) -> bool {
        self.ready.get()
    }

    pub fn default_name(&self) -> Option<String> {
        self.registry.lock().default_name().map(str::to_string)
    }

    pub fn weights(&self, name: &str) -> Option<InterpolationWeights> {
        self.registry.lock().weights(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.registry.lock().names()
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    pub fn log_weights(&self) {
        self.registry.lock().log_weights();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamKind;
    use crate::testing::FixedEngine;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn engine() -> Box<dyn AcousticEngine> {
        Box::new(FixedEngine::default())
    }

    #[test]
    fn test_add_on_empty_becomes_default() {
        let mut registry = EngineRegistry::new(1.0);
        assert!(!registry.is_ready());

        assert_eq!(registry.add("slt", engine()), AddOutcome::AddedAsDefault);
        assert_eq!(registry.default_name(), Some("slt"));
        assert!(registry.is_ready());

        assert_eq!(registry.add("awb", engine()), AddOutcome::Added);
        assert_eq!(registry.default_name(), Some("slt"));
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let mut registry = EngineRegistry::new(1.0);
        registry.add("slt", Box::new(FixedEngine::default().with_duration_mean(3.0)));
        let outcome = registry.add("slt", Box::new(FixedEngine::default().with_duration_mean(9.0)));

        assert_eq!(outcome, AddOutcome::AlreadyExists);
        assert_eq!(registry.len(), 1);
        let kept = registry.get("slt").unwrap().engine();
        let label = crate::Label::new("a");
        assert_eq!(kept.duration(&label)[0].mean, 3.0);
    }

    #[test]
    fn test_remove_default_reassigns() {
        let mut registry = EngineRegistry::new(1.0);
        registry.add("A", engine());
        registry.add("B", engine());

        assert!(registry.remove("A"));
        assert_eq!(registry.default_name(), Some("B"));
        assert!(registry.is_ready());
    }

    #[test]
    fn test_remove_last_clears_default() {
        let mut registry = EngineRegistry::new(1.0);
        registry.add("A", engine());

        assert!(registry.remove("A"));
        assert_eq!(registry.default_name(), None);
        assert!(!registry.is_ready());
        assert!(registry.blend_sources(false).is_none());
        assert!(registry.blend_sources(true).is_none());
    }

    #[test]
    fn test_remove_unknown() {
        let mut registry = EngineRegistry::new(1.0);
        registry.add("A", engine());
        assert!(!registry.remove("Z"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_default_requires_presence() {
        let mut registry = EngineRegistry::new(1.0);
        registry.add("A", engine());
        registry.add("B", engine());

        assert!(!registry.set_default("C"));
        assert_eq!(registry.default_name(), Some("A"));
        assert!(registry.set_default("B"));
        assert_eq!(registry.default_name(), Some("B"));
    }

    #[test]
    fn test_weights_split_evenly() {
        let mut registry = EngineRegistry::new(1.0);
        registry.add("A", engine());
        registry.add("B", engine());

        for name in ["A", "B"] {
            let weights = registry.weights(name).unwrap();
            for w in weights.iter() {
                assert_relative_eq!(w, 0.5);
            }
        }
    }

    #[test]
    fn test_set_weights_ignores_unknown_names() {
        let mut registry = EngineRegistry::new(1.0);
        registry.add("A", engine());
        registry.add("B", engine());

        let mut update = HashMap::new();
        update.insert("A".to_string(), InterpolationWeights::from_array([3.0, 0.0, 1.0, 1.0]));
        update.insert("Q".to_string(), InterpolationWeights::full());
        assert_eq!(registry.set_weights(&update), 1);

        let a = registry.weights("A").unwrap();
        let b = registry.weights("B").unwrap();
        assert_relative_eq!(a.stream(StreamKind::Mgc), 3.0 / 3.5);
        assert_relative_eq!(b.stream(StreamKind::Mgc), 0.5 / 3.5);
        assert_relative_eq!(a.stream(StreamKind::Lf0), 0.0);
        assert_relative_eq!(b.stream(StreamKind::Lf0), 1.0);
    }

    #[test]
    fn test_zero_then_reset_keeps_zero_streams() {
        let mut registry = EngineRegistry::new(1.0);
        registry.add("A", engine());
        registry.add("B", engine());
        registry.zero_weights();
        registry.renormalize();
        registry.reset_weights();

        for name in ["A", "B"] {
            assert!(registry.weights(name).unwrap().iter().all(|w| w == 0.0));
        }
    }

    #[test]
    fn test_reset_restores_uniform_split() {
        let mut registry = EngineRegistry::new(1.0);
        registry.add("A", engine());
        registry.add("B", engine());

        let mut update = HashMap::new();
        update.insert("A".to_string(), InterpolationWeights::from_array([0.9, 0.9, 0.9, 0.9]));
        registry.set_weights(&update);
        registry.reset_weights();

        for w in registry.weights("A").unwrap().iter() {
            assert_relative_eq!(w, 0.5);
        }
    }

    #[test]
    fn test_blend_sources_without_interpolation_is_full_weight_default() {
        let mut registry = EngineRegistry::new(1.0);
        registry.add("A", engine());
        registry.add("B", engine());

        let sources = registry.blend_sources(false).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(*sources[0].weights, InterpolationWeights::full());

        let sources = registry.blend_sources(true).unwrap();
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn test_negative_weights_repaired_on_set() {
        let mut registry = EngineRegistry::new(1.0);
        registry.add("A", engine());
        let mut update = HashMap::new();
        update.insert("A".to_string(), InterpolationWeights::from_array([-1.0, f64::NAN, 2.0, 1.0]));
        registry.set_weights(&update);

        let a = registry.weights("A").unwrap();
        assert_eq!(a.stream(StreamKind::Mgc), 0.0);
        assert_eq!(a.stream(StreamKind::Lf0), 0.0);
        assert_relative_eq!(a.stream(StreamKind::Lpf), 1.0);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut registry = EngineRegistry::new(1.0);
        registry.add("A", engine());
        registry.add("B", engine());
        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
        assert!(!registry.is_ready());
    }

    #[test]
    fn test_handle_mirrors_readiness() {
        let handle = RegistryHandle::new(1.0);
        assert!(!handle.is_ready());
        handle.add("A", engine());
        assert!(handle.is_ready());
        handle.remove("A");
        assert!(!handle.is_ready());
        assert_eq!(handle.default_name(), None);
    }

    #[test]
    fn test_handle_add_from_args_rejects_empty() {
        let handle = RegistryHandle::new(1.0);
        let loader = |_: &EngineArgs| -> Result<Box<dyn AcousticEngine>> { Ok(engine()) };
        let result = handle.add_from_args("A", &EngineArgs::default(), &loader);
        assert!(matches!(result, Err(Error::EngineLoad { .. })));
        assert!(handle.is_empty());
    }

    proptest! {
        #[test]
        fn prop_renormalize_sums_to_one_or_zero(
            raw in proptest::collection::vec(
                proptest::array::uniform4(prop_oneof![Just(0.0), 0.0f64..10.0]),
                1..6,
            )
        ) {
            let mut registry = EngineRegistry::new(1.0);
            let mut update = HashMap::new();
            for (i, weights) in raw.iter().enumerate() {
                let name = format!("e{i}");
                registry.add(name.clone(), engine());
                update.insert(name, InterpolationWeights::from_array(*weights));
            }
            registry.set_weights(&update);

            for stream in 0..NUM_WEIGHTS {
                let had_weight = raw.iter().any(|w| w[stream] != 0.0);
                let sum: f64 = registry
                    .names()
                    .iter()
                    .map(|name| registry.weights(name).unwrap()[stream])
                    .sum();
                if had_weight {
                    prop_assert!((sum - 1.0).abs() < 1e-9, "stream {} sums to {}", stream, sum);
                } else {
                    prop_assert_eq!(sum, 0.0);
                }
            }
        }
    }
}
