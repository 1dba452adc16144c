//! Engine configuration and the context owning every piece of shared state.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

use crate::compile::{CompilerFlavor, RuleCompiler, RuleGranularity};
use crate::engine::ValidationEngine;
use crate::model::ConstraintKey;
use crate::store::{DEFAULT_CACHE_CAPACITY, ShapeGraphStore};
use crate::telemetry::Telemetry;
use crate::validator::{LegacyValidatorBank, Validator, ValidatorRegistry};

/// Engine options, all optional when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Evaluate every rule with the legacy validator bank only.
    pub legacy_mode: bool,
    /// Rule granularity of the extended compiler.
    pub rule_granularity: RuleGranularity,
    /// Compiler used by [`ShaclProcessor::compile`](crate::ShaclProcessor::compile).
    pub compiler: CompilerFlavor,
    /// Maximum number of parsed shape graphs kept in cache, at least 1.
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            legacy_mode: false,
            rule_granularity: RuleGranularity::default(),
            compiler: CompilerFlavor::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY.get(),
        }
    }
}

/// Description of the registered validators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatorStats {
    pub total_validators: usize,
    pub validator_names: Vec<String>,
    /// Union of every capability set.
    pub constraint_types_supported: Vec<ConstraintKey>,
    /// Hit rate of the shape graph cache.
    pub cache_hit_rate: f64,
}

/// Owns the parse cache, the validator registry and the telemetry handle.
///
/// Create one when the application starts and pass it down. [`clear`](Self::clear)
/// resets the cache, for example between tests.
#[derive(Debug)]
pub struct ValidationEngineContext {
    config: EngineConfig,
    store: ShapeGraphStore,
    registry: ValidatorRegistry,
    legacy: LegacyValidatorBank,
    telemetry: Telemetry,
}

impl ValidationEngineContext {
    /// Creates a context with the built-in validators and `tracing` telemetry.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: ShapeGraphStore::new(
                NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN),
            ),
            config,
            registry: ValidatorRegistry::with_builtins(),
            legacy: LegacyValidatorBank::default(),
            telemetry: Telemetry::default(),
        }
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Replaces the validator registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ValidatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &ShapeGraphStore {
        &self.store
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Appends a validator after the ones already registered.
    ///
    /// Each registration increments the `validator.registered` metric.
    pub fn register_validator(&mut self, validator: Arc<dyn Validator>) {
        debug!(validator = validator.name(), "registered validator");
        self.telemetry.record_metric("validator.registered", 1.);
        self.registry.register(validator);
    }

    /// The engine configured from this context.
    pub fn engine(&self) -> ValidationEngine<'_> {
        ValidationEngine::new(&self.registry, &self.legacy)
            .with_legacy_mode(self.config.legacy_mode)
            .with_cache_hit_rate(self.store.cache_hit_rate())
    }

    /// The configured rule compiler.
    pub fn compiler(&self) -> Box<dyn RuleCompiler + Send + Sync> {
        self.config.compiler.compiler(self.config.rule_granularity)
    }

    pub fn validator_stats(&self) -> ValidatorStats {
        ValidatorStats {
            total_validators: self.registry.len(),
            validator_names: self.registry.names(),
            constraint_types_supported: self
                .registry
                .constraint_types_supported()
                .into_iter()
                .collect(),
            cache_hit_rate: self.store.cache_hit_rate(),
        }
    }

    /// Evicts every cached shape graph.
    pub fn clear(&self) {
        self.store.clear();
    }
}

impl Default for ValidationEngineContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.cache_capacity, 128);
        assert_eq!(config.compiler, CompilerFlavor::Extended);
    }

    #[test]
    fn test_config_from_json() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"legacy_mode": true, "rule_granularity": "per_property", "compiler": "legacy"}"#,
        )
        .unwrap();
        assert!(config.legacy_mode);
        assert_eq!(config.rule_granularity, RuleGranularity::PerProperty);
        assert_eq!(config.compiler, CompilerFlavor::Legacy);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let context = ValidationEngineContext::new(EngineConfig {
            cache_capacity: 0,
            ..EngineConfig::default()
        });
        assert_eq!(context.store().capacity(), 1);
    }

    #[test]
    fn test_validator_stats() {
        let stats = ValidationEngineContext::default().validator_stats();
        assert_eq!(stats.total_validators, 5);
        assert_eq!(stats.validator_names[0], "cardinality");
        assert!(stats.constraint_types_supported.contains(&ConstraintKey::Pattern));
        assert!(!stats.constraint_types_supported.contains(&ConstraintKey::Sparql));
    }

    struct AcceptSparql;

    impl Validator for AcceptSparql {
        fn name(&self) -> &str {
            "sparql"
        }

        fn capabilities(&self) -> &[ConstraintKey] {
            &[ConstraintKey::Sparql]
        }

        fn evaluate(
            &self,
            _: Option<&serde_json::Value>,
            _: &crate::model::ConstraintSet,
            _: &crate::validator::EvaluationContext<'_>,
        ) -> crate::validator::Evaluation {
            crate::validator::Evaluation::pass()
        }
    }

    #[test]
    fn test_registration_is_recorded() {
        let sink = Arc::new(crate::telemetry::MetricsSink::new());
        let mut context = ValidationEngineContext::default()
            .with_telemetry(Telemetry::new(Arc::<crate::telemetry::MetricsSink>::clone(&sink)));
        context.register_validator(Arc::new(AcceptSparql));
        assert_eq!(sink.metric_count("validator.registered"), 1);
        assert_eq!(context.validator_stats().validator_names[5], "sparql");
        assert!(
            context
                .validator_stats()
                .constraint_types_supported
                .contains(&ConstraintKey::Sparql)
        );
    }
}
