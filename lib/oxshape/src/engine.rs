//! Evaluation of compiled rules against runtime data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

use crate::classify::ConstraintCategory;
use crate::model::{ConstraintSet, Severity};
use crate::rule::ValidationRule;
use crate::validator::{
    Evaluation, EvaluationContext, LegacyValidatorBank, Validator, ValidatorRegistry,
};

/// A failing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDetail {
    pub rule_id: String,
    pub target_class: String,
    pub property_path: String,
    pub constraint_type: ConstraintCategory,
    pub severity: Severity,
    pub message: String,
    /// The value under test, `null` when the data has none.
    pub value: Value,
    /// Names of the validators that reported the failure.
    pub validators: Vec<String>,
    pub details: Map<String, Value>,
}

/// Statistics of one validation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub validation_duration_ms: f64,
    pub rules_evaluated: usize,
    /// Number of evaluated rules per constraint category.
    pub constraint_type_distribution: BTreeMap<ConstraintCategory, usize>,
    /// Number of calls per validator name, `legacy` included.
    pub validator_usage: BTreeMap<String, usize>,
    pub cache_hit_rate: f64,
}

/// The outcome of [`ValidationEngine::validate`].
///
/// `valid` is false as soon as any rule fails, whatever its severity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ResultDetail>,
    pub warnings: Vec<ResultDetail>,
    pub info: Vec<ResultDetail>,
    pub performance: Performance,
}

impl ValidationResult {
    /// Every failure, violations first.
    pub fn failures(&self) -> impl Iterator<Item = &ResultDetail> {
        self.violations
            .iter()
            .chain(&self.warnings)
            .chain(&self.info)
    }

    pub fn failure_count(&self) -> usize {
        self.violations.len() + self.warnings.len() + self.info.len()
    }
}

/// Validates data maps against rules.
///
/// Each constraint key of a rule goes to the first registered validator handling it.
/// Keys no validator handles go to the [`LegacyValidatorBank`]. In legacy mode every
/// key goes to the bank.
#[derive(Debug, Clone, Copy)]
pub struct ValidationEngine<'a> {
    registry: &'a ValidatorRegistry,
    legacy: &'a LegacyValidatorBank,
    legacy_mode: bool,
    cache_hit_rate: f64,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(registry: &'a ValidatorRegistry, legacy: &'a LegacyValidatorBank) -> Self {
        Self {
            registry,
            legacy,
            legacy_mode: false,
            cache_hit_rate: 0.,
        }
    }

    /// Restricts dispatch to the legacy bank.
    #[must_use]
    pub fn with_legacy_mode(mut self, legacy_mode: bool) -> Self {
        self.legacy_mode = legacy_mode;
        self
    }

    /// Sets the cache hit rate reported in [`Performance`].
    #[must_use]
    pub fn with_cache_hit_rate(mut self, cache_hit_rate: f64) -> Self {
        self.cache_hit_rate = cache_hit_rate;
        self
    }

    /// Evaluates every rule against `data`.
    ///
    /// This only logs at trace level, [`ShaclProcessor::validate_data`](crate::ShaclProcessor::validate_data)
    /// wraps it in a telemetry span.
    pub fn validate(
        &self,
        data: &Map<String, Value>,
        rules: &[ValidationRule],
    ) -> ValidationResult {
        let start = Instant::now();
        let mut result = ValidationResult::default();

        for rule in rules {
            let value = resolve(data, &rule.property_path);
            let context = EvaluationContext { rule, data };
            let mut evaluation = Evaluation::pass();
            let mut failing = Vec::new();

            for (validator, constraints) in self.dispatch(&rule.constraint.constraints()) {
                let outcome = validator.evaluate(value, &constraints, &context);
                *result
                    .performance
                    .validator_usage
                    .entry(validator.name().to_owned())
                    .or_insert(0) += 1;
                if !outcome.valid {
                    failing.push(validator.name().to_owned());
                }
                evaluation.merge(outcome);
            }

            *result
                .performance
                .constraint_type_distribution
                .entry(rule.constraint_type)
                .or_insert(0) += 1;
            result.performance.rules_evaluated += 1;

            if evaluation.valid {
                continue;
            }
            trace!(rule_id = %rule.rule_id, "rule failed");
            let detail = ResultDetail {
                rule_id: rule.rule_id.clone(),
                target_class: rule.target_class.clone(),
                property_path: rule.property_path.clone(),
                constraint_type: rule.constraint_type,
                severity: rule.severity,
                message: rule.message.clone(),
                value: value.cloned().unwrap_or(Value::Null),
                validators: failing,
                details: evaluation.details,
            };
            match rule.severity {
                Severity::Violation => result.violations.push(detail),
                Severity::Warning => result.warnings.push(detail),
                Severity::Info => result.info.push(detail),
            }
        }

        result.valid = result.failure_count() == 0;
        result.performance.cache_hit_rate = self.cache_hit_rate;
        result.performance.validation_duration_ms = start.elapsed().as_secs_f64() * 1000.;
        result
    }

    /// Splits constraints into per-validator subsets, in key order of first claim.
    fn dispatch(
        &self,
        constraints: &ConstraintSet,
    ) -> Vec<(&'a (dyn Validator + 'static), ConstraintSet)> {
        let legacy: &'a (dyn Validator + 'static) = self.legacy;
        if self.legacy_mode {
            return vec![(legacy, constraints.clone())];
        }
        let mut groups: Vec<(Option<&'a Arc<dyn Validator>>, ConstraintSet)> = Vec::new();
        for (key, value) in constraints {
            let validator = self.registry.dispatch(*key);
            let group = groups.iter_mut().find(|(existing, _)| match (existing, validator) {
                (Some(a), Some(b)) => Arc::ptr_eq(*a, b),
                (None, None) => true,
                _ => false,
            });
            match group {
                Some((_, subset)) => {
                    subset.insert(*key, value.clone());
                }
                None => groups.push((validator, ConstraintSet::new().with(*key, value.clone()))),
            }
        }
        groups
            .into_iter()
            .map(|(validator, subset)| (validator.map_or(legacy, Arc::as_ref), subset))
            .collect()
    }
}

/// Looks the value of a property up, by IRI fragment first and raw path second.
fn resolve<'d>(data: &'d Map<String, Value>, property_path: &str) -> Option<&'d Value> {
    let key = property_path
        .rsplit_once('#')
        .map_or(property_path, |(_, fragment)| fragment);
    data.get(key).or_else(|| data.get(property_path))
}
