//! The simulation parameter record shared by the generator, the feed and the
//! wire protocol.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::generator::{checked_cells, Activation, GenerationConfig, DEFAULT_COLUMNS, DEFAULT_ROWS};

pub const DEFAULT_STEP_DURATION_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationConfig {
    pub rows: usize,
    pub columns: usize,
    pub activation: Activation,
    /// Silences every area.
    pub silent: bool,
    #[serde(alias = "hasSensoryInput")]
    pub apply_sensory_input: bool,
    #[serde(alias = "hasMotorInput")]
    pub apply_motor_input: bool,
    /// Tick interval in milliseconds.
    pub step_duration: u64,
    /// Stop by itself after this many steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u64>,
    /// Parameters clients send that do not drive generation. Kept so they are
    /// echoed back with every frame.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            columns: DEFAULT_COLUMNS,
            activation: Activation::default(),
            silent: false,
            apply_sensory_input: true,
            apply_motor_input: true,
            step_duration: DEFAULT_STEP_DURATION_MS,
            max_steps: None,
            extra: BTreeMap::new(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let cells = checked_cells(self.rows, self.columns)?;
        self.activation.validate(cells)?;
        if self.step_duration == 0 {
            return Err(ValidationError::NonPositiveDuration {
                key: "stepDuration",
            });
        }
        Ok(())
    }

    pub fn generation(&self, silent: bool) -> GenerationConfig {
        GenerationConfig {
            rows: self.rows,
            columns: self.columns,
            silent: self.silent || silent,
            activation: self.activation,
        }
    }

    /// Applies every entry of `update` or none of them.
    ///
    /// Returns the keys that were recognised as generation parameters; the
    /// rest are stored in `extra`.
    pub fn apply(&mut self, update: &ConfigUpdate) -> Result<Vec<String>, ValidationError> {
        let mut next = self.clone();
        let mut recognised = Vec::new();
        for (key, value) in &update.entries {
            if next.set(key, value)? {
                recognised.push(key.clone());
            }
        }
        next.validate()?;
        *self = next;
        Ok(recognised)
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<bool, ValidationError> {
        match key {
            "rows" => self.rows = dimension("rows", value)?,
            "columns" => self.columns = dimension("columns", value)?,
            "silent" => self.silent = boolean(key, value)?,
            "applySensoryInput" | "hasSensoryInput" => {
                self.apply_sensory_input = boolean(key, value)?
            }
            "applyMotorInput" | "hasMotorInput" => self.apply_motor_input = boolean(key, value)?,
            "stepDuration" => self.step_duration = millis("stepDuration", value)?,
            "maxSteps" => {
                self.max_steps = match value {
                    Value::Null => None,
                    v => Some(positive(key, v)?),
                }
            }
            "activeCount" => self.activation = Activation::Count(positive_or_zero(key, value)?),
            "activeFraction" => {
                self.activation = Activation::Fraction(value.as_f64().ok_or_else(|| {
                    ValidationError::InvalidValue {
                        key: key.to_string(),
                        expected: "a number",
                    }
                })?)
            }
            "activation" => {
                self.activation =
                    Activation::deserialize(value).map_err(|_| ValidationError::InvalidValue {
                        key: key.to_string(),
                        expected: "randomCount, count or fraction",
                    })?
            }
            _ => {
                self.extra.insert(key.to_string(), value.clone());
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A batch of `key -> value` parameter changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigUpdate {
    entries: Vec<(String, Value)>,
}

impl ConfigUpdate {
    pub fn single(key: impl Into<String>, value: Value) -> Self {
        Self {
            entries: vec![(key.into(), value)],
        }
    }

    /// Accepts either `{"key": k, "value": v}` or a flat object of keys.
    pub fn from_payload(payload: &Value) -> Result<Self, ValidationError> {
        let map = payload
            .as_object()
            .ok_or_else(|| ValidationError::InvalidValue {
                key: "payload".to_string(),
                expected: "an object",
            })?;

        if map.len() == 2 {
            if let (Some(Value::String(key)), Some(value)) = (map.get("key"), map.get("value")) {
                return Ok(Self::single(key.clone(), value.clone()));
            }
        }

        Ok(Self {
            entries: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

fn integer(key: &str, value: &Value) -> Result<i64, ValidationError> {
    value
        .as_i64()
        .or_else(|| value.as_u64().map(|v| v.min(i64::MAX as u64) as i64))
        .ok_or_else(|| ValidationError::InvalidValue {
            key: key.to_string(),
            expected: "an integer",
        })
}

fn dimension(field: &'static str, value: &Value) -> Result<usize, ValidationError> {
    let v = integer(field, value)?;
    if v < 0 {
        return Err(ValidationError::NegativeDimension { field, value: v });
    }
    Ok(v as usize)
}

fn positive_or_zero(key: &str, value: &Value) -> Result<usize, ValidationError> {
    let v = integer(key, value)?;
    usize::try_from(v).map_err(|_| ValidationError::InvalidValue {
        key: key.to_string(),
        expected: "a non-negative integer",
    })
}

fn positive(key: &str, value: &Value) -> Result<u64, ValidationError> {
    match integer(key, value)? {
        v if v > 0 => Ok(v as u64),
        _ => Err(ValidationError::InvalidValue {
            key: key.to_string(),
            expected: "a positive integer",
        }),
    }
}

fn millis(key: &'static str, value: &Value) -> Result<u64, ValidationError> {
    match integer(key, value) {
        Ok(v) if v > 0 => Ok(v as u64),
        Ok(_) => Err(ValidationError::NonPositiveDuration { key }),
        Err(e) => Err(e),
    }
}

fn boolean(key: &str, value: &Value) -> Result<bool, ValidationError> {
    value.as_bool().ok_or_else(|| ValidationError::InvalidValue {
        key: key.to_string(),
        expected: "a boolean",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_valid() {
        let cfg = SimulationConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.step_duration, 1000);
        assert_eq!((cfg.rows, cfg.columns), (25, 25));
    }

    #[test]
    fn key_value_update_toggles_sensory_input() {
        let mut cfg = SimulationConfig::default();
        let update =
            ConfigUpdate::from_payload(&json!({"key": "hasSensoryInput", "value": false})).unwrap();
        let recognised = cfg.apply(&update).unwrap();
        assert_eq!(recognised, vec!["hasSensoryInput".to_string()]);
        assert!(!cfg.apply_sensory_input);
        assert!(cfg.generation(!cfg.apply_sensory_input).silent);
    }

    #[test]
    fn flat_update_applies_every_key() {
        let mut cfg = SimulationConfig::default();
        let update = ConfigUpdate::from_payload(&json!({
            "hasMotorInput": false,
            "rows": 10,
            "columns": 12,
            "activeCount": 5,
        }))
        .unwrap();
        cfg.apply(&update).unwrap();
        assert!(!cfg.apply_motor_input);
        assert_eq!((cfg.rows, cfg.columns), (10, 12));
        assert_eq!(cfg.activation, Activation::Count(5));
    }

    #[test]
    fn unknown_keys_are_kept_and_echoed() {
        let mut cfg = SimulationConfig::default();
        let recognised = cfg
            .apply(&ConfigUpdate::single("noise", json!(0.3)))
            .unwrap();
        assert!(recognised.is_empty());
        assert_eq!(cfg.extra.get("noise"), Some(&json!(0.3)));

        let echoed = serde_json::to_value(&cfg).unwrap();
        assert_eq!(echoed["noise"], json!(0.3));
        assert_eq!(echoed["applySensoryInput"], json!(true));
    }

    #[test]
    fn negative_dimension_is_rejected_without_partial_apply() {
        let mut cfg = SimulationConfig::default();
        let update = ConfigUpdate::from_payload(&json!({"silent": true, "rows": -3})).unwrap();
        let err = cfg.apply(&update).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NegativeDimension {
                field: "rows",
                value: -3
            }
        );
        assert!(!cfg.silent);
        assert_eq!(cfg.rows, 25);
    }

    #[test]
    fn invalid_combination_is_rejected_after_all_keys() {
        let mut cfg = SimulationConfig::default();
        let update =
            ConfigUpdate::from_payload(&json!({"rows": 2, "columns": 2, "activeCount": 9}))
                .unwrap();
        assert!(matches!(
            cfg.apply(&update),
            Err(ValidationError::CountExceedsCells { count: 9, cells: 4 })
        ));
        assert_eq!(cfg, SimulationConfig::default());
    }

    #[test]
    fn step_duration_must_be_positive() {
        let mut cfg = SimulationConfig::default();
        let err = cfg
            .apply(&ConfigUpdate::single("stepDuration", json!(0)))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::NonPositiveDuration {
                key: "stepDuration"
            }
        );
        cfg.apply(&ConfigUpdate::single("stepDuration", json!(250)))
            .unwrap();
        assert_eq!(cfg.step_duration, 250);
    }

    #[test]
    fn max_steps_can_be_cleared() {
        let mut cfg = SimulationConfig::default();
        cfg.apply(&ConfigUpdate::single("maxSteps", json!(100)))
            .unwrap();
        assert_eq!(cfg.max_steps, Some(100));
        cfg.apply(&ConfigUpdate::single("maxSteps", Value::Null))
            .unwrap();
        assert_eq!(cfg.max_steps, None);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(ConfigUpdate::from_payload(&json!([1, 2])).is_err());
        assert!(ConfigUpdate::from_payload(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn deserialises_with_legacy_aliases() {
        let cfg: SimulationConfig =
            serde_json::from_value(json!({"hasSensoryInput": false, "rows": 5})).unwrap();
        assert!(!cfg.apply_sensory_input);
        assert!(cfg.apply_motor_input);
        assert_eq!(cfg.rows, 5);
        assert_eq!(cfg.columns, 25);
        assert!(cfg.extra.is_empty());
    }
}
