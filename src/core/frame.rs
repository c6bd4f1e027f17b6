//! One tick's worth of activity: a matrix per named area plus summaries.
//!
//! Area names are opaque labels. The role only decides which input toggle can
//! silence an area.

use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::error::ValidationError;
use crate::generator::{generate_with, GenerationConfig};
use crate::matrix::ActivityMatrix;
use crate::prng::Prng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AreaRole {
    Sensory,
    Cortical,
    Motor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaSpec {
    pub name: String,
    pub role: AreaRole,
}

impl AreaSpec {
    pub fn new(name: impl Into<String>, role: AreaRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

/// The set of areas emitted in every frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaLayout {
    areas: Vec<AreaSpec>,
}

impl Default for AreaLayout {
    /// `sensoryInput1`, `area1`..`area6`, `motorInput1`.
    fn default() -> Self {
        let mut areas = vec![AreaSpec::new("sensoryInput1", AreaRole::Sensory)];
        areas.extend((1..=6).map(|i| AreaSpec::new(format!("area{i}"), AreaRole::Cortical)));
        areas.push(AreaSpec::new("motorInput1", AreaRole::Motor));
        Self { areas }
    }
}

impl AreaLayout {
    pub fn new(areas: Vec<AreaSpec>) -> Self {
        Self { areas }
    }

    pub fn areas(&self) -> &[AreaSpec] {
        &self.areas
    }

    fn generation_for(&self, spec: &AreaSpec, config: &SimulationConfig) -> GenerationConfig {
        let muted = match spec.role {
            AreaRole::Sensory => !config.apply_sensory_input,
            AreaRole::Motor => !config.apply_motor_input,
            AreaRole::Cortical => false,
        };
        config.generation(muted)
    }
}

/// Payload of a `new-activity` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFrame {
    pub step: u64,
    /// Sum of every element of every area.
    pub total_activity: f32,
    /// Mean activation over every cell of every area.
    pub global_inhibition: f32,
    pub config: SimulationConfig,
    #[serde(flatten)]
    pub areas: BTreeMap<String, ActivityMatrix>,
}

impl ActivityFrame {
    pub fn area(&self, name: &str) -> Option<&ActivityMatrix> {
        self.areas.get(name)
    }
}

/// Generates one matrix per area of `layout` for the given step.
///
/// Each area draws from its own generator forked off `rng`, so the result
/// does not depend on whether areas are generated in parallel.
pub fn build_frame(
    layout: &AreaLayout,
    config: &SimulationConfig,
    step: u64,
    rng: &mut Prng,
) -> Result<ActivityFrame, ValidationError> {
    config.validate()?;

    let jobs: Vec<(&str, GenerationConfig, Prng)> = layout
        .areas
        .iter()
        .map(|spec| {
            (
                spec.name.as_str(),
                layout.generation_for(spec, config),
                rng.fork(),
            )
        })
        .collect();

    #[cfg(feature = "parallel")]
    let generated: Result<Vec<(String, ActivityMatrix)>, ValidationError> = jobs
        .into_par_iter()
        .map(|(name, gen, mut area_rng)| Ok((name.to_string(), generate_with(&gen, &mut area_rng)?)))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let generated: Result<Vec<(String, ActivityMatrix)>, ValidationError> = jobs
        .into_iter()
        .map(|(name, gen, mut area_rng)| Ok((name.to_string(), generate_with(&gen, &mut area_rng)?)))
        .collect();

    let areas: BTreeMap<String, ActivityMatrix> = generated?.into_iter().collect();

    let cells: usize = areas.values().map(ActivityMatrix::cell_count).sum();
    let total_activity: f32 = areas.values().map(ActivityMatrix::total).sum();
    let global_inhibition = if cells == 0 {
        0.0
    } else {
        total_activity / cells as f32
    };

    Ok(ActivityFrame {
        step,
        total_activity,
        global_inhibition,
        config: config.clone(),
        areas,
    })
}
