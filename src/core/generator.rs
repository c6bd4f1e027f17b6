//! Pseudo-random activity matrices.
//!
//! A generated matrix has N active cells, picked uniformly at random without
//! replacement; each active cell gets a uniform activation in `(0, 1]` and
//! every other cell is `0.0`. Active values are strictly positive so that a
//! matrix with N > 0 always shows N nonzero cells.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::matrix::ActivityMatrix;
use crate::prng::Prng;

/// Upper bound on `rows * columns` for a single matrix.
pub const MAX_CELLS: usize = 1 << 16;

pub const DEFAULT_ROWS: usize = 25;
pub const DEFAULT_COLUMNS: usize = 25;

/// How many cells of a matrix are active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Activation {
    /// Count drawn uniformly from `[min, max]`, clamped to the cell count.
    RandomCount { min: usize, max: usize },
    /// Exactly this many cells.
    Count(usize),
    /// `round(fraction * cells)` cells.
    Fraction(f64),
}

impl Default for Activation {
    fn default() -> Self {
        Activation::RandomCount { min: 1, max: 100 }
    }
}

impl Activation {
    pub fn validate(&self, cells: usize) -> Result<(), ValidationError> {
        match *self {
            Activation::RandomCount { min, max } if min > max => {
                Err(ValidationError::EmptyRange { min, max })
            }
            Activation::RandomCount { .. } => Ok(()),
            Activation::Count(count) if count > cells => {
                Err(ValidationError::CountExceedsCells { count, cells })
            }
            Activation::Count(_) => Ok(()),
            Activation::Fraction(f) if !(0.0..=1.0).contains(&f) => {
                Err(ValidationError::FractionOutOfRange(f))
            }
            Activation::Fraction(_) => Ok(()),
        }
    }

    fn resolve(&self, cells: usize, rng: &mut Prng) -> usize {
        match *self {
            Activation::RandomCount { min, max } => rng.gen_inclusive_usize(min, max).min(cells),
            Activation::Count(count) => count.min(cells),
            Activation::Fraction(f) => ((f * cells as f64).round() as usize).min(cells),
        }
    }
}

/// Parameters of one generator call. Not retained between calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    pub rows: usize,
    pub columns: usize,
    pub silent: bool,
    pub activation: Activation,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            columns: DEFAULT_COLUMNS,
            silent: false,
            activation: Activation::default(),
        }
    }
}

impl GenerationConfig {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            ..Self::default()
        }
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Checks the config and returns its cell count.
    pub fn validate(&self) -> Result<usize, ValidationError> {
        let cells = checked_cells(self.rows, self.columns)?;
        self.activation.validate(cells)?;
        Ok(cells)
    }
}

pub(crate) fn checked_cells(rows: usize, columns: usize) -> Result<usize, ValidationError> {
    let too_many = ValidationError::TooManyCells {
        rows,
        columns,
        limit: MAX_CELLS,
    };
    match rows.checked_mul(columns) {
        Some(cells) if cells <= MAX_CELLS => Ok(cells),
        _ => Err(too_many),
    }
}

/// Generates a matrix from a freshly seeded PRNG.
pub fn generate(config: &GenerationConfig) -> Result<ActivityMatrix, ValidationError> {
    let mut rng = Prng::from_entropy();
    generate_with(config, &mut rng)
}

/// Generates a matrix drawing from `rng`.
///
/// Silent configs return a zero matrix without consuming randomness.
pub fn generate_with(
    config: &GenerationConfig,
    rng: &mut Prng,
) -> Result<ActivityMatrix, ValidationError> {
    let cells = config.validate()?;
    if config.silent {
        return Ok(ActivityMatrix::silent(config.rows, config.columns));
    }

    let mut rows = vec![vec![0.0f32; config.columns]; config.rows];
    if cells == 0 {
        return Ok(ActivityMatrix::from_rows(rows));
    }

    let count = config.activation.resolve(cells, rng);
    for cell in sample_cells(cells, count, rng) {
        rows[cell / config.columns][cell % config.columns] = rng.next_f32_open01();
    }
    Ok(ActivityMatrix::from_rows(rows))
}

/// Floyd's sampling: `count` distinct indices from `0..cells`, in draw order.
fn sample_cells(cells: usize, count: usize, rng: &mut Prng) -> Vec<usize> {
    let mut seen = HashSet::with_capacity(count);
    let mut picked = Vec::with_capacity(count);
    for upper in (cells - count)..cells {
        let candidate = rng.gen_inclusive_usize(0, upper);
        let cell = if seen.insert(candidate) {
            candidate
        } else {
            seen.insert(upper);
            upper
        };
        picked.push(cell);
    }
    picked
}
