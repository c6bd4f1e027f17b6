#[path = "core/config.rs"]
pub mod config;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/frame.rs"]
pub mod frame;

#[path = "core/generator.rs"]
pub mod generator;

#[path = "core/matrix.rs"]
pub mod matrix;

#[path = "core/prng.rs"]
pub mod prng;

pub use config::{ConfigUpdate, SimulationConfig};
pub use error::ValidationError;
pub use frame::{build_frame, ActivityFrame, AreaLayout, AreaRole, AreaSpec};
pub use generator::{generate, generate_with, Activation, GenerationConfig};
pub use matrix::ActivityMatrix;
pub use prng::Prng;
