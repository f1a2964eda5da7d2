//! Fitting run orchestration
//!
//! A run is one or two chained Blender invocations. The strategy decides the
//! shape; the runner drives the subprocess and publishes events.

pub mod runner;
pub mod strategy;

pub use runner::{FitEvent, FitterEnvironment, FittingRunner};
pub use strategy::{
    ContinuousStrategy, FitStrategy, SingleStepStrategy, StrategyAction, StrategyContext,
};
