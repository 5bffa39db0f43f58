pub mod chain;
pub mod enumerate;
pub mod grid;
pub mod model;
pub mod payoff;
pub mod portfolio;
pub mod pricing;
pub mod rank;
pub mod render;
pub mod scan;

pub mod config;
