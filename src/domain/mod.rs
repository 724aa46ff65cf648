// Domain layer: pose models and ports. Adapters live under crate::adapters.

pub mod landmark;
pub mod model;
pub mod ports;
