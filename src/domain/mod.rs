// Domain layer: simulation records and the ports the engine is written against.

pub mod model;
pub mod ports;
