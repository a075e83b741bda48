// Domain layer: wave/server models and the ports the workflows talk through.

pub mod model;
pub mod ports;
