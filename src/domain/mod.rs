// Domain layer: records and ports (interfaces). No HTTP or storage details here.

pub mod model;
pub mod ports;
