// Domain layer: the institutions, the data model, and the adapter port.

pub mod location;
pub mod model;
pub mod ports;
