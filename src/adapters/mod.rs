// Adapters layer: everything that talks to the outside world.

pub mod http;
pub mod tl1;
