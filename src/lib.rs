//! Cost and stability of spreading a population over locations during an epidemic.

pub mod analysis;
pub mod config;
pub mod lambert;
pub mod manager;
pub mod model;
pub mod numdiff;
pub mod plot;
pub mod stability;
