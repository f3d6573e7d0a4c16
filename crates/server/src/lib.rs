pub mod bootstrap;
pub mod health;
pub mod routes;
pub mod twiml;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
