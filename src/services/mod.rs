// services/mod.rs - Workflows shared by handlers and the CLI
//
// Handlers parse requests and shape responses; everything that talks to both
// the store and Azure lives here.

pub mod azure_session;
pub mod budget;
pub mod bundle;
pub mod deploy;
pub mod monitor;
pub mod sync;
pub mod web_app;
