// handlers/public/mod.rs - Public handlers (no session required)
//
// Security Level: None, or a shared `authKey` for Azure webhooks
// Routes: /api/auth/{register,login,logout}, budget webhooks

pub mod auth;    // Session acquisition
pub mod webhook; // budget-exceed and check-budgets

pub use auth::*;
pub use webhook::*;
