// handlers/mod.rs - Two-tier handler layout
//
// Public (no session, or a webhook authKey) → Protected (session JWT)

pub mod protected;
pub mod public;
