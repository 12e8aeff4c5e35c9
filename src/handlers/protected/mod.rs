// handlers/protected/mod.rs - Protected handlers (session required)
//
// Security Level: JWT from the `token` cookie or an `Authorization: Bearer` header
// Middleware: jwt_auth_middleware injects `Extension<AuthUser>`
// Ownership: every app and resource group lookup is scoped to the caller

pub mod apps;           // /api/apps
pub mod auth;           // /api/auth/me, /api/auth/azure/*
pub mod deploy;         // /api/deploy/*
pub mod monitor;        // /api/monitor/:appId
pub mod resource_group; // /api/resourceGroup/*
pub mod subscription;   // /api/subscription
