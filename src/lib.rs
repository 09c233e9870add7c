pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod proxy;
pub mod routes;
pub mod sse;
pub mod state;
