//! Client-side orchestration for ChatMate: who is signed in, which
//! conversation is active, and how OAuth redirects move between the two.

pub mod config;
pub mod errors;
pub mod gateway;
pub mod location;
pub mod models;
pub mod redirect;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
