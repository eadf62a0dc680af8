pub mod assets;
pub mod auth;
pub mod manifest;
pub mod server;
