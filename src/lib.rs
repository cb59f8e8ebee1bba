pub mod api;
pub mod cli;
pub mod core;
pub mod mail;
pub mod models;
pub mod resource;
