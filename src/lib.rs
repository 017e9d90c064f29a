pub mod config;
pub mod controller;
pub mod messages;
pub mod motor;
pub mod runtime;
