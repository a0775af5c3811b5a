pub mod config;
pub mod lifecycle;
pub mod respond;
pub mod wait;
