pub mod chat;
pub mod events;
pub mod models;
pub mod persona;
pub mod transcript;
