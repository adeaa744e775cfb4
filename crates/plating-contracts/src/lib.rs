pub mod artifacts;
pub mod chat;
pub mod events;
pub mod resources;
pub mod transcript;
