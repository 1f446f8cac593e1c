pub mod channel;
pub mod client;
pub mod events;
pub mod models;
pub mod stomp;
