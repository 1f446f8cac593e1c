pub mod api;
pub mod app;
pub mod error;
pub mod identity;
pub mod storage;
pub mod store;
pub mod ui;
pub mod utils;
