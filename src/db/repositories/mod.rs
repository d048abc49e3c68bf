pub mod account;
pub mod activity;
pub mod renewal;
pub mod session;
pub mod settings;
