mod create_admin;
mod show_config;

pub use create_admin::cmd_create_admin;
pub use show_config::cmd_show_config;
