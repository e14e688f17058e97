pub mod config_cmd;
pub mod info_cmd;
pub mod inspect_cmd;
pub mod lookup_cmd;

pub use config_cmd::cmd_config;
pub use info_cmd::cmd_info;
pub use inspect_cmd::cmd_inspect;
pub use lookup_cmd::cmd_lookup;
