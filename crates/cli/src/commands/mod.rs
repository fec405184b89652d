pub mod config_cmd;
pub mod run;
pub mod snapshot;
pub mod tools;
