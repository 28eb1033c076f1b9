pub mod cons3rt_admin;
pub mod process_runner;
pub mod system_commands;

pub use cons3rt_admin::{AdminCredentials, Cons3rtAdmin, Cons3rtProject, Cons3rtUser};
pub use process_runner::{ensure_success, CommandRunner, ProcessRunner};
pub use system_commands::{ServiceAction, SystemCommands};
