mod extract;
mod outline;
mod run;

pub use extract::extract_command;
pub use run::run_command;
