use std::process::ExitCode;

mod advisory;
mod allocator;
mod app;
mod cli;
mod config;
mod hook;
mod logger;
mod prompt;


fn main() -> ExitCode {
    app::main()
}
