//! Purple.
//!
//! A command line client for the Purple Music backend. It exercises the same request
//! coordination that the application uses, so repeated or concurrent requests for the same
//! resource reach the backend only once.

#![warn(
    missing_docs,
    missing_debug_implementations,
    unused_crate_dependencies,
    clippy::all
)]

mod cli;
mod logging;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
