//! Thin CLI entrypoint that delegates to the library implementation.

use std::process;

fn main() {
    process::exit(pine_tokens_cli::run());
}
