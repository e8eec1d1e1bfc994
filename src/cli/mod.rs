//! # CLI Module
//!
//! Command-line front end for the dispatcher, driven by a descriptor file
//! (see [`crate::descriptor`]).
//!
//! ## Commands
//!
//! ### `dispatch`
//!
//! Route a single request and print the outcome as JSON:
//!
//! ```bash
//! subrouter dispatch --descriptor routes.yaml GET /users/42/orders
//! ```
//!
//! ### `routes`
//!
//! Print every registered `(class, method, template)` row:
//!
//! ```bash
//! subrouter routes --descriptor routes.yaml
//! ```
//!
//! ### `serve`
//!
//! Read `METHOD PATH` lines from stdin, dispatch each one on a coroutine and
//! print one JSON outcome per line. `--watch` redeploys when the descriptor
//! changes:
//!
//! ```bash
//! printf 'GET /a\nOPTIONS /b\n' | subrouter serve --descriptor routes.yaml --watch
//! ```

mod commands;


pub use commands::{run_cli, run_command, Cli, Commands};
