//! Headless placement runner for scripted play and CI verification.
//!
//! This crate drives the placement engine from JSON commands on stdin, with
//! responses on stdout. This enables:
//!
//! - **Scripted testing**: A controller can place, drag and swap buildings
//!   without a renderer
//! - **CI verification**: Automated checks of placement rules and determinism
//! - **Replay verification**: Check that a command script always produces the
//!   same board
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from the controller (pointer events, ticks, queries)
//! - **stdout**: Responses, notifications and state (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See [`protocol`] module for the full command and response set.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"query"}' | cargo run -p td_headless
//!
//! # Run a scenario
//! cargo run -p td_headless -- run --scenario assets/scenarios/meadow.ron
//!
//! # Verify a command script is deterministic
//! cargo run -p td_headless -- verify --script session.jsonl --runs 5
//! ```

pub mod protocol;
pub mod runner;
pub mod scenario;

pub use protocol::{Command, Response};
pub use runner::{verify_script, HeadlessConfig, HeadlessRunner, VerifyReport};
pub use scenario::{Scenario, ScenarioError};
