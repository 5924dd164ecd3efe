//! RTAI - lab exercise control client library
//!
//! Client side of a penetration-testing lab: it talks to an advisory server
//! (sessions, telemetry events, next-step suggestions) and to a local
//! execution agent (recon, history ingestion, command runs), and keeps the
//! operator's configuration and active session in a persistent store.
//!
//! # Architecture
//!
//! - `config`: layered endpoint/identity configuration
//! - `http`: request gateway with timeouts, cancellation and error mapping
//! - `clients`: typed facades for the advisory server and the agent
//! - `normalize`: tolerant extraction of suggestion fields
//! - `state`: persistent application store
//! - `health`: endpoint probes and mixed-content detection
//! - `ops`: operations that tie facades to the store
//! - `settings`, `cli`, `commands`, `render`: the command-line surface
//!
//! # Example
//!
//! ```no_run
//! use rtai::config::ConfigSources;
//! use rtai::state::AppStore;
//!
//! let store = AppStore::in_memory(ConfigSources::default());
//! println!("{}", store.config().ai_base_url);
//! ```

pub mod cli;
pub mod clients;
pub mod commands;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod normalize;
pub mod ops;
pub mod render;
pub mod settings;
pub mod state;

// Re-export commonly used types
pub use clients::{AdvisoryClient, AgentClient, ClientTimeouts};
pub use config::{ConfigKey, ResolvedConfig};
pub use error::{Result, RtaiError};
pub use ops::Operations;
pub use state::AppStore;
