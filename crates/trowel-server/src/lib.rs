//! Development server for trowel projects.
//!
//! Watches the asset sources, reruns the owning pipeline on every change and
//! pushes live-reload messages to connected browsers over a WebSocket.

pub mod orchestrator;
pub mod reload;
pub mod server;
pub mod watcher;

pub use orchestrator::{AfterRun, Orchestrator, Subscription, SubscriptionRegistry};
pub use reload::{client_script, HubNotifier, ReloadHub, ReloadMessage};
pub use server::{inject_script, DevServer, DevServerConfig, ServerError};
pub use watcher::{existing_roots, FileWatcher, WatchEvent};
