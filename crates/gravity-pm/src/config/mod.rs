//! Configuration and credential storage for the installer
//!
//! The installer keeps a single JSON file per user, `~/.config/gravity.json`
//! (overridable with `GRAVITY_CONFIG`). It is created with `{}` on first run.
//!
//! # gravity.json format
//!
//! ```json
//! {
//!     "licenseKey": "xxxx-xxxx",
//!     "registryUrl": "https://repobox.io",
//!     "package": "@compy/gravity-lite"
//! }
//! ```
//!
//! Only `licenseKey` is normally present; the other keys fall back to the
//! public registry and the default skeleton package.

mod auth;
mod config;
mod source;

pub use auth::{authority_of, BearerCredential};
pub use config::{GravityConfig, DEFAULT_PACKAGE, DEFAULT_REGISTRY_URL};
pub use source::{ConfigStore, CONFIG_ENV};
