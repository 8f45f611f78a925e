//! GitHub OAuth gate and authority
//!
//! Two cooperating services that put GitHub login in front of an origin
//! without either side keeping durable session state.
//!
//! # Architecture
//!
//! ```text
//! browser ──► gate ──(no session)──► POST authority /oauth/page-url
//!              │                          │ stores attempt (rid)
//!              │                          ▼
//!              │                     GitHub login
//!              │                          │
//!              │          authority /oauth/redirect?rid&code
//!              │                          │ exchanges code, fills attempt
//!              ▼                          ▼
//!        gate <auth_path>?rid ──► GET authority /oauth/result (consumes rid)
//!              │
//!              └─► session cookie (HS256 JWT) ─► whitelist ─► origin
//! ```
//!
//! # Modules
//!
//! - `authority`: attempt store, GitHub client and the OAuth endpoints
//! - `gate`: session codec, whitelist, authority client and origin proxy
//! - `model`: wire types shared by both sides
//! - `events`: flow event sink (tracing + metrics)
//! - `metrics`: Prometheus registry
//! - `server`: tracing setup, shutdown, the metrics endpoint and the serve loop
//! - `config`: Configuration management
//! - `error`: Error types

pub mod authority;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod metrics;
pub mod model;
pub mod server;

pub use authority::{AuthorityState, authority_router};
pub use gate::{GateState, gate_router};
