//! # Content Rotator
//!
//! A local web application that cycles images and videos drawn from
//! subreddits or user-supplied folders on a randomized timer, with a small
//! chance of serving "punishment" content instead of favorites.
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────────┐
//!  request ────▶ │ SelectionEngine  │ ────▶ ContentDescriptor
//!                └───┬──────────┬───┘
//!                    │          │
//!             remote │          │ local
//!                    ▼          ▼
//!           ┌──────────────┐ ┌──────────────┐
//!           │ ListingCache │ │ FolderCatalog│
//!           └──────┬───────┘ └──────┬───────┘
//!                  ▼                ▼
//!           ┌──────────────┐   filesystem
//!           │ Gateway      │
//!           │ (Reddit API) │
//!           └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Selection error taxonomy |
//! | [`models`] | Core data types and the wire request |
//! | [`collection`] | Collection name normalization |
//! | [`history`] | Recently-shown exclusion |
//! | [`gateway`] | Listing source trait and item filters |
//! | [`connector_reddit`] | Reddit OAuth gateway |
//! | [`listing_cache`] | Per-collection listing cache |
//! | [`catalog`] | Local folder catalog |
//! | [`selection`] | Selection engine |
//! | [`credentials`] | Credential store |
//! | [`settings`] | Settings store |
//! | [`server`] | HTTP server |
//! | [`commands`] | CLI commands |

pub mod catalog;
pub mod collection;
pub mod commands;
pub mod config;
pub mod connector_reddit;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod history;
pub mod listing_cache;
pub mod models;
pub mod selection;
pub mod server;
pub mod settings;
