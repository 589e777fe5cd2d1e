//! Mãos Amigas client core.
//!
//! Headless implementation of the Mãos Amigas web client: registration
//! forms with auto-save and first-phase identity resolution, the social
//! worker's approval panel, the professional profile editor and the
//! checkout simulator. Rendering is left to the embedding shell; the
//! controllers here own state, validation and every backend call.
//!
//! # Modules
//!
//! - `core`: Domain rules (validation, formatting, models, payloads).
//! - `integrations`: Backend REST client and ViaCEP lookups.
//! - `screens`: Screen controllers.
//! - `obs`: Observability and logging.
//! - `autosave`: Debounced draft persistence.
//! - `client_store`: Typed owner of every local-storage key.
//! - `config`: Configuration management.
//! - `context`: Shared dependencies for controllers.
//! - `draft_validator`: Checksummed draft envelopes.
//! - `errors`: Error handling types.
//! - `notices`: Toast notices.
//! - `sequencer`: Latest-request-wins tickets.
//! - `storage`: Key-value storage backends.

pub mod core;
pub mod integrations;
pub mod obs;
pub mod screens;

// Re-export primary modules for shared use in tests and other binaries
pub mod approval;
pub mod autosave;
pub mod backend;
pub mod client_store;
pub mod config;
pub mod context;
pub mod draft_validator;
pub mod errors;
pub mod formatters;
pub mod models;
pub mod navigation;
pub mod notices;
pub mod payload;
pub mod payment;
pub mod profile;
pub mod registration;
pub mod sequencer;
pub mod storage;
pub mod validation;
pub mod viacep;
