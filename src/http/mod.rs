//! HTTP API module for Biograph
//!
//! Provides read-only REST endpoints for:
//! - Entity and event search with pagination
//! - Single entity retrieval by encoded id
//! - Date histograms, occupation trees and entity-type counts

pub mod server;

pub use server::{create_server, start_server, status_for, ApiError, AppState, ErrorResponse, SuccessResponse};
