//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Health and service description handlers.
pub mod health;
/// Research run handlers.
pub mod research;
