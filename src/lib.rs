// Wall-clock seam
pub mod clock;

// Error taxonomy
pub mod error;

// Process configuration
pub mod config;

// Credential record and durable store
pub mod credentials;

// Expiring response cache
pub mod cache;

// Provider OAuth and Web API clients
pub mod provider;

// Rate-limit aware call execution
pub mod resilience;

// Credential lifecycle manager
pub mod auth;

// HTTP APIs
pub mod api;
