// HTTP routers
pub mod api;

// Bearer token extraction for admin endpoints
pub mod auth;

// Booking log
pub mod bookings;

// Calendar provider client
pub mod calendar;

pub mod config;

// Encrypted per-tenant credential storage
pub mod credentials;

// Natural-language date and time parsing
pub mod datetime;

// Single default calendar credential
pub mod default_client;

pub mod identity;

// OAuth provider flow and CSRF state
pub mod oauth;

// Tenant-or-default client selection
pub mod resolver;

pub mod tenant;

// Voice agent tools
pub mod tools;

#[cfg(test)]
mod testing;
