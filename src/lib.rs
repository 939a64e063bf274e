pub mod booking;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod mailer;
pub mod models;
pub mod routes;
pub mod scheduling;
pub mod store;

#[cfg(test)]
pub mod testutil;
