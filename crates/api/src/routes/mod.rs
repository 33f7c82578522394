pub mod agents;
pub mod auth;
pub mod clients;
pub mod health;
pub mod invoices;
pub mod managers;
pub mod models;
pub mod payments;
pub mod portfolios;
pub mod properties;
pub mod quotes;
pub mod regions;
