pub mod access;
pub mod agents;
pub mod assignments;
pub mod billing;
pub mod clients;
pub mod error;
pub mod invoices;
pub mod managers;
pub mod payments;
pub mod pdf;
pub mod portfolio;
pub mod pricing;
pub mod properties;
pub mod quotes;
pub mod region;

#[cfg(test)]
pub mod test_utils;

pub use access::Actor;
pub use error::*;
