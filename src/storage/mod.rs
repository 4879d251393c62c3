//! Durable storage: encrypted alert records and the startup intel corpus.

mod alerts;
mod corpus;

pub use alerts::{AlertStore, StoredAlert};
pub use corpus::load_corpus;
