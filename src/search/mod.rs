//! Inbound search indexing pipeline (spec §4.5, C6).

pub mod autocomplete;
pub mod facets;
pub mod handlers;
pub mod index_store;
pub mod keys;
pub mod tokenizer;

pub use autocomplete::Autocomplete;
pub use facets::{FacetDimension, Facets};
pub use index_store::IndexStore;
