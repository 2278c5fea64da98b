pub mod fields;
pub mod filter;

pub use filter::{
    translator_for, BackendKind, DiscoveryTranslator, FilterTranslator, LuceneTranslator,
};
