//! Document store - content staging for pipeline input files

mod documents;
mod schema;

pub use documents::DocumentStore;
