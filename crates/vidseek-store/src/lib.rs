//! Store adapters behind the core `VectorStore` and `VideoCatalog` traits.

pub mod catalog;
pub mod lance;
pub mod schema;
pub mod table;

pub use catalog::SqliteCatalog;
pub use lance::LanceVectorStore;
