pub mod repository;
pub mod repository_sqlx;

pub use repository::InstrumentStore;
pub use repository_sqlx::SqlxInstrumentStore;
