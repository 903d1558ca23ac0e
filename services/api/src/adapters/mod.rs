pub mod classifier;
pub mod db;
pub mod memory;
pub mod oracle_llm;

pub use classifier::HttpClassifierAdapter;
pub use db::DbAdapter;
pub use memory::MemoryStore;
pub use oracle_llm::OpenAiOracleAdapter;
