//! Storage writer implementations
//!
//! Contains LogWriter, FileWriter, HttpWriter and the in-memory MemoryWriter.

mod file;
mod http;
mod log;
mod memory;

pub use self::file::FileWriter;
pub use self::http::HttpWriter;
pub use self::log::LogWriter;
pub use self::memory::MemoryWriter;
