pub mod digest;
pub mod service;
pub mod transport;
pub mod types;

pub use service::Publisher;
pub use transport::{ChunkTransport, HttpChunkTransport};
pub use types::{DigestAlgorithm, PublishReport, PublishState};
