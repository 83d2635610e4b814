mod block_source;
mod repository;

pub use block_source::*;
pub use repository::*;
