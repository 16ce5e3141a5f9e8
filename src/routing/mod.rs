pub mod decompose;
pub mod pipeline;
pub mod router;

pub use router::Router;
