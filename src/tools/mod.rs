pub mod dispatch;
pub mod executor;
pub mod safety;
pub mod schema;
