pub mod database;
pub mod dispatch;
pub mod export;
pub mod field_schema;
pub mod intake;
pub mod publisher;
pub mod puller;
