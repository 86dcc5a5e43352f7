pub mod common;
pub mod enums;
pub mod form;
pub mod message;
pub mod portal;
pub mod submission;
