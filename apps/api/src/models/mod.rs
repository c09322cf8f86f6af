pub mod conversation;
pub mod resume;
pub mod update;
