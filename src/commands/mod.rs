pub mod comment;
pub mod create;
pub mod eval;
pub mod init;
pub mod list;
pub mod project;
pub mod show;
pub mod update;
