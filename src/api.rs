mod helper;

pub mod admin;
pub mod student;
pub mod tutor;
