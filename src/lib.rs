pub mod actor;
pub mod capture;
pub mod common;
pub mod input;
pub mod model;
pub mod replay;
pub mod session;
pub mod sys;
