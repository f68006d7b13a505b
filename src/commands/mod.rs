pub mod daily;
pub mod evaluation;
pub mod recommend;
pub mod users;
