pub mod model;
pub mod orm;
pub mod repository;
pub mod session;
