pub mod cars;
pub mod health;
pub mod orders;
pub mod reviews;
pub mod users;
