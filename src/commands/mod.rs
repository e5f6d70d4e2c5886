pub mod console;
pub mod feed;
pub mod health;
pub mod preferences;
