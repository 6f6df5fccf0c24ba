pub mod health;
pub mod tokens;
