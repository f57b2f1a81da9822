pub mod admin;
pub mod auth;
pub mod cases;
pub mod catalogs;
pub mod reports;
pub mod victims;
