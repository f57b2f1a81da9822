pub mod auth_service;
pub mod case_service;
pub mod report_service;
pub mod user_service;
pub mod victim_service;
