pub mod account_service;
pub mod auth;
pub mod links;
pub mod notifier;
pub mod password;
pub mod token_service;
