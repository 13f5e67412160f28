pub mod account_repo;
pub use account_repo::{AccountRepository, PgAccountRepository};

#[cfg(test)]
pub mod memory_repo;
#[cfg(test)]
pub use memory_repo::InMemoryAccountRepository;
