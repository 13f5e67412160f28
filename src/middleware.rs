pub mod auth;
pub mod tenancy;
pub mod tenant_router;
