pub mod domain_resolver;
pub mod sources;
