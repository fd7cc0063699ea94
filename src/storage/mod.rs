pub mod dkim_tables;
pub mod key_store;
