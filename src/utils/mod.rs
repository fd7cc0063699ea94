pub mod dkim;
pub mod ownership;
#[allow(clippy::module_inception)]
pub mod utils;
