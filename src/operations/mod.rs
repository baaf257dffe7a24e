pub mod loader;
pub mod merger;
pub mod persister;
