pub mod relay_client;
pub mod sessions;
pub mod webflow;

pub use relay_client::HttpCleanerBackend;
pub use sessions::InMemorySessionStore;
pub use webflow::WebflowClient;
