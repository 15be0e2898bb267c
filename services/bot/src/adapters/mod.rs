pub mod db;
pub mod dispatcher;
pub mod registration;
pub mod store;

pub use db::PgSessionStore;
pub use dispatcher::{LogDispatcher, WebhookDispatcher};
pub use registration::HttpRegistrationClient;
pub use store::connect_session_store;
