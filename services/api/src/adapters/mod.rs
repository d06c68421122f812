pub mod db;
pub mod http;
pub mod settings;

pub use db::DbAdapter;
pub use http::ReqwestTransport;
pub use settings::JsonSettingsStore;
