pub mod access_log;
pub mod validated_json;

pub use access_log::access_log;
pub use validated_json::ValidatedJson;
