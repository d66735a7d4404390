pub mod db;
pub mod ids;
pub mod search;

pub use db::DbAdapter;
pub use ids::TimetableIdCodec;
pub use search::SearchIndexAdapter;
