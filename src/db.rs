pub mod daily_repository;
pub mod error;
pub mod pool;
pub mod sql;
pub mod station_repository;

pub use daily_repository::{DailyRepository, RecordFilter, SlotQuery, WritePolicy};
pub use error::DbError;
pub use pool::DbPool;
pub use station_repository::StationRepository;
