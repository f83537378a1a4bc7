pub mod codec;
pub mod evaluator;
pub mod history;
pub mod models;
pub mod store;
pub mod watchdog;

pub use evaluator::{AlertSet, Status, Thresholds};
pub use models::{DeviceEvent, DeviceInfo, HistoryRecord, Reading};
pub use store::{Applied, DeviceSnapshot, DeviceStore, StoreOptions};
