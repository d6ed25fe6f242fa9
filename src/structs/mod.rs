mod observation;
mod period;
mod time_index;
mod time_series;
mod window;

pub use observation::{deserialize_date_time, format_time, from_unix, parse_time, Observation, FORMAT};
pub use period::Period;
pub use time_index::{Snapshot, TimeIndex};
pub use time_series::{project, AssetSeries, TimeSeries};
pub use window::{Navigation, Window};
