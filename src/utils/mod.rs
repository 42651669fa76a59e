mod maths_utils;
mod time_utils;

pub use time_utils::{TimeUtils, epoch_ms_to_utc, format_duration};

pub(crate) use maths_utils::{get_max, mean_and_stddev, remap_clamped};
