mod materialize;
mod result_set;
mod row;

pub use materialize::materialize;
pub use result_set::ResultValue;
pub use row::{
    READER_PLACEHOLDER, ResolvedColumn, Row, build_row, format_time, format_timestamp, normalize,
};
