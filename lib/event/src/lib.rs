mod macros;
mod metric;

pub use metric::{FieldValue, Metric};
