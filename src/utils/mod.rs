pub mod dates;
pub mod logging;
pub mod numbers;

pub use dates::{format_date, normalize_period, parse_date, quarter_label};
pub use numbers::{parse_numeric, Numeric};
