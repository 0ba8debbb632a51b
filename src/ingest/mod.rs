pub mod line_source;
pub mod pool;
