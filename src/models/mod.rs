pub mod cell;
pub mod table;

pub use cell::CellValue;
pub use table::*;
