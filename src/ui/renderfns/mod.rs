pub mod header;
pub mod status_bar;
pub mod utils;

pub use header::{draw_header, HeaderInfo};
pub use status_bar::draw_status_bar;
pub use utils::{field_text, status_color, truncate};
