pub mod dump_header;
pub mod info;
pub mod merge_header;
pub mod sex_to_region;

pub use dump_header::{dump_header, DumpOptions};
pub use info::print_info;
pub use merge_header::merge_header;
pub use sex_to_region::sex_to_region;
