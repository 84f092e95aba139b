pub mod commands;
pub mod error;
pub mod fits;
pub mod header;
pub mod logging;
pub mod lookup;
pub mod region;
pub mod sextractor;
pub mod utils;

// Re-export commonly used items
pub use fits::{FitsFile, Hdu, HduSummary, PrimaryHeaderEditor};
pub use header::{Card, Header, Value};
pub use lookup::{KeySearch, Lookup};
