pub mod header;
pub mod results;
pub mod tips;
pub mod upload_section;
pub mod utils;
