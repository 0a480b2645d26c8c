//! Output: pages, their Markdown/JSON rendering and SVG charts.

pub mod charts;
pub mod declutter;
pub mod generator;
pub mod page;

pub use generator::render;
pub use page::{format_value, Level, Page, Status};
