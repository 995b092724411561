pub mod document;
pub mod numbering;
pub mod package;
pub mod styles;
pub mod xml;
