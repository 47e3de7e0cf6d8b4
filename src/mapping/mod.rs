pub mod design;
pub mod generator;
pub mod json_path;
