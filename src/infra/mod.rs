pub mod ridesystems;
