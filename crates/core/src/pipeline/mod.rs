pub mod error;
pub mod process_image_use_case;
