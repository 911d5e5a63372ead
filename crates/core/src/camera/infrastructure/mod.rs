pub mod image_sequence_input;
pub mod video_file_input;
