pub mod image_sequence_source;
pub mod test_pattern_source;
