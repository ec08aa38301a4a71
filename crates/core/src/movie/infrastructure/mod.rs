pub mod encoder_factory;
pub mod encoder_options;
pub mod ffmpeg_movie_encoder;
