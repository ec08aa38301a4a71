pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod movie_params;
}

pub mod movie {
    pub mod domain {
        pub mod movie_encoder;
        pub mod movie_writer_registry;
    }
    pub mod infrastructure;
}

pub mod graphics {
    pub mod domain {
        pub mod flush_mode;
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod record_movie_use_case;
}
