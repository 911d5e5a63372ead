pub mod camera {
    pub mod capture_session;
    pub mod switch_controller;
    pub mod domain {
        pub mod camera_input;
        pub mod camera_position;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
        pub mod face_tracker;
        pub mod tracking_request;
        pub mod tracking_state;
    }
    pub mod infrastructure;
}

pub mod overlay {
    pub mod overlay_renderer;
    pub mod domain {
        pub mod label_layout;
        pub mod overlay_sink;
        pub mod overlay_state;
        pub mod preview_transform;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod capture_loop;
    pub mod frame_processor;
    pub mod pipeline_logger;
    pub mod infrastructure {
        pub mod sequential_capture_loop;
        pub mod threaded_capture_loop;
    }
}

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod orientation;
    pub mod region;
}
