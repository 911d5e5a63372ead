pub mod annotating_frame_sink;
pub mod fan_out_sink;
pub mod log_overlay_sink;
