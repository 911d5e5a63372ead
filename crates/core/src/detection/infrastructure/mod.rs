pub mod math;
pub mod model_resolver;
pub mod onnx_blazeface_detector;
pub mod template_tracker;
