//! ONNX Runtime integration.

mod session;

pub use session::load_session;
