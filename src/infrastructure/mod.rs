pub mod cdp_document;
pub mod js_executor;

pub use cdp_document::{CdpDocument, CdpHandle};
pub use js_executor::JsExecutor;
