//! Request building: layered parameter resolution and the upstream payload

mod layered;
mod payload;
mod request;
mod stream_url;
mod text_stream;

pub use layered::{float_or_default, parse_float_or_default, resolve_first, LayeredSettings, SettingsLayer};
pub use payload::SynthesisPayload;
pub use request::*;
pub use stream_url::{stream_url, STREAM_PATH};
pub use text_stream::{collect_text, TextStreamError, MAX_TEXT_BYTES};
