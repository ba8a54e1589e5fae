//! Standard instruction library
//!
//! Collection of built-in instructions for common operations

mod debug;
mod http;
mod math;
mod text;
mod time;
mod transform;

pub use debug::DebugLog;
pub use http::HttpFetch;
pub use math::{Add, Increment};
pub use transform::{JsonParse, JsonStringify};

use piperuntime::InstructionRegistry;

/// Ids of every instruction `register_all` installs
pub mod ids {
    pub use crate::debug::ID as DEBUG_LOG;
    pub use crate::http::FETCH_ID as HTTP_FETCH;
    pub use crate::math::ADD_ID as MATH_ADD;
    pub use crate::text::{APPEND_ID as TEXT_APPEND, CONCAT_ID as TEXT_CONCAT};
    pub use crate::time::DELAY_ID as TIME_DELAY;
    pub use crate::transform::{PARSE_ID as JSON_PARSE, STRINGIFY_ID as JSON_STRINGIFY};
}

/// Register all standard instructions with a registry
pub fn register_all(registry: &mut InstructionRegistry) {
    registry.register(debug::instruction());
    registry.register(http::fetch());
    registry.register(math::add());
    registry.register(text::concat());
    registry.register(text::append());
    registry.register(time::delay_instruction());
    registry.register(transform::json_parse());
    registry.register(transform::json_stringify());
}
