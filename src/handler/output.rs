//! Handler return values and their coercion into responses.

use std::fmt;

use serde_json::Value;

use crate::error::{ConfigurationError, KernelError, Result};
use crate::http::Response;

/// Something that knows how to become a response.
pub trait Responsable: Send {
    fn into_response(self: Box<Self>) -> Result<Response>;
}

/// What a handler may return.
pub enum HandlerOutput {
    /// Plain output body.
    Text(String),
    /// Serialized as a JSON response.
    Json(Value),
    Response(Response),
    Responsable(Box<dyn Responsable>),
    /// No response at all; rejected during coercion.
    Nothing,
}

impl HandlerOutput {
    pub fn responsable(value: impl Responsable + 'static) -> Self {
        HandlerOutput::Responsable(Box::new(value))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HandlerOutput::Text(_) => "text",
            HandlerOutput::Json(_) => "json",
            HandlerOutput::Response(_) => "response",
            HandlerOutput::Responsable(_) => "responsable",
            HandlerOutput::Nothing => "nothing",
        }
    }

    /// Coerce into a response.
    pub fn into_response(self) -> Result<Response> {
        match self {
            HandlerOutput::Text(text) => Ok(Response::output(text)),
            HandlerOutput::Json(value) => Response::json(&value).map_err(KernelError::handler),
            HandlerOutput::Response(response) => Ok(response),
            HandlerOutput::Responsable(responsable) => responsable.into_response(),
            HandlerOutput::Nothing => Err(ConfigurationError::InvalidResponse("nothing").into()),
        }
    }
}

impl fmt::Debug for HandlerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerOutput::Text(text) => f.debug_tuple("Text").field(text).finish(),
            HandlerOutput::Json(value) => f.debug_tuple("Json").field(value).finish(),
            HandlerOutput::Response(response) => f.debug_tuple("Response").field(response).finish(),
            HandlerOutput::Responsable(_) => f.write_str("Responsable(..)"),
            HandlerOutput::Nothing => f.write_str("Nothing"),
        }
    }
}

impl From<&str> for HandlerOutput {
    fn from(text: &str) -> Self {
        HandlerOutput::Text(text.to_string())
    }
}

impl From<String> for HandlerOutput {
    fn from(text: String) -> Self {
        HandlerOutput::Text(text)
    }
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        HandlerOutput::Json(value)
    }
}

impl From<Response> for HandlerOutput {
    fn from(response: Response) -> Self {
        HandlerOutput::Response(response)
    }
}

impl From<()> for HandlerOutput {
    fn from(_: ()) -> Self {
        HandlerOutput::Nothing
    }
}
