//! Values a route handler can produce.

use std::path::PathBuf;

use crate::response::Response;

/// The result of invoking a route handler.
///
/// The router does not interpret these. The HTTP output layer pattern
/// matches on them to render a response.
#[derive(Debug, Clone)]
pub enum Output {
    /// Nothing to write beyond what middlewares set.
    Empty,
    /// Plain text body.
    Text(String),
    /// Structured value, usually rendered as JSON.
    Json(serde_json::Value),
    /// Redirect directive.
    Redirect {
        /// Target location.
        location: String,
        /// Whether the redirect is permanent.
        permanent: bool,
    },
    /// Template to render with a context, left to the view subsystem.
    View {
        /// Template name.
        template: String,
        /// Template context.
        context: serde_json::Value,
    },
    /// File to stream, left to the static-file responder.
    File(PathBuf),
    /// A fully built response.
    Response(Response),
}

impl Output {
    /// Converts the output into a response, for hosts without their own
    /// view or static-file layer. Views render their context as JSON and
    /// files become a 404 since no file is read here.
    pub fn into_response(self) -> Response {
        match self {
            Self::Empty => Response::new(204),
            Self::Text(text) => Response::text(text),
            Self::Json(value) => Response::json(&value),
            Self::Redirect {
                location,
                permanent,
            } => Response::redirect(location, permanent),
            Self::View { template, context } => {
                Response::json(&context).header("X-Template", template)
            }
            Self::File(_) => Response::new(404).body("Not Found"),
            Self::Response(res) => res,
        }
    }
}

impl From<String> for Output {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Output {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Output {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Response> for Output {
    fn from(res: Response) -> Self {
        Self::Response(res)
    }
}
