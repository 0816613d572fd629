use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::{ErrorKind, TapError, TapResult};
use crate::path::ResourcePath;
use crate::response::Response;
use crate::service::{RequestMethod, ResourceService};

/// Route one request to a service and wrap the outcome in a [`Response`].
///
/// Success codes: get → 200 with the node, post → 200 with the new id,
/// put → 201 `{"message": "updated"}`, delete → 200 `{"message": "deleted"}`.
/// Every failure becomes an error envelope; nothing escapes this function.
pub fn send_command<S>(service: &mut S, request: &str, path: &str, data: Option<Value>) -> Response
where
    S: ResourceService + ?Sized,
{
    let path = ResourcePath::parse(path);

    let result = match RequestMethod::parse(request) {
        Some(method) if service.capabilities().allows(method) => {
            debug!(method = %method, path = %path, "dispatching request");
            route(service, method, &path, data)
        }
        _ => Err(TapError::method_not_allowed(format!("verb `{request}` is not accepted")).into_anyhow()),
    };

    match result {
        Ok(res) => res,
        Err(err) => {
            let err = TapError::normalize(err);
            if err.kind == ErrorKind::GeneralError {
                warn!(error = %err, path = %path, "request failed");
            } else {
                debug!(error = %err, error.class = err.class_name(), path = %path, "request rejected");
            }
            Response::from_error(&err)
        }
    }
}

fn route<S>(service: &mut S, method: RequestMethod, path: &ResourcePath, data: Option<Value>) -> TapResult<Response>
where
    S: ResourceService + ?Sized,
{
    match method {
        RequestMethod::Get => Ok(Response::ok(service.get(path)?)),
        RequestMethod::Post => {
            let id = service.create(path, require_body(method, data)?)?;
            Ok(Response::ok(id))
        }
        RequestMethod::Put => {
            service.update(path, require_body(method, data)?)?;
            Ok(Response::new(201, json!({ "message": "updated" })))
        }
        RequestMethod::Delete => {
            service.remove(path)?;
            Ok(Response::ok(json!({ "message": "deleted" })))
        }
    }
}

fn require_body(method: RequestMethod, data: Option<Value>) -> TapResult<Value> {
    data.ok_or_else(|| TapError::bad_request(format!("{method} requires a request body")).into_anyhow())
}
