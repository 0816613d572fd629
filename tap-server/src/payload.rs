use serde::Deserialize;
use validator::Validate;

use crate::entity::EntityRef;

pub(crate) const PAYLOAD_MESSAGE: &str = "Payload validation failed";

/// POST body: `{"name": "...", "from": {"type": "channels", "id": "..."}}`.
///
/// `from` may only be left out when creating a root entity.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePayload {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: Option<String>,
    pub from: Option<EntityRef>,
}

/// PUT body: `{"name": "..."}`.
#[derive(Debug, Deserialize, Validate)]
pub struct RenamePayload {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,
}
