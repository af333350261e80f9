//! Wire types. Everything serializes camelCase; the client module
//! deserializes the same structs.

pub mod auth;
pub mod customer;
pub mod invoice;
pub mod location;
pub mod note;
pub mod provider;
pub mod resource;
pub mod user;
pub mod work_order;

pub use auth::{LoginRequest, TokenResponse};
pub use customer::{CreateCustomerRequest, CustomerResponse, UpdateCustomerRequest};
pub use invoice::{CreateInvoiceRequest, InvoiceResponse, UpdateInvoiceRequest};
pub use location::{LocationResponse, LocationUpdate};
pub use note::{CreateNoteRequest, NoteResponse};
pub use provider::{CreateProviderRequest, ProviderResponse, UpdateProviderRequest};
pub use resource::ResourceResponse;
pub use user::{CreateUserRequest, UpdateUserRequest, UserResponse};
pub use work_order::{CreateWorkOrderRequest, UpdateWorkOrderRequest, WorkOrderResponse};

use validator::ValidationError;

/// Ids supplied by clients end up in URLs and file paths.
pub(crate) fn validate_client_id(id: &str) -> Result<(), ValidationError> {
    let ok = !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        let mut err = ValidationError::new("id");
        err.message =
            Some("id must be 1-64 characters of letters, digits, '-' or '_'".into());
        Err(err)
    }
}

pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_are_url_safe() {
        assert!(validate_client_id("wo42").is_ok());
        assert!(validate_client_id("tmp-3f2a_b").is_ok());
        assert!(validate_client_id("").is_err());
        assert!(validate_client_id("../etc").is_err());
        assert!(validate_client_id(&"a".repeat(65)).is_err());
    }
}
