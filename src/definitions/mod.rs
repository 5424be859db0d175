pub mod form_line;
pub mod helpers;
pub mod request;
pub mod response;

pub use form_line::{FormLine, FormLineDescriptor, GroupTag, LineType, Validation};
pub use request::{Action, Payload};
pub use response::{Classification, Response, SessionError, SessionErrorKind, WizardStep};
