//! Mail transport port — where rendered mail leaves the system.

use std::future::Future;

use hrmail_domain::error::HrMailError;
use hrmail_domain::mail::OutgoingMail;

/// Delivers rendered mail.
///
/// Implementations report delivery problems as [`HrMailError::Transport`].
pub trait MailTransport {
    fn send(&self, mail: OutgoingMail) -> impl Future<Output = Result<(), HrMailError>> + Send;
}
