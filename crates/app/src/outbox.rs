//! In-process mail transport that keeps the most recent mails.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use hrmail_domain::error::HrMailError;
use hrmail_domain::mail::OutgoingMail;

use crate::ports::MailTransport;

/// [`MailTransport`] that logs every mail and retains the last `capacity`.
///
/// Stands in for an SMTP backend; the HTTP API exposes its content.
#[derive(Debug)]
pub struct Outbox {
    capacity: usize,
    mails: Mutex<VecDeque<OutgoingMail>>,
}

impl Outbox {
    /// Create an outbox keeping at most `capacity` mails (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            mails: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Retained mails, newest first.
    #[must_use]
    pub fn recent(&self) -> Vec<OutgoingMail> {
        self.lock().iter().rev().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<OutgoingMail>> {
        self.mails.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MailTransport for Outbox {
    fn send(&self, mail: OutgoingMail) -> impl Future<Output = Result<(), HrMailError>> + Send {
        tracing::info!(
            rule_id = %mail.rule_id,
            record_id = %mail.record_id,
            to = %mail.to,
            cc = mail.cc.len(),
            attachments = mail.attachments.len(),
            subject = %mail.subject,
            "mail sent"
        );
        let mut mails = self.lock();
        if mails.len() == self.capacity {
            mails.pop_front();
        }
        mails.push_back(mail);
        async { Ok(()) }
    }
}
