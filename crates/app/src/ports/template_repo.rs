//! Template repository port.

use std::future::Future;

use hrmail_domain::error::HrMailError;
use hrmail_domain::id::TemplateId;
use hrmail_domain::template::MailTemplate;

/// Repository for persisting and querying [`MailTemplate`]s.
pub trait TemplateRepository {
    fn create(
        &self,
        template: MailTemplate,
    ) -> impl Future<Output = Result<MailTemplate, HrMailError>> + Send;

    fn get_by_id(
        &self,
        id: TemplateId,
    ) -> impl Future<Output = Result<Option<MailTemplate>, HrMailError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<MailTemplate>, HrMailError>> + Send;

    fn update(
        &self,
        template: MailTemplate,
    ) -> impl Future<Output = Result<MailTemplate, HrMailError>> + Send;

    fn delete(&self, id: TemplateId) -> impl Future<Output = Result<(), HrMailError>> + Send;
}
