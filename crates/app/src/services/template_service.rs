//! Template service — use-cases for managing mail templates.

use std::sync::Arc;

use hrmail_domain::error::{HrMailError, NotFoundError};
use hrmail_domain::id::TemplateId;
use hrmail_domain::template::MailTemplate;

use crate::ports::TemplateRepository;
use crate::render::MailRenderer;

/// Application service for template CRUD.
pub struct TemplateService<R> {
    repo: Arc<R>,
}

impl<R: TemplateRepository> TemplateService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Store a new template after checking its fields and syntax.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::Validation`] if a field is blank or a source
    /// does not parse, or a storage error from the repository.
    #[tracing::instrument(skip(self, template), fields(template_title = %template.title))]
    pub async fn create_template(&self, template: MailTemplate) -> Result<MailTemplate, HrMailError> {
        check(&template)?;
        self.repo.create(template).await
    }

    /// Look up a template by id.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::NotFound`] when no template with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_template(&self, id: TemplateId) -> Result<MailTemplate, HrMailError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "MailTemplate",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all templates.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_templates(&self) -> Result<Vec<MailTemplate>, HrMailError> {
        self.repo.get_all().await
    }

    /// Replace an existing template.
    ///
    /// # Errors
    ///
    /// Same as [`create_template`](Self::create_template), plus
    /// [`HrMailError::NotFound`] when the template does not exist.
    #[tracing::instrument(skip(self, template), fields(template_id = %template.id))]
    pub async fn update_template(&self, template: MailTemplate) -> Result<MailTemplate, HrMailError> {
        check(&template)?;
        self.repo.update(template).await
    }

    /// Delete a template by id.
    ///
    /// Rules still pointing at it fail at dispatch time with a notice.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::NotFound`] if the template does not exist, or
    /// a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_template(&self, id: TemplateId) -> Result<(), HrMailError> {
        self.get_template(id).await?;
        self.repo.delete(id).await
    }
}

fn check(template: &MailTemplate) -> Result<(), HrMailError> {
    template.validate()?;
    if let Some(subject) = &template.subject {
        MailRenderer::check(subject)?;
    }
    MailRenderer::check(&template.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryTemplateRepo;
    use hrmail_domain::error::ValidationError;

    fn make_service() -> TemplateService<InMemoryTemplateRepo> {
        TemplateService::new(Arc::new(InMemoryTemplateRepo::default()))
    }

    #[tokio::test]
    async fn should_create_and_fetch_template() {
        let svc = make_service();
        let template = MailTemplate::new("Welcome", "<p>Hi {{instance.first_name}}</p>")
            .with_subject("Welcome {{instance.first_name}}");
        let id = template.id;

        svc.create_template(template).await.unwrap();
        let fetched = svc.get_template(id).await.unwrap();
        assert_eq!(fetched.title, "Welcome");
        assert_eq!(svc.list_templates().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_reject_template_with_broken_syntax() {
        let svc = make_service();
        let template = MailTemplate::new("Broken", "{{#each instance.assigned_to}}");
        let result = svc.create_template(template).await;
        assert!(matches!(
            result,
            Err(HrMailError::Validation(ValidationError::InvalidTemplate(_)))
        ));
    }

    #[tokio::test]
    async fn should_reject_broken_subject() {
        let svc = make_service();
        let template = MailTemplate::new("Broken subject", "body").with_subject("{{/if}}");
        assert!(svc.create_template(template).await.is_err());
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_template() {
        let svc = make_service();
        assert!(matches!(
            svc.get_template(TemplateId::new()).await,
            Err(HrMailError::NotFound(_))
        ));
        assert!(matches!(
            svc.delete_template(TemplateId::new()).await,
            Err(HrMailError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_update_existing_template() {
        let svc = make_service();
        let mut template = svc
            .create_template(MailTemplate::new("Welcome", "v1"))
            .await
            .unwrap();
        template.body = "v2".to_string();

        let updated = svc.update_template(template).await.unwrap();
        assert_eq!(updated.body, "v2");
    }
}
