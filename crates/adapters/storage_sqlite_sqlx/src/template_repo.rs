//! `SQLite` implementation of [`TemplateRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use hrmail_app::ports::TemplateRepository;
use hrmail_domain::error::{HrMailError, NotFoundError};
use hrmail_domain::id::TemplateId;
use hrmail_domain::template::MailTemplate;

use crate::error::{StorageError, decode};

struct Wrapper(MailTemplate);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        Ok(Self(MailTemplate {
            id: id.parse().map_err(decode)?,
            title: row.try_get("title")?,
            subject: row.try_get("subject")?,
            body: row.try_get("body")?,
        }))
    }
}

/// `SQLite`-backed mail template repository.
pub struct SqliteTemplateRepository {
    pool: SqlitePool,
}

impl SqliteTemplateRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TemplateRepository for SqliteTemplateRepository {
    async fn create(&self, template: MailTemplate) -> Result<MailTemplate, HrMailError> {
        sqlx::query("INSERT INTO templates (id, title, subject, body) VALUES (?, ?, ?, ?)")
            .bind(template.id.to_string())
            .bind(&template.title)
            .bind(&template.subject)
            .bind(&template.body)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(template)
    }

    async fn get_by_id(&self, id: TemplateId) -> Result<Option<MailTemplate>, HrMailError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM templates WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn get_all(&self) -> Result<Vec<MailTemplate>, HrMailError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM templates ORDER BY title")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, template: MailTemplate) -> Result<MailTemplate, HrMailError> {
        let result = sqlx::query("UPDATE templates SET title = ?, subject = ?, body = ? WHERE id = ?")
            .bind(&template.title)
            .bind(&template.subject)
            .bind(&template.body)
            .bind(template.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError {
                entity: "MailTemplate",
                id: template.id.to_string(),
            }
            .into());
        }
        Ok(template)
    }

    async fn delete(&self, id: TemplateId) -> Result<(), HrMailError> {
        sqlx::query("DELETE FROM templates WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
