//! `SQLite` implementation of [`RuleRepository`].

use std::collections::BTreeSet;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use hrmail_app::ports::RuleRepository;
use hrmail_domain::automation::{AutomationRule, Condition, Trigger};
use hrmail_domain::error::{HrMailError, NotFoundError};
use hrmail_domain::id::{RuleId, TemplateId};
use hrmail_domain::schema::ModelKey;

use crate::error::{StorageError, decode};

struct Wrapper(AutomationRule);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<AutomationRule> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let title: String = row.try_get("title")?;
        let target_model: String = row.try_get("target_model")?;
        let trigger: String = row.try_get("trigger_kind")?;
        let condition: String = row.try_get("condition")?;
        let recipients_json: String = row.try_get("recipient_paths")?;
        let also_sent_to_json: String = row.try_get("also_sent_to")?;
        let template_id: String = row.try_get("template_id")?;
        let attachments_json: String = row.try_get("attachment_template_ids")?;
        let active: bool = row.try_get("active")?;
        let created_at: String = row.try_get("created_at")?;

        let id: RuleId = id.parse().map_err(decode)?;
        let target_model = ModelKey::parse(&target_model).map_err(decode)?;
        let trigger: Trigger = trigger
            .parse()
            .map_err(|err: String| sqlx::Error::Decode(err.into()))?;
        let condition = Condition::parse(&condition).map_err(decode)?;
        let recipient_paths: Vec<String> =
            serde_json::from_str(&recipients_json).map_err(decode)?;
        let also_sent_to: Vec<String> = serde_json::from_str(&also_sent_to_json).map_err(decode)?;
        let template_id: TemplateId = template_id.parse().map_err(decode)?;
        let attachment_template_ids: BTreeSet<TemplateId> =
            serde_json::from_str(&attachments_json).map_err(decode)?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.to_utc())
            .map_err(decode)?;

        Ok(Self(AutomationRule {
            id,
            title,
            target_model,
            trigger,
            condition,
            recipient_paths,
            also_sent_to,
            template_id,
            attachment_template_ids,
            active,
            created_at,
        }))
    }
}

/// Columns of a rule as bound into an `INSERT` or `UPDATE`.
struct Columns {
    condition: String,
    recipient_paths: String,
    also_sent_to: String,
    attachment_template_ids: String,
    created_at: String,
}

impl Columns {
    fn encode(rule: &AutomationRule) -> Result<Self, StorageError> {
        Ok(Self {
            condition: rule.condition.to_query_string(),
            recipient_paths: serde_json::to_string(&rule.recipient_paths)?,
            also_sent_to: serde_json::to_string(&rule.also_sent_to)?,
            attachment_template_ids: serde_json::to_string(&rule.attachment_template_ids)?,
            created_at: rule.created_at.to_rfc3339(),
        })
    }
}

/// `SQLite`-backed rule repository.
pub struct SqliteRuleRepository {
    pool: SqlitePool,
}

impl SqliteRuleRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RuleRepository for SqliteRuleRepository {
    async fn create(&self, rule: AutomationRule) -> Result<AutomationRule, HrMailError> {
        let columns = Columns::encode(&rule)?;

        sqlx::query(
            "INSERT INTO rules (id, title, target_model, trigger_kind, condition, recipient_paths, also_sent_to, template_id, attachment_template_ids, active, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(rule.id.to_string())
        .bind(&rule.title)
        .bind(rule.target_model.as_str())
        .bind(rule.trigger.to_string())
        .bind(&columns.condition)
        .bind(&columns.recipient_paths)
        .bind(&columns.also_sent_to)
        .bind(rule.template_id.to_string())
        .bind(&columns.attachment_template_ids)
        .bind(rule.active)
        .bind(&columns.created_at)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(rule)
    }

    async fn get_by_id(&self, id: RuleId) -> Result<Option<AutomationRule>, HrMailError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM rules WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<AutomationRule>, HrMailError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM rules ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn get_active(&self) -> Result<Vec<AutomationRule>, HrMailError> {
        let rows: Vec<Wrapper> =
            sqlx::query_as("SELECT * FROM rules WHERE active = 1 ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, rule: AutomationRule) -> Result<AutomationRule, HrMailError> {
        let columns = Columns::encode(&rule)?;

        let result = sqlx::query(
            "UPDATE rules SET title = ?, target_model = ?, trigger_kind = ?, condition = ?, recipient_paths = ?, also_sent_to = ?, template_id = ?, attachment_template_ids = ?, active = ?, created_at = ? WHERE id = ?",
        )
        .bind(&rule.title)
        .bind(rule.target_model.as_str())
        .bind(rule.trigger.to_string())
        .bind(&columns.condition)
        .bind(&columns.recipient_paths)
        .bind(&columns.also_sent_to)
        .bind(rule.template_id.to_string())
        .bind(&columns.attachment_template_ids)
        .bind(rule.active)
        .bind(&columns.created_at)
        .bind(rule.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError {
                entity: "AutomationRule",
                id: rule.id.to_string(),
            }
            .into());
        }
        Ok(rule)
    }

    async fn delete(&self, id: RuleId) -> Result<(), HrMailError> {
        sqlx::query("DELETE FROM rules WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
