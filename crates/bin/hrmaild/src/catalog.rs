//! Built-in HR models the daemon registers at startup.

use hrmail_domain::registry::ModelRegistry;
use hrmail_domain::schema::{ModelKey, ModelSchema};
use hrmail_domain::error::ValidationError;

pub const DEPARTMENT: &str = "base.Department";
pub const JOB_POSITION: &str = "base.JobPosition";
pub const EMPLOYEE: &str = "employee.Employee";
pub const LEAVE_REQUEST: &str = "leave.LeaveRequest";
pub const TICKET: &str = "helpdesk.Ticket";
pub const CANDIDATE: &str = "recruitment.Candidate";

/// Build the registry of every model rules may target.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidModelKey`] if a built-in key is malformed.
pub fn registry() -> Result<ModelRegistry, ValidationError> {
    let department = ModelKey::parse(DEPARTMENT)?;
    let job_position = ModelKey::parse(JOB_POSITION)?;
    let employee = ModelKey::parse(EMPLOYEE)?;

    Ok(ModelRegistry::builder()
        .register(
            ModelSchema::builder(department.clone())
                .name_field("name")
                .email_field("email")
                .foreign_key("manager", employee.clone())
                .build(),
        )
        .register(
            ModelSchema::builder(job_position.clone())
                .label("Job position")
                .name_field("name")
                .foreign_key("department", department.clone())
                .build(),
        )
        .register(
            ModelSchema::builder(employee.clone())
                .name_field("first_name")
                .name_field("last_name")
                .email_field("email")
                .scalar("phone")
                .scalar("badge_id")
                .scalar("is_active")
                .foreign_key("department", department)
                .foreign_key("job_position", job_position.clone())
                .foreign_key("reporting_manager", employee.clone())
                .build(),
        )
        .register(
            ModelSchema::builder(ModelKey::parse(LEAVE_REQUEST)?)
                .label("Leave request")
                .scalar("leave_type")
                .scalar("start_date")
                .scalar("end_date")
                .scalar("status")
                .scalar("description")
                .foreign_key("employee_id", employee.clone())
                .many_to_many("approvers", employee.clone())
                .build(),
        )
        .register(
            ModelSchema::builder(ModelKey::parse(TICKET)?)
                .name_field("title")
                .scalar("status")
                .scalar("priority")
                .scalar("description")
                .foreign_key("employee_id", employee.clone())
                .many_to_many("assigned_to", employee.clone())
                .build(),
        )
        .register(
            ModelSchema::builder(ModelKey::parse(CANDIDATE)?)
                .name_field("name")
                .email_field("email")
                .scalar("stage")
                .foreign_key("job_position", job_position)
                .many_to_many("recruiters", employee)
                .build(),
        )
        .build())
}
