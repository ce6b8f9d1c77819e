//! Core HR tools: employee directory and departments.
//!
//! Thin wrappers over `/hris/employees` and `/hris/departments`; responses
//! are forwarded as returned by Keka.

use rmcp::{ErrorData, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{KekaGateway, Query, respond};
use crate::mcp::{auth::TenantCredentials, error::KekaError};

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct EmployeeFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Comma-separated list of employee IDs (UUIDs)")]
    pub employee_ids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Comma-separated list of employee numbers, e.g. EMP001,EMP002")]
    pub employee_numbers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Comma-separated list of work email addresses")]
    pub emails: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Comma-separated employment status values, e.g. 0 (Working), 1 (Relieved)")]
    pub employment_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Only employees currently in probation")]
    pub in_probation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Only employees currently serving notice")]
    pub in_notice_period: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "ISO 8601 timestamp; only employees modified after it are returned")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Page number (default 1)")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Results per page (max 200, default 100)")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EmployeeId {
    #[schemars(description = "The employee identifier (UUID)")]
    pub id: String,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct DepartmentFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(
        description = "Comma-separated list of department IDs (UUIDs). Department IDs are included in employee records."
    )]
    pub department_ids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "ISO 8601 timestamp; only departments modified after it are returned")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Page number (default 1)")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Results per page (max 200, default 100)")]
    pub page_size: Option<u32>,
}

pub async fn get_all_employees(
    gateway: &KekaGateway,
    credentials: &TenantCredentials,
    filters: EmployeeFilters,
) -> Result<CallToolResult, ErrorData> {
    let query = Query::new()
        .opt("employeeIds", filters.employee_ids)
        .opt("employeeNumbers", filters.employee_numbers)
        .opt("emails", filters.emails)
        .opt("employmentStatus", filters.employment_status)
        .opt("inProbation", filters.in_probation)
        .opt("inNoticePeriod", filters.in_notice_period)
        .opt("lastModified", filters.last_modified)
        .paged(filters.page_number, filters.page_size)?;

    let result = gateway.get(credentials, "/hris/employees", query.as_slice()).await;
    respond(result, "fetching employees")
}

pub async fn get_an_employee(
    gateway: &KekaGateway,
    credentials: &TenantCredentials,
    EmployeeId { id }: EmployeeId,
) -> Result<CallToolResult, ErrorData> {
    let id = id.trim();
    if id.is_empty() {
        return Err(KekaError::InvalidParams("Employee id cannot be empty.".to_string()).into());
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(KekaError::InvalidParams(format!(
            "Employee id is not a valid identifier: {id}"
        ))
        .into());
    }

    let path = format!("/hris/employees/{id}");
    respond(gateway.get(credentials, &path, &[]).await, "fetching employee")
}

pub async fn get_all_departments(
    gateway: &KekaGateway,
    credentials: &TenantCredentials,
    filters: DepartmentFilters,
) -> Result<CallToolResult, ErrorData> {
    let query = Query::new()
        .opt("departmentIds", filters.department_ids)
        .opt("lastModified", filters.last_modified)
        .paged(filters.page_number, filters.page_size)?;

    let result = gateway.get(credentials, "/hris/departments", query.as_slice()).await;
    respond(result, "fetching departments")
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    use super::*;
    use crate::mcp::{
        auth::{
            credentials::tests::demo_credentials,
            tests::{mount_token, provider_for},
        },
        http::build_http_client,
    };

    fn gateway_for(server: &MockServer) -> KekaGateway {
        let client = build_http_client(Duration::from_secs(5)).expect("http client");
        KekaGateway::new(client, Arc::new(provider_for(server)))
    }

    #[tokio::test]
    async fn lists_employees_with_filters() {
        let server = MockServer::start().await;
        mount_token(&server, "tok_123", 1).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/hris/employees"))
            .and(query_param("employeeNumbers", "EMP001"))
            .and(query_param("inProbation", "true"))
            .and(query_param("pageNumber", "2"))
            .and(query_param("pageSize", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "succeeded": true,
                "data": [{ "id": "e-1", "displayName": "Asha Rao" }],
                "pageNumber": 2,
                "totalRecords": 101
            })))
            .expect(1)
            .mount(&server)
            .await;

        let filters = EmployeeFilters {
            employee_numbers: Some("EMP001".to_string()),
            in_probation: Some(true),
            page_number: Some(2),
            ..EmployeeFilters::default()
        };
        let result = get_all_employees(&gateway_for(&server), &demo_credentials(), filters)
            .await
            .expect("tool result");

        assert_ne!(result.is_error, Some(true));
        let content = result.structured_content.expect("structured content");
        assert_eq!(content["totalRecords"], 101);
    }

    #[tokio::test]
    async fn rejects_blank_employee_id() {
        let server = MockServer::start().await;
        let result = get_an_employee(
            &gateway_for(&server),
            &demo_credentials(),
            EmployeeId { id: "  ".to_string() },
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_path_traversal_in_employee_id() {
        let server = MockServer::start().await;
        let result = get_an_employee(
            &gateway_for(&server),
            &demo_credentials(),
            EmployeeId {
                id: "../departments".to_string(),
            },
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_employee_is_flagged_output() {
        let server = MockServer::start().await;
        mount_token(&server, "tok_123", 1).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/hris/employees/e-404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let result = get_an_employee(
            &gateway_for(&server),
            &demo_credentials(),
            EmployeeId {
                id: "e-404".to_string(),
            },
        )
        .await
        .expect("tool result");

        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn lists_departments() {
        let server = MockServer::start().await;
        mount_token(&server, "tok_123", 1).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/hris/departments"))
            .and(query_param("departmentIds", "d-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "id": "d-1" }] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let filters = DepartmentFilters {
            department_ids: Some("d-1".to_string()),
            ..DepartmentFilters::default()
        };
        let result = get_all_departments(&gateway_for(&server), &demo_credentials(), filters)
            .await
            .expect("tool result");
        assert_ne!(result.is_error, Some(true));
    }
}
