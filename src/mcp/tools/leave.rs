//! Leave management tools.
//!
//! Covers the `/time` resources used by an agent answering leave questions:
//! leave types, balances, existing requests, and raising a new request.
//! Dates are accepted as `YYYY-MM-DD` or full RFC 3339 timestamps and
//! forwarded in the form the caller gave them.

use chrono::{DateTime, NaiveDate, Utc};
use rmcp::{ErrorData, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{KekaGateway, Query, respond};
use crate::mcp::{auth::TenantCredentials, error::KekaError};

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct LeaveTypeFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Comma-separated list of leave type IDs (UUIDs)")]
    pub leave_type_ids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Page number (default 1)")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Results per page (max 200, default 100)")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct LeaveBalanceFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Comma-separated list of employee IDs (UUIDs). All employees when omitted.")]
    pub employee_ids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Comma-separated list of leave type IDs (UUIDs)")]
    pub leave_type_ids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Page number (default 1)")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Results per page (max 200, default 100)")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct LeaveRequestFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Comma-separated list of employee IDs (UUIDs)")]
    pub employee_ids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Start of the window, YYYY-MM-DD or ISO 8601 timestamp")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "End of the window, YYYY-MM-DD or ISO 8601 timestamp")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Page number (default 1)")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Results per page (max 200, default 100)")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct NewLeaveRequest {
    #[schemars(description = "Employee ID (UUID) the leave is for")]
    pub employee_id: String,
    #[schemars(description = "Who is requesting the leave")]
    pub requested_by: String,
    #[schemars(description = "First day of leave, YYYY-MM-DD or ISO 8601 timestamp")]
    pub from_date: String,
    #[schemars(description = "Last day of leave, YYYY-MM-DD or ISO 8601 timestamp")]
    pub to_date: String,
    #[serde(default)]
    #[schemars(description = "Session of the first day: 0 = first half, 1 = second half (default 0)")]
    pub from_session: u8,
    #[serde(default)]
    #[schemars(description = "Session of the last day: 0 = first half, 1 = second half (default 0)")]
    pub to_session: u8,
    #[schemars(description = "Leave type ID (UUID)")]
    pub leave_type_id: String,
    #[schemars(description = "Reason for the leave")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional note for the approver")]
    pub note: Option<String>,
}

fn parse_day(field: &str, value: &str) -> Result<NaiveDate, KekaError> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| {
            DateTime::parse_from_rfc3339(value).map(|d| d.with_timezone(&Utc).date_naive())
        })
        .map_err(|_| {
            KekaError::InvalidParams(format!(
                "{field} must be YYYY-MM-DD or an ISO 8601 timestamp, got '{value}'"
            ))
        })
}

fn check_window(from: Option<&str>, to: Option<&str>) -> Result<(), KekaError> {
    let from = from.map(|v| parse_day("from", v)).transpose()?;
    let to = to.map(|v| parse_day("to", v)).transpose()?;
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(KekaError::InvalidParams(format!(
            "from ({from}) must not be after to ({to})"
        ))),
        _ => Ok(()),
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, KekaError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(KekaError::InvalidParams(format!("{field} cannot be empty.")));
    }
    Ok(value)
}

pub async fn get_leave_types(
    gateway: &KekaGateway,
    credentials: &TenantCredentials,
    filters: LeaveTypeFilters,
) -> Result<CallToolResult, ErrorData> {
    let query = Query::new()
        .opt("leaveTypeIds", filters.leave_type_ids)
        .paged(filters.page_number, filters.page_size)?;

    let result = gateway.get(credentials, "/time/leavetypes", query.as_slice()).await;
    respond(result, "fetching leave types")
}

pub async fn get_leave_balance(
    gateway: &KekaGateway,
    credentials: &TenantCredentials,
    filters: LeaveBalanceFilters,
) -> Result<CallToolResult, ErrorData> {
    let query = Query::new()
        .opt("employeeIds", filters.employee_ids)
        .opt("leaveTypeIds", filters.leave_type_ids)
        .paged(filters.page_number, filters.page_size)?;

    let result = gateway.get(credentials, "/time/leavebalance", query.as_slice()).await;
    respond(result, "fetching leave balance")
}

pub async fn get_leave_requests(
    gateway: &KekaGateway,
    credentials: &TenantCredentials,
    filters: LeaveRequestFilters,
) -> Result<CallToolResult, ErrorData> {
    check_window(filters.from.as_deref(), filters.to.as_deref())?;

    let query = Query::new()
        .opt("employeeIds", filters.employee_ids)
        .opt("from", filters.from)
        .opt("to", filters.to)
        .paged(filters.page_number, filters.page_size)?;

    let result = gateway.get(credentials, "/time/leaverequests", query.as_slice()).await;
    respond(result, "fetching leave requests")
}

pub async fn create_leave_request(
    gateway: &KekaGateway,
    credentials: &TenantCredentials,
    request: NewLeaveRequest,
) -> Result<CallToolResult, ErrorData> {
    let employee_id = required("employee_id", &request.employee_id)?;
    let leave_type_id = required("leave_type_id", &request.leave_type_id)?;
    let requested_by = required("requested_by", &request.requested_by)?;
    let from_date = parse_day("from_date", &request.from_date)?;
    let to_date = parse_day("to_date", &request.to_date)?;

    if from_date > to_date {
        return Err(KekaError::InvalidParams(format!(
            "from_date ({from_date}) must not be after to_date ({to_date})"
        ))
        .into());
    }
    if request.from_session > 1 || request.to_session > 1 {
        return Err(KekaError::InvalidParams(
            "from_session and to_session must be 0 (first half) or 1 (second half)".to_string(),
        )
        .into());
    }
    if from_date == to_date && request.from_session > request.to_session {
        return Err(KekaError::InvalidParams(
            "a single-day leave cannot start in the second half and end in the first".to_string(),
        )
        .into());
    }

    let body = json!({
        "employeeId": employee_id,
        "requestedBy": requested_by,
        "fromDate": request.from_date.trim(),
        "toDate": request.to_date.trim(),
        "fromSession": request.from_session,
        "toSession": request.to_session,
        "leaveTypeId": leave_type_id,
        "reason": request.reason,
        "note": request.note,
    });

    let result = gateway.post(credentials, "/time/leaverequests", &body).await;
    respond(result, "creating leave request")
}
