//! Keka (HR, payroll and PSA) Model Context Protocol implementation.
//!
//! This crate provides MCP tools for interacting with Keka's REST API.
//! The implementation is organized into:
//!
//! - `auth`: Tenant credentials and the OAuth token provider
//! - `error`: Error types and conversions
//! - `http`: HTTP client and API communication
//! - `tools`: Individual MCP tools for specific Keka operations
//!
//! The main entry point is the `KekaMCPFactory` which provides the MCP server
//! implementation and manages all tools.

pub mod auth;
pub mod error;
pub mod http;
pub mod tools;

use std::sync::Arc;

use anyhow::Result;
use axum::http::request;
use rmcp::{
    ErrorData, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, InitializeRequestParam, InitializeResult,
        ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use tracing::{info, warn};

use crate::mcp::{
    auth::{TenantCredentials, TokenFetcher, TokenProvider},
    http::{KEKA_HTTP_TIMEOUT, build_http_client, hosts_from_env},
    tools::{
        KekaGateway, admin,
        admin::PingRequest,
        credentials_for,
        employees::{self, DepartmentFilters, EmployeeFilters, EmployeeId},
        leave::{
            self, LeaveBalanceFilters, LeaveRequestFilters, LeaveTypeFilters, NewLeaveRequest,
        },
        tenant_source,
    },
};

#[derive(Clone)]
pub struct KekaMCPFactory {
    gateway: KekaGateway,
    tool_router: ToolRouter<Self>,
}

fn request_parts(context: &RequestContext<RoleServer>) -> Option<&request::Parts> {
    context.extensions.get::<request::Parts>()
}

/// Resolves the caller's tenant, or turns the configuration error into
/// flagged tool output.
fn tenant(context: &RequestContext<RoleServer>) -> Result<TenantCredentials, CallToolResult> {
    credentials_for(request_parts(context)).map_err(|e| {
        warn!(error = %e, "tenant credentials unavailable");
        CallToolResult::error(vec![Content::text(format!(
            "Error resolving tenant credentials: {e}"
        ))])
    })
}

#[tool_router]
impl KekaMCPFactory {
    /// Builds the factory from process settings.
    ///
    /// Tenant credentials are not needed here; they are resolved on every
    /// tool call.
    pub fn new() -> Result<Self> {
        let timeout = *KEKA_HTTP_TIMEOUT;
        let client = build_http_client(timeout)?;
        let fetcher = TokenFetcher::new(client.clone(), hosts_from_env(), timeout);
        let provider = Arc::new(TokenProvider::new(fetcher));
        Ok(Self::with_gateway(KekaGateway::new(client, provider)))
    }

    pub fn with_gateway(gateway: KekaGateway) -> Self {
        // Initialize with tool router loaded from macro-generated code
        Self {
            gateway,
            tool_router: Self::tool_router(),
        }
    }

    // Thin delegating methods so the `tool_router` proc-macro (which scans
    // this impl block) can discover and register the tools. These simply
    // forward to the actual implementations in `mcp::tools::*` so the
    // implementation remains modular.

    #[tool(description = "Check connectivity with the Keka MCP server. Reports which credential settings are present, never their values.")]
    async fn ping(
        &self,
        Parameters(args): Parameters<PingRequest>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let source = tenant_source(request_parts(&context));
        Ok(admin::ping(&self.gateway, &source, args))
    }

    #[tool(description = "Clear every cached Keka access token. The next tool call for each tenant acquires a fresh token.")]
    async fn clear_token_cache(&self) -> Result<CallToolResult, ErrorData> {
        Ok(admin::clear_token_cache(&self.gateway))
    }

    #[tool(description = "Use this tool to get all employees in the organisation, optionally filtered by ids, employee numbers, emails, employment status, probation or notice period. Results are paged.")]
    async fn get_all_employees(
        &self,
        Parameters(args): Parameters<EmployeeFilters>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let credentials = match tenant(&context) {
            Ok(credentials) => credentials,
            Err(result) => return Ok(result),
        };
        employees::get_all_employees(&self.gateway, &credentials, args).await
    }

    #[tool(description = "Use this tool to get a single employee's full record by employee id (UUID).")]
    async fn get_an_employee(
        &self,
        Parameters(args): Parameters<EmployeeId>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let credentials = match tenant(&context) {
            Ok(credentials) => credentials,
            Err(result) => return Ok(result),
        };
        employees::get_an_employee(&self.gateway, &credentials, args).await
    }

    #[tool(description = "Use this tool to get all departments in the organisation.")]
    async fn get_all_departments(
        &self,
        Parameters(args): Parameters<DepartmentFilters>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let credentials = match tenant(&context) {
            Ok(credentials) => credentials,
            Err(result) => return Ok(result),
        };
        employees::get_all_departments(&self.gateway, &credentials, args).await
    }

    #[tool(description = "Use this tool to get all the types of leave configured in Keka.")]
    async fn get_leave_types(
        &self,
        Parameters(args): Parameters<LeaveTypeFilters>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let credentials = match tenant(&context) {
            Ok(credentials) => credentials,
            Err(result) => return Ok(result),
        };
        leave::get_leave_types(&self.gateway, &credentials, args).await
    }

    #[tool(description = "Use this tool to fetch the leave balance of all employees or of specific employees.")]
    async fn get_leave_balance(
        &self,
        Parameters(args): Parameters<LeaveBalanceFilters>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let credentials = match tenant(&context) {
            Ok(credentials) => credentials,
            Err(result) => return Ok(result),
        };
        leave::get_leave_balance(&self.gateway, &credentials, args).await
    }

    #[tool(description = "Use this tool to get leave requests across the organisation or for specific employees. LeaveRequestStatus values: 0 = Pending, 1 = Approved, 2 = Rejected, 3 = Cancelled, 4 = InApprovalProcess.")]
    async fn get_leave_requests(
        &self,
        Parameters(args): Parameters<LeaveRequestFilters>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let credentials = match tenant(&context) {
            Ok(credentials) => credentials,
            Err(result) => return Ok(result),
        };
        leave::get_leave_requests(&self.gateway, &credentials, args).await
    }

    #[tool(description = "Use this tool to raise a leave request for an employee.")]
    async fn create_leave_request(
        &self,
        Parameters(args): Parameters<NewLeaveRequest>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let credentials = match tenant(&context) {
            Ok(credentials) => credentials,
            Err(result) => return Ok(result),
        };
        leave::create_leave_request(&self.gateway, &credentials, args).await
    }
}

#[tool_handler]
impl ServerHandler for KekaMCPFactory {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Keka HR MCP Server. Tools call the Keka REST API on behalf of the tenant identified by the request's credentials."
                    .to_string(),
            ),
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, ErrorData> {
        if let Some(http_request_part) = request_parts(&context) {
            // Headers are not logged: the Authorization header may carry tenant secrets.
            let initialize_uri = &http_request_part.uri;
            let tenant = credentials_for(Some(http_request_part))
                .ok()
                .map(|c| c.tenant_key().to_string());
            info!(%initialize_uri, ?tenant, "initialize from http server");
        }
        Ok(self.get_info())
    }
}
