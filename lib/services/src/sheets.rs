//! Google Sheets integration.

use crate::common::{ServiceIntegration, call, respond, segment};
use conduit_core::{ConnectionId, ProviderConfigKey};
use conduit_integration::{ApiResponse, ConnectionProxy, Integration, OAuth2, ProxyRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

/// Values entered by the API are parsed as if typed into the UI.
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

/// A rectangular block of cell values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub major_dimension: Option<String>,
    /// Rows of cells. Empty trailing rows and cells are omitted by the API.
    #[serde(default)]
    pub values: Vec<Vec<JsonValue>>,
}

/// Summary of a write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default)]
    pub updated_range: String,
    #[serde(default)]
    pub updated_rows: u64,
    #[serde(default)]
    pub updated_columns: u64,
    #[serde(default)]
    pub updated_cells: u64,
}

/// Summary of an append.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResult {
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default)]
    pub table_range: Option<String>,
    #[serde(default)]
    pub updates: UpdateResult,
}

/// Identifiers of a newly created spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSpreadsheet {
    pub spreadsheet_id: String,
    #[serde(default)]
    pub spreadsheet_url: Option<String>,
}

/// Google Sheets over an OAuth2 connection.
#[derive(Debug, Clone)]
pub struct SheetsIntegration {
    integration: Integration<OAuth2>,
}

impl ServiceIntegration for SheetsIntegration {
    type Kind = OAuth2;

    const SERVICE_NAME: &'static str = "sheets";
    const DEFAULT_PROVIDER_CONFIG_KEY: &'static str = "google-sheet";
    const BASE_URL: &'static str = "https://sheets.googleapis.com";

    fn integration(&self) -> &Integration<OAuth2> {
        &self.integration
    }
}

fn values_path(spreadsheet_id: &str, range: &str) -> String {
    format!(
        "/v4/spreadsheets/{}/values/{}",
        segment(spreadsheet_id),
        segment(range)
    )
}

impl SheetsIntegration {
    #[must_use]
    pub fn new(
        provider_config_key: ProviderConfigKey,
        connection_id: ConnectionId,
        proxy: Arc<dyn ConnectionProxy>,
    ) -> Self {
        Self {
            integration: Integration::new(
                Self::SERVICE_NAME,
                provider_config_key,
                connection_id,
                proxy,
            ),
        }
    }

    /// Reads a range in A1 notation, e.g. `Sheet1!A1:C10`.
    pub async fn read_range(&self, spreadsheet_id: &str, range: &str) -> ApiResponse<ValueRange> {
        let request = ProxyRequest::get(values_path(spreadsheet_id, range));
        let result = call(self, request).await;
        respond(Self::SERVICE_NAME, "read_range", result, "Range read successfully")
    }

    /// Overwrites a range with the given rows.
    pub async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<JsonValue>>,
    ) -> ApiResponse<UpdateResult> {
        let request = ProxyRequest::put(values_path(spreadsheet_id, range))
            .with_param("valueInputOption", VALUE_INPUT_OPTION)
            .with_data(json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": values,
            }));
        let result = call(self, request).await;
        respond(Self::SERVICE_NAME, "write_range", result, "Range updated successfully")
    }

    /// Appends rows after the last row of the table found in `range`.
    pub async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<JsonValue>>,
    ) -> ApiResponse<AppendResult> {
        let request = ProxyRequest::post(format!("{}:append", values_path(spreadsheet_id, range)))
            .with_param("valueInputOption", VALUE_INPUT_OPTION)
            .with_param("insertDataOption", "INSERT_ROWS")
            .with_data(json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": values,
            }));
        let result = call(self, request).await;
        respond(Self::SERVICE_NAME, "append_rows", result, "Rows appended successfully")
    }

    /// Creates an empty spreadsheet.
    pub async fn create_spreadsheet(&self, title: &str) -> ApiResponse<CreatedSpreadsheet> {
        let request = ProxyRequest::post("/v4/spreadsheets")
            .with_data(json!({ "properties": { "title": title } }));
        let result = call(self, request).await;
        respond(
            Self::SERVICE_NAME,
            "create_spreadsheet",
            result,
            "Spreadsheet created successfully",
        )
    }

    /// Fetches spreadsheet metadata without cell data.
    pub async fn get_spreadsheet(&self, spreadsheet_id: &str) -> ApiResponse<JsonValue> {
        let request = ProxyRequest::get(format!("/v4/spreadsheets/{}", segment(spreadsheet_id)))
            .with_param("includeGridData", false);
        let result = call(self, request).await;
        respond(
            Self::SERVICE_NAME,
            "get_spreadsheet",
            result,
            "Spreadsheet retrieved successfully",
        )
    }
}
