//! Google Sheets ledger — appends rows through the Sheets v4 REST API.

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::{SheetsAuth, SheetsConfig};
use crate::error::LedgerError;
use crate::ledger::{AppendSummary, LedgerRow, LedgerSink};

const LEDGER: &str = "sheets";

/// OAuth scope for reading and writing spreadsheets.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

enum Credentials {
    Static(SecretString),
    /// Caches minted tokens and refreshes them before they expire.
    ServiceAccount(CustomServiceAccount),
}

/// Appends expense rows to a spreadsheet.
pub struct SheetsLedger {
    config: SheetsConfig,
    credentials: Credentials,
    client: reqwest::Client,
}

impl SheetsLedger {
    /// Build the ledger, reading the service-account key if one is configured.
    pub fn new(config: SheetsConfig) -> Result<Self, LedgerError> {
        let credentials = match &config.auth {
            SheetsAuth::Token(token) => Credentials::Static(token.clone()),
            SheetsAuth::ServiceAccount(path) => {
                let account = CustomServiceAccount::from_file(path)
                    .map_err(|e| auth_failed(format!("{}: {e}", path.display())))?;
                debug!(key = %path.display(), "Loaded service account key");
                Credentials::ServiceAccount(account)
            }
        };
        Ok(Self {
            config,
            credentials,
            client: reqwest::Client::new(),
        })
    }

    async fn bearer_token(&self) -> Result<SecretString, LedgerError> {
        match &self.credentials {
            Credentials::Static(token) => Ok(token.clone()),
            Credentials::ServiceAccount(account) => {
                let token = account.token(&[SHEETS_SCOPE]).await.map_err(auth_failed)?;
                Ok(SecretString::from(token.as_str().to_string()))
            }
        }
    }

    /// `{base}/spreadsheets/{id}/values/{range}:append`, path segments escaped.
    fn append_url(&self) -> Result<Url, LedgerError> {
        let mut url = Url::parse(&self.config.api_base).map_err(request_failed)?;
        url.path_segments_mut()
            .map_err(|_| request_failed("API base cannot carry a path"))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.config.spreadsheet_id)
            .push("values")
            .push(&format!("{}:append", self.config.range));
        Ok(url)
    }
}

fn auth_failed(reason: impl ToString) -> LedgerError {
    LedgerError::AuthFailed {
        ledger: LEDGER.into(),
        reason: reason.to_string(),
    }
}

fn request_failed(reason: impl ToString) -> LedgerError {
    LedgerError::RequestFailed {
        ledger: LEDGER.into(),
        reason: reason.to_string(),
    }
}

/// Request body for `values:append`.
///
/// The date goes in with a leading `'` so the sheet stores it as text
/// instead of reformatting it.
pub fn append_body(rows: &[LedgerRow]) -> Value {
    let values: Vec<Value> = rows
        .iter()
        .map(|row| json!([format!("'{}", row.date), row.category, row.detail, row.amount]))
        .collect();
    json!({ "values": values })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    #[serde(default)]
    updates: Updates,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Updates {
    #[serde(default)]
    updated_rows: u64,
    #[serde(default)]
    updated_cells: u64,
}

/// Read the `updates` block of an append response.
pub fn parse_append_response(body: &str) -> Result<AppendSummary, LedgerError> {
    let response: AppendResponse =
        serde_json::from_str(body).map_err(|e| LedgerError::InvalidResponse {
            ledger: LEDGER.into(),
            reason: e.to_string(),
        })?;
    Ok(AppendSummary {
        updated_rows: response.updates.updated_rows,
        updated_cells: response.updates.updated_cells,
    })
}

#[async_trait]
impl LedgerSink for SheetsLedger {
    fn name(&self) -> &str {
        LEDGER
    }

    async fn append(&self, rows: &[LedgerRow]) -> Result<AppendSummary, LedgerError> {
        let token = self.bearer_token().await?;
        let resp = self
            .client
            .post(self.append_url()?)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(token.expose_secret())
            .json(&append_body(rows))
            .send()
            .await
            .map_err(request_failed)?;

        let status = resp.status();
        let body = resp.text().await.map_err(request_failed)?;
        if !status.is_success() {
            return Err(LedgerError::Rejected {
                ledger: LEDGER.into(),
                status: status.as_u16(),
                body,
            });
        }

        let summary = parse_append_response(&body)?;
        info!(
            rows = summary.updated_rows,
            cells = summary.updated_cells,
            "Appended rows to spreadsheet"
        );
        Ok(summary)
    }
}
