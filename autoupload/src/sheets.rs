//! Google Sheets access through a service-account credential.

use crate::cache::RowMatrix;
use crate::errors::AutomationError;
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, instrument};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const TOKEN_LIFETIME_SECS: u64 = 3600;
// refresh this long before the token actually expires
const TOKEN_SKEW: Duration = Duration::from_secs(60);

/// Row-matrix read and single-cell write against a named sheet.
#[async_trait]
pub trait SheetBackend: Send + Sync {
    /// All values of the sheet, padded to a rectangle.
    async fn get_all_values(&self, sheet: &str) -> Result<RowMatrix, AutomationError>;

    /// Writes one cell. `row` and `col` are one-based like the sheet UI.
    async fn update_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: &str,
    ) -> Result<(), AutomationError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, AutomationError> {
        let raw = std::fs::read_to_string(path).map_err(|e| AutomationError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| {
            AutomationError::Auth(format!("invalid credential file {}: {e}", path.display()))
        })
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: SystemTime,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

pub struct GoogleSheets {
    http: reqwest::Client,
    key: ServiceAccountKey,
    spreadsheet_name: String,
    spreadsheet_id: OnceCell<String>,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheets {
    pub fn new(
        key: ServiceAccountKey,
        spreadsheet_name: impl Into<String>,
        spreadsheet_id: Option<String>,
    ) -> Self {
        let id_cell = OnceCell::new();
        if let Some(id) = spreadsheet_id {
            let _ = id_cell.set(id);
        }
        Self {
            http: reqwest::Client::new(),
            key,
            spreadsheet_name: spreadsheet_name.into(),
            spreadsheet_id: id_cell,
            token: Mutex::new(None),
        }
    }

    pub fn from_credential_file(
        path: &Path,
        spreadsheet_name: impl Into<String>,
        spreadsheet_id: Option<String>,
    ) -> Result<Self, AutomationError> {
        Ok(Self::new(
            ServiceAccountKey::from_file(path)?,
            spreadsheet_name,
            spreadsheet_id,
        ))
    }

    async fn access_token(&self) -> Result<String, AutomationError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if SystemTime::now() + TOKEN_SKEW < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let token_uri = self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AutomationError::Auth(e.to_string()))?
            .as_secs();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES,
            aud: token_uri,
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
        };
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| AutomationError::Auth(format!("invalid private key: {e}")))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| AutomationError::Auth(format!("failed to sign assertion: {e}")))?;

        debug!("Requesting access token for {}", self.key.client_email);
        let response = self
            .http
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;
        let token: TokenResponse = response.json().await?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS));
        *guard = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: SystemTime::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn spreadsheet_id(&self) -> Result<String, AutomationError> {
        self.spreadsheet_id
            .get_or_try_init(|| async {
                let token = self.access_token().await?;
                let query = format!(
                    "name = '{}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false",
                    self.spreadsheet_name.replace('\'', "\\'")
                );
                let response = self
                    .http
                    .get(DRIVE_FILES_API)
                    .bearer_auth(&token)
                    .query(&[("q", query.as_str()), ("fields", "files(id)")])
                    .send()
                    .await?;
                let list: DriveFileList = check_status(response).await?.json().await?;
                let id = list.files.into_iter().next().map(|f| f.id).ok_or_else(|| {
                    AutomationError::Sheets(format!(
                        "spreadsheet '{}' not found or not shared with {}",
                        self.spreadsheet_name, self.key.client_email
                    ))
                })?;
                info!("Resolved spreadsheet '{}' -> {}", self.spreadsheet_name, id);
                Ok::<String, AutomationError>(id)
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl SheetBackend for GoogleSheets {
    #[instrument(level = "debug", skip(self))]
    async fn get_all_values(&self, sheet: &str) -> Result<RowMatrix, AutomationError> {
        let id = self.spreadsheet_id().await?;
        let token = self.access_token().await?;
        let url = format!("{SHEETS_API}/{id}/values/{}", quote_sheet(sheet));
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&[("valueRenderOption", "FORMATTED_VALUE")])
            .send()
            .await?;
        let range: ValueRange = check_status(response).await?.json().await?;
        Ok(pad_rows(range.values.into_iter().map(|row| {
            row.into_iter().map(cell_to_string).collect()
        })))
    }

    #[instrument(level = "debug", skip(self, value))]
    async fn update_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: &str,
    ) -> Result<(), AutomationError> {
        if row == 0 || col == 0 {
            return Err(AutomationError::InvalidArgument(format!(
                "cell ({row}, {col}) is not one-based"
            )));
        }
        let id = self.spreadsheet_id().await?;
        let token = self.access_token().await?;
        let range = format!("{}!{}{}", quote_sheet(sheet), column_letters(col), row);
        let url = format!("{SHEETS_API}/{id}/values/{range}");
        let body = serde_json::json!({ "range": range, "values": [[value]] });
        let response = self
            .http
            .put(&url)
            .bearer_auth(&token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AutomationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Err(AutomationError::RateLimited(format!("429 Quota exceeded: {body}")))
    } else if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        Err(AutomationError::Auth(format!("HTTP {status}: {body}")))
    } else {
        Err(AutomationError::Sheets(format!("HTTP {status}: {body}")))
    }
}

fn quote_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pads every row to the widest one, since the API trims trailing empties.
pub(crate) fn pad_rows(rows: impl Iterator<Item = Vec<String>>) -> RowMatrix {
    let mut rows: RowMatrix = rows.collect();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in rows.iter_mut() {
        row.resize(width, String::new());
    }
    rows
}

/// One-based column index to A1 letters (1 -> A, 13 -> M, 48 -> AV).
pub fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}
