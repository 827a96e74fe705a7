use std::path::Path;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::a1;
use super::auth::ServiceAccountAuth;
use super::{CellWrite, GridSpan, SheetsError, Spreadsheet, TextRule, Worksheet};
use crate::retry::{self, RetryPolicy, Retryable};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Google Sheets v4 REST client bound to one workbook.
pub struct GoogleSheets {
    client: reqwest::Client,
    spreadsheet_id: String,
    auth: ServiceAccountAuth,
    retry: RetryPolicy,
}

impl GoogleSheets {
    pub fn connect(
        spreadsheet_id: &str,
        credentials: &Path,
        retry: RetryPolicy,
    ) -> Result<Self, SheetsError> {
        let auth = ServiceAccountAuth::from_file(credentials)?;
        info!(spreadsheet_id, "Google Sheets client ready");
        Ok(Self {
            client: reqwest::Client::new(),
            spreadsheet_id: spreadsheet_id.to_string(),
            auth,
            retry,
        })
    }

    fn workbook_url(&self) -> String {
        format!("{SHEETS_API}/{}", self.spreadsheet_id)
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{SHEETS_API}/{}/values/{}",
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    /// One authenticated API call, retried on transport errors, 429 and 5xx.
    async fn call(
        &self,
        label: &str,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, SheetsError> {
        self.call_retrying(label, method, url, body, SheetsError::is_transient)
            .await
    }

    async fn call_retrying(
        &self,
        label: &str,
        method: Method,
        url: &str,
        body: Option<&Value>,
        retry_on: fn(&SheetsError) -> bool,
    ) -> Result<Value, SheetsError> {
        retry::run_if(&self.retry, label, retry_on, || {
            let method = method.clone();
            async move {
                let token = self.auth.access_token(&self.client).await?;
                let mut req = self.client.request(method, url).bearer_auth(token);
                if let Some(body) = body {
                    req = req.json(body);
                }
                let resp = req.send().await?;
                read_response(resp).await
            }
        })
        .await
        .inspect(|_| debug!(op = label, "Sheets API call succeeded"))
    }

    async fn batch_update(&self, label: &str, requests: Vec<Value>) -> Result<Value, SheetsError> {
        let url = format!("{}:batchUpdate", self.workbook_url());
        let body = json!({ "requests": requests });
        self.call(label, Method::POST, &url, Some(&body)).await
    }

    async fn read_range(&self, range: &str, dimension: &str) -> Result<Vec<String>, SheetsError> {
        let url = format!("{}?majorDimension={dimension}", self.values_url(range));
        let body = self.call("read values", Method::GET, &url, None).await?;
        Ok(first_vector(&body))
    }

    async fn rule_count(&self, sheet: &Worksheet) -> Result<usize, SheetsError> {
        let url = format!(
            "{}?fields=sheets(properties.sheetId,conditionalFormats)",
            self.workbook_url()
        );
        let body = self.call("read conditional formats", Method::GET, &url, None).await?;
        Ok(conditional_rule_count(&body, sheet.id))
    }
}

async fn read_response(resp: reqwest::Response) -> Result<Value, SheetsError> {
    let status = resp.status();
    let text = resp.text().await?;

    if status.as_u16() == 429 {
        return Err(SheetsError::RateLimited(text));
    }
    if !status.is_success() {
        warn!(status = status.as_u16(), body = %text, "Sheets API error");
        return Err(SheetsError::Api {
            status: status.as_u16(),
            message: text,
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| SheetsError::Parse(e.to_string()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    index: u32,
}

impl From<SheetProperties> for Worksheet {
    fn from(p: SheetProperties) -> Self {
        Worksheet {
            id: p.sheet_id,
            title: p.title,
            index: p.index,
        }
    }
}

fn parse_worksheets(body: &Value) -> Result<Vec<Worksheet>, SheetsError> {
    let sheets = body
        .get("sheets")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut out: Vec<Worksheet> = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        let props: SheetProperties = serde_json::from_value(sheet["properties"].clone())
            .map_err(|e| SheetsError::Parse(format!("sheet properties: {e}")))?;
        out.push(props.into());
    }
    out.sort_by_key(|w| w.index);
    Ok(out)
}

fn parse_reply_properties(body: &Value, reply: &str) -> Result<Worksheet, SheetsError> {
    let props = body
        .pointer(&format!("/replies/0/{reply}/properties"))
        .cloned()
        .ok_or_else(|| SheetsError::Parse(format!("missing {reply} reply")))?;
    let props: SheetProperties =
        serde_json::from_value(props).map_err(|e| SheetsError::Parse(e.to_string()))?;
    Ok(props.into())
}

/// First row (or column) of a values response, cells rendered as strings.
fn first_vector(body: &Value) -> Vec<String> {
    body.pointer("/values/0")
        .and_then(Value::as_array)
        .map(|cells| {
            cells
                .iter()
                .map(|c| match c {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn conditional_rule_count(body: &Value, sheet_id: i64) -> usize {
    body.get("sheets")
        .and_then(Value::as_array)
        .and_then(|sheets| {
            sheets
                .iter()
                .find(|s| s.pointer("/properties/sheetId").and_then(Value::as_i64) == Some(sheet_id))
        })
        .and_then(|s| s.get("conditionalFormats"))
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

/// An append that timed out or hit a 5xx may already be applied, and repeating it
/// would duplicate rows. Only a 429, which the API rejects up front, is retried.
fn append_is_retryable(e: &SheetsError) -> bool {
    matches!(e, SheetsError::RateLimited(_))
}

fn grid_range(sheet_id: i64, span: &GridSpan) -> Value {
    json!({
        "sheetId": sheet_id,
        "startRowIndex": span.first_row.saturating_sub(1),
        "endRowIndex": span.last_row,
        "startColumnIndex": span.first_col.saturating_sub(1),
        "endColumnIndex": span.last_col,
    })
}

fn add_rule_request(sheet_id: i64, rule: &TextRule, index: usize) -> Value {
    json!({
        "addConditionalFormatRule": {
            "rule": {
                "ranges": [grid_range(sheet_id, &rule.span)],
                "booleanRule": {
                    "condition": {
                        "type": "TEXT_EQ",
                        "values": [{ "userEnteredValue": rule.text }],
                    },
                    "format": {
                        "backgroundColor": {
                            "red": rule.background.red,
                            "green": rule.background.green,
                            "blue": rule.background.blue,
                        }
                    },
                },
            },
            "index": index,
        }
    })
}

fn header_format_request(sheet_id: i64, cols: u32) -> Value {
    let span = GridSpan {
        first_row: 1,
        last_row: 1,
        first_col: 1,
        last_col: cols,
    };
    json!({
        "repeatCell": {
            "range": grid_range(sheet_id, &span),
            "cell": {
                "userEnteredFormat": {
                    "backgroundColor": { "red": 0.9, "green": 0.9, "blue": 0.9 },
                    "textFormat": { "bold": true, "fontSize": 12 },
                }
            },
            "fields": "userEnteredFormat(backgroundColor,textFormat)",
        }
    })
}

#[async_trait]
impl Spreadsheet for GoogleSheets {
    async fn worksheets(&self) -> Result<Vec<Worksheet>, SheetsError> {
        let url = format!(
            "{}?fields=sheets.properties(sheetId,title,index)",
            self.workbook_url()
        );
        let body = self.call("list worksheets", Method::GET, &url, None).await?;
        parse_worksheets(&body)
    }

    async fn add_worksheet(
        &self,
        title: &str,
        rows: u32,
        cols: u32,
    ) -> Result<Worksheet, SheetsError> {
        let request = json!({
            "addSheet": {
                "properties": {
                    "title": title,
                    "gridProperties": { "rowCount": rows, "columnCount": cols },
                }
            }
        });
        let body = self.batch_update("add worksheet", vec![request]).await?;
        parse_reply_properties(&body, "addSheet")
    }

    async fn rename_worksheet(
        &self,
        sheet: &Worksheet,
        title: &str,
    ) -> Result<Worksheet, SheetsError> {
        let request = json!({
            "updateSheetProperties": {
                "properties": { "sheetId": sheet.id, "title": title },
                "fields": "title",
            }
        });
        self.batch_update("rename worksheet", vec![request]).await?;
        Ok(Worksheet {
            title: title.to_string(),
            ..sheet.clone()
        })
    }

    async fn clear(&self, sheet: &Worksheet) -> Result<(), SheetsError> {
        let url = format!("{}:clear", self.values_url(&a1::whole_sheet(&sheet.title)));
        self.call("clear worksheet", Method::POST, &url, Some(&json!({})))
            .await?;
        Ok(())
    }

    async fn row_values(&self, sheet: &Worksheet, row: u32) -> Result<Vec<String>, SheetsError> {
        let range = a1::qualified(&sheet.title, &format!("{row}:{row}"));
        self.read_range(&range, "ROWS").await
    }

    async fn col_values(&self, sheet: &Worksheet, col: u32) -> Result<Vec<String>, SheetsError> {
        let letters = a1::column_letters(col);
        let range = a1::qualified(&sheet.title, &format!("{letters}:{letters}"));
        self.read_range(&range, "COLUMNS").await
    }

    async fn batch_write(
        &self,
        sheet: &Worksheet,
        writes: &[CellWrite],
    ) -> Result<(), SheetsError> {
        if writes.is_empty() {
            return Ok(());
        }
        let data: Vec<Value> = writes
            .iter()
            .map(|w| {
                json!({
                    "range": a1::qualified(&sheet.title, &w.anchor),
                    "values": w.values,
                })
            })
            .collect();
        let url = format!("{SHEETS_API}/{}/values:batchUpdate", self.spreadsheet_id);
        let body = json!({ "valueInputOption": "RAW", "data": data });
        self.call("write values", Method::POST, &url, Some(&body))
            .await?;
        Ok(())
    }

    async fn append_rows(
        &self,
        sheet: &Worksheet,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsError> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = format!(
            "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.values_url(&a1::qualified(&sheet.title, "A1"))
        );
        let body = json!({ "values": rows });
        self.call_retrying(
            "append rows",
            Method::POST,
            &url,
            Some(&body),
            append_is_retryable,
        )
        .await?;
        Ok(())
    }

    async fn replace_conditional_rules(
        &self,
        sheet: &Worksheet,
        rules: &[TextRule],
    ) -> Result<(), SheetsError> {
        let existing = self.rule_count(sheet).await?;
        let mut requests: Vec<Value> = (0..existing)
            .map(|_| {
                json!({ "deleteConditionalFormatRule": { "sheetId": sheet.id, "index": 0 } })
            })
            .collect();
        requests.extend(
            rules
                .iter()
                .enumerate()
                .map(|(i, rule)| add_rule_request(sheet.id, rule, i)),
        );
        if requests.is_empty() {
            return Ok(());
        }
        self.batch_update("replace conditional formats", requests)
            .await?;
        Ok(())
    }

    async fn format_header(&self, sheet: &Worksheet, cols: u32) -> Result<(), SheetsError> {
        self.batch_update("format header", vec![header_format_request(sheet.id, cols)])
            .await?;
        Ok(())
    }
}
