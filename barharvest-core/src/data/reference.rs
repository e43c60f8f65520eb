//! Reference document: an HTML page whose first table lists index members.
//!
//! The first row of the table is the header. Cell text is whitespace
//! collapsed, so linked symbols (`<td><a>MMM</a></td>`) read as plain text.

use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

use super::provider::{DataError, MembershipProvider};

/// Default reference page for S&P 500 membership.
pub const SP500_LIST_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";

/// A header row plus data rows, as text.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReferenceTable {
    /// Parse the first `<table>` of an HTML document.
    pub fn parse_first_table(html: &str) -> Result<Self, DataError> {
        let document = Html::parse_document(html);
        let table_sel = selector("table")?;
        let row_sel = selector("tr")?;
        let cell_sel = selector("th, td")?;

        let table = document
            .select(&table_sel)
            .next()
            .ok_or_else(|| DataError::Extraction("document contains no table".into()))?;

        let mut rows = table
            .select(&row_sel)
            .map(|row| {
                row.select(&cell_sel)
                    .map(cell_text)
                    .collect::<Vec<String>>()
            })
            .filter(|cells| !cells.is_empty());

        let headers = rows
            .next()
            .ok_or_else(|| DataError::Extraction("table has no header row".into()))?;
        let rows: Vec<Vec<String>> = rows.collect();
        debug!(columns = headers.len(), rows = rows.len(), "parsed reference table");

        Ok(Self { headers, rows })
    }

    /// Values of the column whose header is `name`. Short rows yield "".
    pub fn column(&self, name: &str) -> Result<Vec<&str>, DataError> {
        let index = self
            .headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| {
                DataError::Extraction(format!(
                    "column '{name}' not found (headers: {:?})",
                    self.headers
                ))
            })?;

        Ok(self
            .rows
            .iter()
            .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
            .collect())
    }
}

fn selector(css: &str) -> Result<Selector, DataError> {
    Selector::parse(css).map_err(|e| DataError::Extraction(format!("selector '{css}': {e:?}")))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fetches the reference page over HTTP.
pub struct ReferenceDocument {
    client: reqwest::blocking::Client,
    url: String,
    symbol_column: String,
}

impl ReferenceDocument {
    pub fn new(
        url: impl Into<String>,
        symbol_column: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            symbol_column: symbol_column.into(),
        })
    }

    /// Download the page and parse its first table.
    pub fn fetch_table(&self) -> Result<ReferenceTable, DataError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(format!("read body: {e}")))?;
        ReferenceTable::parse_first_table(&body)
    }
}

impl MembershipProvider for ReferenceDocument {
    fn name(&self) -> &str {
        "reference_document"
    }

    fn members(&self) -> Result<Vec<String>, DataError> {
        let table = self.fetch_table()?;
        Ok(table
            .column(&self.symbol_column)?
            .into_iter()
            .map(str::to_string)
            .collect())
    }
}
