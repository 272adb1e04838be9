//! Account list loading.
//!
//! The list is tabular with headers `Name, Browser_ID, Token, Proxy, UID`.
//! Rows missing a required field are skipped with a warning; only a
//! missing or unreadable file is fatal.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use vigil_api::Account;

/// Errors that abort account loading entirely.
#[derive(Debug, Error)]
pub enum AccountsError {
    /// The account list could not be opened or parsed at the file level.
    #[error("failed to read account list: {0}")]
    Csv(#[from] csv::Error),
}

/// One row of the account list, as written by the operator.
#[derive(Debug, Deserialize)]
struct AccountRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Browser_ID")]
    browser_id: String,
    #[serde(rename = "Token")]
    token: String,
    #[serde(rename = "Proxy", default)]
    proxy: String,
    #[serde(rename = "UID")]
    uid: String,
}

/// Load all valid accounts from the list at `path`.
pub fn load_accounts(path: &Path) -> Result<Vec<Account>, AccountsError> {
    let mut reader = csv::Reader::from_path(path)?;

    let mut accounts = Vec::new();
    for (index, row) in reader.deserialize::<AccountRow>().enumerate() {
        let line = index + 2; // header is line 1
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(line, error = %e, "skipping malformed account row");
                continue;
            }
        };

        match account_from_row(row) {
            Some(account) => accounts.push(account),
            None => warn!(line, "skipping account row with missing required fields"),
        }
    }

    Ok(accounts)
}

fn account_from_row(row: AccountRow) -> Option<Account> {
    let name = non_empty(&row.name)?;
    let browser_id = non_empty(&row.browser_id)?;
    let token = non_empty(&row.token)?;
    let uid = non_empty(&row.uid)?;

    Some(Account {
        name,
        browser_id,
        token,
        uid,
        proxy: normalize_proxy_scheme(&row.proxy),
    })
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Normalize a proxy value: empty means none, a bare `host:port` gains an
/// `http://` scheme, known schemes pass through.
pub fn normalize_proxy_scheme(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    const SCHEMES: [&str; 4] = ["http://", "https://", "socks4://", "socks5://"];
    if SCHEMES.iter().any(|scheme| trimmed.starts_with(scheme)) {
        Some(trimmed.to_string())
    } else {
        Some(format!("http://{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_accounts() {
        let file = write_csv(
            "Name,Browser_ID,Token,Proxy,UID\n\
             alice,browser-1,tok-1,http://127.0.0.1:8080,uid-1\n\
             bob,browser-2,tok-2,,uid-2\n",
        );

        let accounts = load_accounts(file.path()).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].name, "alice");
        assert_eq!(accounts[0].proxy.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(accounts[1].proxy, None);
    }

    #[test]
    fn test_rows_with_missing_fields_are_skipped() {
        let file = write_csv(
            "Name,Browser_ID,Token,Proxy,UID\n\
             alice,browser-1,,,uid-1\n\
             bob,browser-2,tok-2,,uid-2\n",
        );

        let accounts = load_accounts(file.path()).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "bob");
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = load_accounts(Path::new("/nonexistent/accounts.csv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_normalize_proxy_scheme() {
        assert_eq!(normalize_proxy_scheme(""), None);
        assert_eq!(normalize_proxy_scheme("   "), None);
        assert_eq!(
            normalize_proxy_scheme("127.0.0.1:8080").as_deref(),
            Some("http://127.0.0.1:8080")
        );
        assert_eq!(
            normalize_proxy_scheme("socks5://10.0.0.1:1080").as_deref(),
            Some("socks5://10.0.0.1:1080")
        );
        assert_eq!(
            normalize_proxy_scheme("https://proxy.example.com").as_deref(),
            Some("https://proxy.example.com")
        );
    }
}
