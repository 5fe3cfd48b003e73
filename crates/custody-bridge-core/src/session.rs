use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy::primitives::Address;

use crate::error::ProviderError;
use crate::ports::{PortError, ServicePort};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub session_code: Option<String>,
    pub connected: bool,
    /// Accounts exactly as the custody service sent them.
    pub accounts: Vec<String>,
}

/// Authentication state shared by every request on a provider.
#[derive(Debug, Default)]
pub struct Session {
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // Session fields are plain values; a poisoned lock still holds a usable state.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Records a completed handshake. Overwrites any previous session.
    pub fn mark_connected(&self, code: String, accounts: Vec<String>) {
        let mut g = self.lock();
        g.session_code = Some(code);
        g.connected = true;
        g.accounts = accounts;
    }

    pub fn session_code(&self) -> Option<String> {
        self.lock().session_code.clone()
    }

    pub fn current_accounts(&self) -> Vec<String> {
        self.lock().accounts.clone()
    }

    pub fn primary_account(&self) -> Option<String> {
        self.lock().accounts.first().cloned()
    }

    /// Returns whether the cached list changed.
    pub fn replace_accounts(&self, accounts: Vec<String>) -> bool {
        let mut g = self.lock();
        if g.accounts == accounts {
            return false;
        }
        g.accounts = accounts;
        true
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    /// Fetches the account list for the current session code and caches it.
    pub async fn refresh_accounts<S: ServicePort + ?Sized>(
        &self,
        service: &S,
        chain: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let code = self.session_code().ok_or_else(|| {
            PortError::NotFound("session code missing; authenticate first".to_owned())
        })?;
        let raw = service.fetch_accounts(chain, &code).await?;
        let accounts = parse_accounts(&raw)?;
        self.replace_accounts(accounts.clone());
        Ok(accounts)
    }
}

/// Checks every entry is a 20-byte hex address. The strings are returned
/// untouched; callers see the casing the service chose.
pub(crate) fn parse_accounts(raw: &[String]) -> Result<Vec<String>, PortError> {
    for s in raw {
        s.parse::<Address>()
            .map_err(|e| PortError::Validation(format!("invalid account address {s}: {e}")))?;
    }
    Ok(raw.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "0x1000000000000000000000000000000000000001";

    #[test]
    fn starts_disconnected_and_connects_atomically() {
        let session = Session::new();
        assert!(!session.is_connected());
        assert!(session.current_accounts().is_empty());
        assert!(session.session_code().is_none());

        session.mark_connected("code-1".to_owned(), vec![ACCOUNT.to_owned()]);
        let snap = session.snapshot();
        assert!(snap.connected);
        assert_eq!(snap.session_code.as_deref(), Some("code-1"));
        assert_eq!(session.primary_account().as_deref(), Some(ACCOUNT));
    }

    #[test]
    fn replace_accounts_reports_changes() {
        let session = Session::new();
        assert!(session.replace_accounts(vec![ACCOUNT.to_owned()]));
        assert!(!session.replace_accounts(vec![ACCOUNT.to_owned()]));
    }

    #[test]
    fn parse_accounts_rejects_garbage() {
        let err = parse_accounts(&["0x12".to_owned()]).expect_err("short address");
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[test]
    fn parse_accounts_keeps_service_casing() {
        let lower = "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd".to_owned();
        let upper = "0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD".to_owned();
        let parsed = parse_accounts(&[lower.clone(), upper.clone()]).expect("valid hex");
        assert_eq!(parsed, vec![lower, upper]);
    }
}
