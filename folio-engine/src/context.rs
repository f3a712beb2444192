use crate::uploads::FileLedger;
use folio_types::{TransactionId, UserId};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};

/// The authenticated requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Auth collection the user belongs to.
    pub collection: String,
}

impl User {
    pub fn new(id: impl Into<UserId>, collection: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
        }
    }
}

/// Per-request state threaded through one operation (and any operation it
/// calls from a hook).
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user: Option<User>,
    pub locale: Option<String>,
    pub fallback_locale: Option<String>,
    /// Set while a transaction is open for this request.
    pub transaction: Option<TransactionId>,
    /// Free-form values shared between hooks of the same request.
    pub context: Map<String, Value>,
    /// File cleanup deferred to whoever owns the transaction. Clones of a
    /// request share it, so updates issued from hooks report back here.
    files: Arc<Mutex<FileLedger>>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: User) -> Self {
        Self {
            user: Some(user),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>, fallback: Option<&str>) -> Self {
        self.locale = Some(locale.into());
        self.fallback_locale = fallback.map(str::to_string);
        self
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.id)
    }

    /// Takes the file cleanup left by updates that ran inside a transaction
    /// this request's caller owns. Hand it to
    /// [`crate::MutationEngine::settle_files`] once that transaction ends.
    pub fn take_files(&self) -> FileLedger {
        std::mem::take(&mut *self.files.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn defer_files(&self, ledger: FileLedger) {
        if ledger.is_empty() {
            return;
        }
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .absorb(ledger);
    }
}
