#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use wizard_auth::{AuthError, CredentialRecord, CredentialStore};

#[derive(Default)]
pub struct InMemoryCredentialStore {
    records: Mutex<HashMap<String, CredentialRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, provider: &str, record: CredentialRecord) {
        self.records
            .lock()
            .expect("store lock poisoned")
            .insert(provider.to_string(), record);
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self, provider: &str) -> Option<CredentialRecord> {
        self.records
            .lock()
            .expect("store lock poisoned")
            .get(provider)
            .cloned()
    }

    fn upsert(&self, provider: &str, record: CredentialRecord) -> Result<(), AuthError> {
        self.records
            .lock()
            .expect("store lock poisoned")
            .insert(provider.to_string(), record);
        Ok(())
    }

    fn remove(&self, provider: &str) -> Result<bool, AuthError> {
        Ok(self
            .records
            .lock()
            .expect("store lock poisoned")
            .remove(provider)
            .is_some())
    }

    fn all(&self) -> HashMap<String, CredentialRecord> {
        self.records.lock().expect("store lock poisoned").clone()
    }
}

pub fn token_record(access_token: &str) -> CredentialRecord {
    CredentialRecord {
        access_token: Some(access_token.to_string()),
        refresh_token: Some("refresh-1".to_string()),
        issued_at: Some(Utc::now()),
        ..CredentialRecord::default()
    }
}
