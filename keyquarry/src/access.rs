//! Access gate: extracts a client identity from call metadata,
//! auto-registers unknown clients, and enforces the privileged-client
//! bypass and read-only mode. No teacher analogue — the teacher never
//! modeled multi-client identity — so this follows the kernel's small,
//! single-purpose-module shape directly from the spec.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::config::Configuration;
use crate::error::Error;

pub const CLIENT_ID_METADATA_KEY: &str = "client_id";

#[derive(Default)]
pub struct AccessGate {
    registered: Mutex<HashSet<String>>,
    require_registration: bool,
}

/// A mutation request classified against readonly mode and privilege.
pub enum Mutation {
    /// Any write other than `SetReadOnly`.
    Ordinary,
    /// The `SetReadOnly` call itself, always allowed for a privileged caller.
    SetReadOnly,
    /// `Clear(force = true)`, privileged only.
    ForceClear,
}

impl AccessGate {
    pub fn new(require_registration: bool) -> Self {
        AccessGate { registered: Mutex::new(HashSet::new()), require_registration }
    }

    /// Extract `client_id` from metadata, auto-registering it on first use
    /// unless registration is required up front.
    pub fn resolve_client_id(&self, metadata: &[(&str, &str)]) -> Result<String, Error> {
        let client_id = metadata
            .iter()
            .find(|(k, _)| *k == CLIENT_ID_METADATA_KEY)
            .map(|(_, v)| v.to_string())
            .ok_or_else(|| Error::InvalidArgument("missing client_id metadata".to_string()))?;

        let mut registered = self.registered.lock().unwrap();
        if !registered.contains(&client_id) {
            if self.require_registration {
                return Err(Error::PermissionDenied(format!(
                    "client {client_id} is not registered"
                )));
            }
            registered.insert(client_id.clone());
        }
        Ok(client_id)
    }

    pub fn register(&self, client_id: &str) {
        self.registered.lock().unwrap().insert(client_id.to_string());
    }

    pub fn is_registered(&self, client_id: &str) -> bool {
        self.registered.lock().unwrap().contains(client_id)
    }

    /// Readonly mode rejects any mutation other than `SetReadOnly` by the
    /// privileged client; a privileged client bypasses readonly mode,
    /// foreign-lock enforcement, and force-clear restrictions entirely.
    pub fn authorize_mutation(
        &self,
        config: &Configuration,
        client_id: &str,
        mutation: Mutation,
    ) -> Result<(), Error> {
        let privileged = config.is_privileged(client_id);
        match mutation {
            Mutation::ForceClear if !privileged => {
                Err(Error::PermissionDenied("force clear requires a privileged client".to_string()))
            }
            Mutation::SetReadOnly if !privileged => {
                Err(Error::PermissionDenied("SetReadOnly requires a privileged client".to_string()))
            }
            _ if config.is_readonly() && !privileged => Err(Error::ReadOnly),
            _ => Ok(()),
        }
    }

    pub fn is_privileged(&self, config: &Configuration, client_id: &str) -> bool {
        config.is_privileged(client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_registers_unknown_client() {
        let gate = AccessGate::new(false);
        let id = gate.resolve_client_id(&[("client_id", "c1")]).unwrap();
        assert_eq!(id, "c1");
        assert!(gate.is_registered("c1"));
    }

    #[test]
    fn rejects_missing_metadata() {
        let gate = AccessGate::new(false);
        assert!(gate.resolve_client_id(&[]).is_err());
    }

    #[test]
    fn requires_registration_when_configured() {
        let gate = AccessGate::new(true);
        assert!(gate.resolve_client_id(&[("client_id", "c1")]).is_err());
        gate.register("c1");
        assert!(gate.resolve_client_id(&[("client_id", "c1")]).is_ok());
    }

    #[test]
    fn readonly_blocks_non_privileged_mutation() {
        let gate = AccessGate::new(false);
        let mut cfg = Configuration::default();
        cfg.readonly = Some(true);
        assert!(gate.authorize_mutation(&cfg, "c1", Mutation::Ordinary).is_err());
    }

    #[test]
    fn privileged_client_bypasses_readonly() {
        let gate = AccessGate::new(false);
        let mut cfg = Configuration::default();
        cfg.readonly = Some(true);
        cfg.privileged_client_id = Some("admin".to_string());
        assert!(gate.authorize_mutation(&cfg, "admin", Mutation::Ordinary).is_ok());
        assert!(gate.authorize_mutation(&cfg, "admin", Mutation::SetReadOnly).is_ok());
    }

    #[test]
    fn force_clear_requires_privilege() {
        let gate = AccessGate::new(false);
        let cfg = Configuration::default();
        assert!(gate.authorize_mutation(&cfg, "c1", Mutation::ForceClear).is_err());
    }
}
