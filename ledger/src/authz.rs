//! Identity-based access decisions, kept apart from contract logic so they can be tested alone.

use crate::models::ClientIdentity;
use std::collections::BTreeSet;

/// Decides who may perform the verification transition.
#[derive(Clone, Debug)]
pub struct VerifierPolicy {
    verifiers: BTreeSet<String>,
}

impl VerifierPolicy {
    pub fn new<I, S>(verifier_msp_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            verifiers: verifier_msp_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// True iff the caller's organization is one of the configured verifiers.
    pub fn is_authorized(&self, caller: &ClientIdentity) -> bool {
        self.verifiers.contains(&caller.msp_id)
    }
}

/// Membership of a private collection: which organizations receive (and may read) its data.
#[derive(Clone, Debug)]
pub struct CollectionPolicy {
    pub name: String,
    members: BTreeSet<String>,
}

impl CollectionPolicy {
    pub fn new<I, S>(name: impl Into<String>, member_msp_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: member_msp_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_member(&self, caller: &ClientIdentity) -> bool {
        self.members.contains(&caller.msp_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_set_matches_on_organization() {
        let policy = VerifierPolicy::new(["RelayerMSP", "AuditMSP"]);

        assert!(policy.is_authorized(&ClientIdentity::new("RelayerMSP", "relayer")));
        assert!(policy.is_authorized(&ClientIdentity::new("AuditMSP", "anyone")));
        assert!(!policy.is_authorized(&ClientIdentity::new("ReporterMSP", "relayer")));
        assert!(!policy.is_authorized(&ClientIdentity::new("relayermsp", "relayer")));
    }

    #[test]
    fn empty_verifier_set_authorizes_nobody() {
        let policy = VerifierPolicy::new(Vec::<String>::new());
        assert!(!policy.is_authorized(&ClientIdentity::new("RelayerMSP", "relayer")));
    }

    #[test]
    fn collection_membership() {
        let coll = CollectionPolicy::new("collectionRecords", ["ReporterMSP", "RelayerMSP"]);
        assert!(coll.is_member(&ClientIdentity::new("ReporterMSP", "r")));
        assert!(!coll.is_member(&ClientIdentity::new("PublicMSP", "p")));
    }
}
