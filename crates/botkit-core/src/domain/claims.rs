//! Caller identity claims and skill-caller detection.

use serde::{Deserialize, Serialize};

/// Claim carrying the token version (`1.0` or `2.0`).
pub const VERSION_CLAIM: &str = "ver";
/// Claim carrying the token audience.
pub const AUDIENCE_CLAIM: &str = "aud";
/// App id claim of v1 tokens.
pub const APP_ID_CLAIM: &str = "appid";
/// Authorized party claim, the app id of v2 tokens.
pub const AUTHORIZED_PARTY_CLAIM: &str = "azp";
/// Audience of tokens the channel service issues to bots.
pub const CHANNEL_TOKEN_ISSUER: &str = "https://api.botframework.com";
/// App id used by skills called without credentials.
pub const ANONYMOUS_SKILL_APP_ID: &str = "AnonymousSkill";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// The authenticated (or anonymous) identity behind an inbound activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsIdentity {
    pub claims: Vec<Claim>,
    #[serde(default)]
    pub is_authenticated: bool,
}

impl ClaimsIdentity {
    pub fn new(claims: Vec<Claim>) -> Self {
        Self {
            claims,
            is_authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build an identity from `(type, value)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(pairs.into_iter().map(|(t, v)| Claim::new(t, v)).collect())
    }

    /// Value of the first claim of `claim_type`.
    pub fn find(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// App id of the caller: `appid` for v1 tokens, `azp` for v2 tokens.
    pub fn app_id(&self) -> Option<&str> {
        match self.find(VERSION_CLAIM) {
            Some("2.0") => self.find(AUTHORIZED_PARTY_CLAIM),
            _ => self.find(APP_ID_CLAIM),
        }
    }

    /// `true` when the caller is another bot invoking this one as a skill.
    ///
    /// A skill token carries a version, has an audience that is not the
    /// channel service, and was issued to an app id different from that
    /// audience. Anonymous skill callers always qualify.
    pub fn is_skill_claim(&self) -> bool {
        if self
            .claims
            .iter()
            .any(|c| c.claim_type == APP_ID_CLAIM && c.value == ANONYMOUS_SKILL_APP_ID)
        {
            return true;
        }

        if self.find(VERSION_CLAIM).is_none() {
            return false;
        }

        let audience = match self.find(AUDIENCE_CLAIM) {
            Some(aud) if !aud.eq_ignore_ascii_case(CHANNEL_TOKEN_ISSUER) => aud,
            _ => return false,
        };

        match self.app_id() {
            Some(app_id) => app_id != audience,
            None => false,
        }
    }
}
