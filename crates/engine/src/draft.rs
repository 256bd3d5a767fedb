//! Draft generation: the capability trait, two implementations, and the
//! adapter that turns generator failures into an absent draft.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cadence_core::types::{Channel, Company, Contact};
use cadence_core::{CadenceError, CadenceResult};

/// Everything a generator may use to write one step's message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    pub contact_id: String,
    pub company_domain: String,
    pub contact: Option<Contact>,
    pub company: Option<Company>,
    pub channel: Channel,
    pub step_index: usize,
    pub tone: String,
    pub template: Option<String>,
    pub notes: Option<String>,
    /// CRM the acting user logs calls in; only set for call steps.
    pub crm_domain: Option<String>,
    pub sender: String,
}

/// Opaque text generator for outreach content.
#[async_trait]
pub trait DraftGenerator: Send + Sync {
    async fn generate(&self, request: &DraftRequest) -> CadenceResult<String>;
}

// ─── Template renderer ─────────────────────────────────────────────────────

/// Local `{{variable}}` renderer. Uses the step template when one is set,
/// otherwise a per-channel default.
#[derive(Debug, Clone, Default)]
pub struct TemplateDraftGenerator;

impl TemplateDraftGenerator {
    pub fn new() -> Self {
        Self
    }

    fn default_template(channel: Channel) -> &'static str {
        match channel {
            Channel::Email => {
                "Subject: Quick question for {{company}}\n\nHi {{first_name}},\n\n\
                 I'd love to learn how {{company}} approaches this today. \
                 Open to a short chat?\n\n{{sender}}"
            }
            Channel::Call => {
                "Call {{name}} ({{title}}) at {{company}}. Phone: {{phone}}. \
                 Log the call in {{crm_domain}}."
            }
            Channel::LinkedinConnect => {
                "Hi {{first_name}}, I came across your work at {{company}} and would like to connect."
            }
            Channel::LinkedinInmail => {
                "Hi {{first_name}},\n\nI'm reaching out because teams like {{company}} \
                 often ask us about this. Worth a conversation?\n\n{{sender}}"
            }
            Channel::Whatsapp => "Hi {{first_name}}, this is {{sender}}. Do you have a minute this week?",
        }
    }

    fn variables(request: &DraftRequest) -> HashMap<&'static str, String> {
        let contact = request.contact.as_ref();
        let name = contact
            .map(|c| c.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "there".to_string());
        let first_name = name.split_whitespace().next().unwrap_or("there").to_string();
        let company = request
            .company
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| request.company_domain.clone());

        let mut vars = HashMap::new();
        vars.insert("name", name);
        vars.insert("first_name", first_name);
        vars.insert("company", company);
        vars.insert("domain", request.company_domain.clone());
        vars.insert(
            "title",
            contact.and_then(|c| c.title.clone()).unwrap_or_default(),
        );
        vars.insert(
            "phone",
            contact.and_then(|c| c.phone.clone()).unwrap_or_default(),
        );
        vars.insert("crm_domain", request.crm_domain.clone().unwrap_or_default());
        vars.insert("sender", request.sender.clone());
        vars.insert("tone", request.tone.clone());
        vars
    }

    pub fn render(&self, request: &DraftRequest) -> String {
        let template = request
            .template
            .as_deref()
            .unwrap_or_else(|| Self::default_template(request.channel));
        let mut body = template.to_string();
        for (name, value) in Self::variables(request) {
            body = body.replace(&format!("{{{{{name}}}}}"), &value);
        }
        if let Some(notes) = &request.notes {
            body.push_str(&format!("\n\n[Notes: {notes}]"));
        }
        body
    }
}

#[async_trait]
impl DraftGenerator for TemplateDraftGenerator {
    async fn generate(&self, request: &DraftRequest) -> CadenceResult<String> {
        Ok(self.render(request))
    }
}

// ─── HTTP draft service ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DraftResponse {
    #[serde(alias = "draft", alias = "text")]
    content: String,
}

/// Client for an external draft-generation service: POSTs the request as
/// JSON and expects `{"content": "..."}` back.
pub struct HttpDraftGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpDraftGenerator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> CadenceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CadenceError::Config(format!("draft client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DraftGenerator for HttpDraftGenerator {
    async fn generate(&self, request: &DraftRequest) -> CadenceResult<String> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| CadenceError::Collaborator(format!("draft service unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CadenceError::Collaborator(format!(
                "draft service returned {status}"
            )));
        }

        let body: DraftResponse = response
            .json()
            .await
            .map_err(|e| CadenceError::Collaborator(format!("invalid draft response: {e}")))?;
        Ok(body.content)
    }
}

// ─── Adapter ───────────────────────────────────────────────────────────────

/// Wraps a generator so that failures never propagate: the step advances
/// with no draft instead.
#[derive(Clone)]
pub struct DraftAdapter {
    generator: Arc<dyn DraftGenerator>,
}

impl DraftAdapter {
    pub fn new(generator: Arc<dyn DraftGenerator>) -> Self {
        Self { generator }
    }

    pub async fn produce(&self, request: &DraftRequest) -> Option<String> {
        match self.generator.generate(request).await {
            Ok(content) if !content.trim().is_empty() => {
                debug!(
                    contact_id = %request.contact_id,
                    channel = %request.channel,
                    len = content.len(),
                    "Draft generated"
                );
                metrics::counter!("cadence.drafts.generated", "channel" => request.channel.as_str())
                    .increment(1);
                Some(content)
            }
            Ok(_) => {
                warn!(contact_id = %request.contact_id, "Draft generator returned empty content");
                metrics::counter!("cadence.drafts.failed", "reason" => "empty").increment(1);
                None
            }
            Err(e) => {
                warn!(
                    contact_id = %request.contact_id,
                    channel = %request.channel,
                    error = %e,
                    "Draft generation failed, continuing without draft"
                );
                metrics::counter!("cadence.drafts.failed", "reason" => e.code()).increment(1);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(channel: Channel) -> DraftRequest {
        DraftRequest {
            contact_id: "c-1".into(),
            company_domain: "acme.io".into(),
            contact: Some(Contact {
                id: "c-1".into(),
                name: "Ada Lovelace".into(),
                title: Some("CTO".into()),
                phone: Some("+1 555 0100".into()),
                ..Default::default()
            }),
            company: Some(Company {
                domain: "acme.io".into(),
                name: "Acme".into(),
                ..Default::default()
            }),
            channel,
            step_index: 0,
            tone: "professional".into(),
            template: None,
            notes: None,
            crm_domain: Some("acme.hubspot.com".into()),
            sender: "alice".into(),
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl DraftGenerator for FailingGenerator {
        async fn generate(&self, _request: &DraftRequest) -> CadenceResult<String> {
            Err(CadenceError::Collaborator("boom".into()))
        }
    }

    #[test]
    fn test_default_templates_fill_variables() {
        let gen = TemplateDraftGenerator::new();
        let email = gen.render(&request(Channel::Email));
        assert!(email.contains("Hi Ada,"));
        assert!(email.contains("Acme"));
        assert!(email.ends_with("alice"));

        let call = gen.render(&request(Channel::Call));
        assert!(call.contains("Ada Lovelace (CTO)"));
        assert!(call.contains("acme.hubspot.com"));
        assert!(!call.contains("{{"));
    }

    #[test]
    fn test_custom_template_and_unknown_contact() {
        let mut req = request(Channel::Whatsapp);
        req.contact = None;
        req.company = None;
        req.template = Some("Hey {{first_name}} from {{company}}".into());
        req.notes = Some("met at conf".into());
        let body = TemplateDraftGenerator::new().render(&req);
        assert_eq!(body, "Hey there from acme.io\n\n[Notes: met at conf]");
    }

    #[tokio::test]
    async fn test_adapter_swallows_failures() {
        let adapter = DraftAdapter::new(Arc::new(FailingGenerator));
        assert!(adapter.produce(&request(Channel::Email)).await.is_none());

        let adapter = DraftAdapter::new(Arc::new(TemplateDraftGenerator::new()));
        assert!(adapter.produce(&request(Channel::Email)).await.is_some());
    }
}
