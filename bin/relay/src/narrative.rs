//! Observation and diary text.
//!
//! Text generation is an external collaborator; whenever it is missing or
//! fails, templated text is used instead so a travel never stalls on it.

use crate::scheduler::catalog::Landmark;
use alloy_primitives::Address;
use std::sync::Arc;

#[derive(Debug)]
pub struct NarrativeError(pub String);

impl std::fmt::Display for NarrativeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Narrative generation failed: {}", self.0)
    }
}

impl std::error::Error for NarrativeError {}

/// What the frog is looking at
#[derive(Debug, Clone)]
pub struct ObservationContext {
    pub token_id: u64,
    pub frog_name: String,
    pub chain_id: u64,
    pub chain_name: String,
    /// `None` when the connector picks the address on-chain
    pub target: Option<Address>,
    pub is_contract: bool,
    pub landmark: Option<Landmark>,
    pub neighbor_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DiaryContext {
    pub token_id: u64,
    pub frog_name: String,
    pub chain_name: String,
    pub explorations: usize,
    pub discoveries: Vec<String>,
    pub xp_earned: u64,
}

#[async_trait::async_trait]
pub trait NarrativeService: Send + Sync {
    async fn observation(&self, ctx: &ObservationContext) -> Result<String, NarrativeError>;

    async fn diary(&self, ctx: &DiaryContext) -> Result<String, NarrativeError>;
}

fn short(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Deterministic templates keyed on the token and target
pub struct TemplateNarrator;

const WALLET_LINES: &[&str] = &[
    "found a quiet wallet at {addr}, nobody seems to be home.",
    "sniffed around {addr}, just a few crumbs of gas left behind.",
    "left a tiny footprint next to {addr} and hopped on.",
];

const ROAMING_LINES: &[&str] = &[
    "wandered off to see where the chain would take it.",
    "followed a trail of fresh transactions into the unknown.",
    "closed its eyes and hopped wherever the block led.",
];

const CONTRACT_LINES: &[&str] = &[
    "peeked inside the contract at {addr}, lots of gears turning.",
    "watched the contract at {addr} hum along for a while.",
    "knocked on {addr}, the contract answered in bytecode.",
];

impl TemplateNarrator {
    pub fn observation(&self, ctx: &ObservationContext) -> String {
        let body = match (&ctx.landmark, ctx.target) {
            (Some(landmark), _) => landmark.description(),
            (None, None) => ROAMING_LINES[ctx.token_id as usize % ROAMING_LINES.len()].to_string(),
            (None, Some(target)) => match &ctx.neighbor_name {
                Some(neighbor) => {
                    format!("dropped by {}'s home at {} to say hello.", neighbor, short(&target))
                }
                None => {
                    let lines = if ctx.is_contract { CONTRACT_LINES } else { WALLET_LINES };
                    let index = (ctx.token_id as usize + target.0[19] as usize) % lines.len();
                    lines[index].replace("{addr}", &short(&target))
                }
            },
        };
        format!("{}: {}", ctx.frog_name, body)
    }

    pub fn diary(&self, ctx: &DiaryContext) -> String {
        let mut diary = format!(
            "Dear diary, {} hopped over to {} and explored {} place{}.",
            ctx.frog_name,
            ctx.chain_name,
            ctx.explorations,
            if ctx.explorations == 1 { "" } else { "s" }
        );
        if !ctx.discoveries.is_empty() {
            diary.push_str(&format!(" Highlights: {}.", ctx.discoveries.join(", ")));
        }
        diary.push_str(&format!(" Came home with {} XP.", ctx.xp_earned));
        diary
    }
}

/// External narrative service with template fallback
pub struct Narrator {
    service: Option<Arc<dyn NarrativeService>>,
    templates: TemplateNarrator,
}

impl Narrator {
    pub fn new(service: Option<Arc<dyn NarrativeService>>) -> Self {
        Self {
            service,
            templates: TemplateNarrator,
        }
    }

    pub fn templates_only() -> Self {
        Self::new(None)
    }

    pub async fn observation(&self, ctx: &ObservationContext) -> String {
        if let Some(service) = &self.service {
            match service.observation(ctx).await {
                Ok(text) if !text.trim().is_empty() => return text,
                Ok(_) => tracing::warn!(token_id = ctx.token_id, "Empty observation, using template"),
                Err(e) => tracing::warn!(token_id = ctx.token_id, %e, "Observation failed, using template"),
            }
        }
        self.templates.observation(ctx)
    }

    pub async fn diary(&self, ctx: &DiaryContext) -> String {
        if let Some(service) = &self.service {
            match service.diary(ctx).await {
                Ok(text) if !text.trim().is_empty() => return text,
                Ok(_) => tracing::warn!(token_id = ctx.token_id, "Empty diary, using template"),
                Err(e) => tracing::warn!(token_id = ctx.token_id, %e, "Diary failed, using template"),
            }
        }
        self.templates.diary(ctx)
    }
}
