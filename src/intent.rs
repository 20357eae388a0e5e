// src/intent.rs

//! Free-text request parsing for English and Spanish phrasings.
//!
//! Only extracts an action and its arguments; tokens, amounts and addresses
//! are validated later by the orchestrator exactly as for structured calls.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intent {
    Balance { address: Option<String> },
    Quote { amount: String, source: String, destination: String },
    Transfer { amount: String, token: String, to: String },
    Wrap { amount: String },
    Unwrap { amount: String },
    Swap { amount: String, source: String, destination: String },
    Stake { amount: String },
    Unstake { amount: String },
    ClaimWithdrawals,
    PendingWithdrawals,
    DeployCollection { name: String, symbol: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Balance,
    Quote,
    Transfer,
    Wrap,
    Unwrap,
    Swap,
    Stake,
    Unstake,
    Claim,
    Pending,
    Deploy,
}

const AMOUNT: &str = r"(\d+(?:\.\d+)?)";
const TOKEN: &str = r"([a-z][a-z0-9]{1,9})";
const ADDRESS: &str = r"(0x[0-9a-f]{40})";

fn pattern(template: &str) -> Regex {
    let source = format!(
        "(?i){}",
        template
            .replace("{amount}", AMOUNT)
            .replace("{token}", TOKEN)
            .replace("{address}", ADDRESS)
    );
    Regex::new(&source).unwrap()
}

lazy_static! {
    static ref PATTERNS: Vec<(Action, Regex)> = vec![
        // English
        (Action::Swap, pattern(r"\b(?:swap|trade|exchange|convert)\s+{amount}\s+{token}\s+(?:for|to|into)\s+{token}\b")),
        (Action::Quote, pattern(r"\b(?:quote|price(?:\s+of)?)\s+{amount}\s+{token}\s+(?:for|to|in|into)\s+{token}\b")),
        (Action::Transfer, pattern(r"\b(?:send|transfer|pay)\s+{amount}\s+{token}\s+to\s+{address}\b")),
        (Action::Wrap, pattern(r"\bwrap\s+{amount}")),
        (Action::Unwrap, pattern(r"\bunwrap\s+{amount}")),
        (Action::Stake, pattern(r"\bstake\s+{amount}")),
        (Action::Unstake, pattern(r"\bunstake\s+{amount}")),
        (Action::Claim, pattern(r"\bclaim\b.*\bwithdrawals?\b")),
        (Action::Pending, pattern(r"\b(?:pending\s+withdrawals?|withdrawals?\s+(?:status|pending)|(?:show|list|check)\s+(?:my\s+)?withdrawals?)\b")),
        (Action::Deploy, pattern(r#"\b(?:deploy|create|launch)\s+(?:an?\s+)?(?:nft\s+)?collection\s+(?:called|named)\s+"?([^"]+?)"?\s+(?:with\s+)?symbol\s+([a-z0-9]{1,10})\b"#)),
        (Action::Balance, pattern(r"\b(?:balances?|what\s+do\s+i\s+(?:have|hold))\b")),
        // Spanish
        (Action::Swap, pattern(r"\b(?:intercambia|intercambiar|cambia|cambiar|convierte|convertir)\s+{amount}\s+{token}\s+(?:por|a|en)\s+{token}\b")),
        (Action::Quote, pattern(r"\b(?:cotiza|cotizar|cotización\s+de|precio\s+de)\s+{amount}\s+{token}\s+(?:por|a|en)\s+{token}\b")),
        (Action::Transfer, pattern(r"\b(?:envía|envia|enviar|transfiere|transferir|manda|mandar)\s+{amount}\s+{token}\s+a\s+{address}\b")),
        (Action::Wrap, pattern(r"\b(?:envuelve|envolver)\s+{amount}")),
        (Action::Unwrap, pattern(r"\b(?:desenvuelve|desenvolver)\s+{amount}")),
        (Action::Stake, pattern(r"\b(?:stakea|stakear|haz\s+stake\s+de)\s+{amount}")),
        (Action::Unstake, pattern(r"\b(?:unstakea|desstakea|desstakear|retira\s+del\s+staking)\s+{amount}")),
        (Action::Claim, pattern(r"\breclam(?:a|ar)\b.*\bretiros?\b")),
        (Action::Pending, pattern(r"\b(?:retiros?\s+pendientes?|estado\s+de\s+(?:mis\s+)?retiros?|(?:ver|muestra|mostrar|consulta|consultar)\s+(?:mis\s+)?retiros?)\b")),
        (Action::Deploy, pattern(r#"\b(?:despliega|desplegar|crea|crear|lanza)\s+(?:una\s+)?colecci[oó]n\s+(?:nft\s+)?(?:llamada|con\s+nombre)\s+"?([^"]+?)"?\s+(?:con\s+)?s[ií]mbolo\s+([a-z0-9]{1,10})\b"#)),
        (Action::Balance, pattern(r"\b(?:saldos?|cu[aá]nto\s+tengo)\b")),
    ];
    static ref ANY_ADDRESS: Regex = pattern(ADDRESS);
}

fn capture(caps: &Captures, index: usize) -> String {
    caps.get(index)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Parses `text` into a single intent. Returns `None` when no known phrasing
/// matches or when phrasings for different actions match at once.
pub fn parse_intent(text: &str) -> Option<Intent> {
    let mut matched: Vec<(Action, Captures)> = Vec::new();
    for (action, regex) in PATTERNS.iter() {
        if matched.iter().any(|(seen, _)| seen == action) {
            continue;
        }
        if let Some(caps) = regex.captures(text) {
            matched.push((*action, caps));
        }
    }

    // Claiming pending withdrawals is still a claim.
    if matched.iter().any(|(action, _)| *action == Action::Claim) {
        matched.retain(|(action, _)| *action != Action::Pending);
    }

    if matched.len() != 1 {
        if matched.len() > 1 {
            tracing::debug!("Ambiguous request; {} actions matched", matched.len());
        }
        return None;
    }
    let (action, caps) = matched.pop()?;

    let intent = match action {
        Action::Balance => Intent::Balance {
            address: ANY_ADDRESS.find(text).map(|m| m.as_str().to_string()),
        },
        Action::Quote => Intent::Quote {
            amount: capture(&caps, 1),
            source: capture(&caps, 2),
            destination: capture(&caps, 3),
        },
        Action::Transfer => Intent::Transfer {
            amount: capture(&caps, 1),
            token: capture(&caps, 2),
            to: capture(&caps, 3),
        },
        Action::Wrap => Intent::Wrap { amount: capture(&caps, 1) },
        Action::Unwrap => Intent::Unwrap { amount: capture(&caps, 1) },
        Action::Swap => Intent::Swap {
            amount: capture(&caps, 1),
            source: capture(&caps, 2),
            destination: capture(&caps, 3),
        },
        Action::Stake => Intent::Stake { amount: capture(&caps, 1) },
        Action::Unstake => Intent::Unstake { amount: capture(&caps, 1) },
        Action::Claim => Intent::ClaimWithdrawals,
        Action::Pending => Intent::PendingWithdrawals,
        Action::Deploy => Intent::DeployCollection {
            name: capture(&caps, 1),
            symbol: capture(&caps, 2),
        },
    };
    Some(intent)
}
