//! System prompts for the summary styles.
//!
//! The style → prompt mapping lives here so the providers stay wire-level
//! only.

use indoc::indoc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStyle {
    /// Structured handoff summary for the receiving agent.
    #[default]
    Transfer,
    /// 2-3 sentences, actionable information only.
    Brief,
    /// Full timeline with all topics discussed.
    Detailed,
}

const BASE: &str = indoc! {r#"
    You are an assistant generating concise, actionable call summaries for
    warm transfers in a customer service environment. Analyze the
    conversation and produce a summary that lets the receiving agent
    continue the conversation seamlessly.
"#};

const TRANSFER_FORMAT: &str = indoc! {r#"
    Structure the summary as:

    1. CALLER PROFILE: name, account or reference numbers if mentioned.
    2. REASON FOR CALL: primary issue, urgency (Low/Medium/High), category.
    3. CONVERSATION HIGHLIGHTS: key points, solutions attempted so far.
    4. CURRENT STATUS: what is resolved, what is not, next steps.
    5. TRANSFER CONTEXT: why the transfer is happening and what the
       receiving agent should focus on.

    Use bullet points. Keep the whole summary under 400 words.
"#};

const BRIEF_FORMAT: &str = indoc! {r#"
    Write 2-3 sentences covering: who is calling and why, what has been
    discussed or attempted, and what the receiving agent needs to do next.
    Keep it under 100 words, actionable information only.
"#};

const DETAILED_FORMAT: &str = indoc! {r#"
    Provide a full analysis: complete conversation timeline, every topic
    discussed, technical details and specifications, and follow-up
    requirements. Use clear headings and bullet points.
"#};

impl SummaryStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStyle::Transfer => "transfer",
            SummaryStyle::Brief => "brief",
            SummaryStyle::Detailed => "detailed",
        }
    }

    pub fn system_prompt(&self) -> String {
        let format = match self {
            SummaryStyle::Transfer => TRANSFER_FORMAT,
            SummaryStyle::Brief => BRIEF_FORMAT,
            SummaryStyle::Detailed => DETAILED_FORMAT,
        };
        format!("{BASE}\n{format}")
    }
}

impl std::str::FromStr for SummaryStyle {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "transfer" => Ok(SummaryStyle::Transfer),
            "brief" => Ok(SummaryStyle::Brief),
            "detailed" => Ok(SummaryStyle::Detailed),
            other => Err(format!("unknown summary style: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styles_round_trip_through_strings() {
        for style in [SummaryStyle::Transfer, SummaryStyle::Brief, SummaryStyle::Detailed] {
            assert_eq!(style.as_str().parse::<SummaryStyle>().unwrap(), style);
        }
    }

    #[test]
    fn prompts_share_the_preamble() {
        for style in [SummaryStyle::Transfer, SummaryStyle::Brief, SummaryStyle::Detailed] {
            assert!(style.system_prompt().starts_with(BASE));
        }
    }
}
