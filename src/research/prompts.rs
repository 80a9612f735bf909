//! Default prompt templates and the deterministic fallbacks used when no
//! planner or synthesizer is available.

use crate::agents::AgentKind;

pub const PLAN_TEMPLATE: &str = "You are a research supervisor. Create a brief research plan for this query:

Query: {query}

Today's date: {date}

Output a concise 2-3 sentence plan explaining how three parallel deep research agents (Gemini, OpenAI, Perplexity) should approach this query.";

pub const AGENT_TEMPLATE: &str = "You are a deep research agent. Conduct comprehensive research on the following query and provide a detailed, well-structured report with citations where possible.

Query: {query}

Provide a thorough analysis covering:
1. Key findings and facts
2. Multiple perspectives
3. Supporting evidence
4. Conclusions and recommendations";

pub const PERPLEXITY_AGENT_TEMPLATE: &str = "You are a deep research agent with access to real-time web data. Conduct comprehensive research on the following query and provide a detailed, well-structured report with citations.

Query: {query}

Provide a thorough analysis covering:
1. Key findings and facts (with sources)
2. Multiple perspectives
3. Supporting evidence
4. Conclusions and recommendations";

pub const SYNTHESIS_TEMPLATE: &str = "You are a research synthesis expert. Analyze the following research reports from three different AI research agents and create a comprehensive consensus report.

Original Query: {query}

Today's date: {date}

{reports}

---

Create a well-structured consensus report in Markdown format that:
1. Synthesizes the key findings from all available reports
2. Identifies areas of agreement and any conflicting information
3. Provides a balanced, comprehensive answer to the original query
4. Includes citations where the source reports provided them
5. Highlights the most reliable and well-supported conclusions

Format with clear headers, bullet points, and proper Markdown formatting.";

const REPORT_SEPARATOR: &str = "\n\n---\n\n";

pub fn default_agent_template(kind: AgentKind) -> &'static str {
    match kind {
        AgentKind::Perplexity => PERPLEXITY_AGENT_TEMPLATE,
        AgentKind::Gemini | AgentKind::OpenAI => AGENT_TEMPLATE,
    }
}

/// Plan used when no planner is available
pub fn fallback_plan(query: &str) -> String {
    format!(
        "Research plan for: {}\n\
         - Gather comprehensive data from Gemini Deep Research\n\
         - Analyze with OpenAI Deep Research\n\
         - Cross-reference with Perplexity Deep Research",
        query
    )
}

/// One `## <Agent> Research Report` section per completed agent.
pub fn combine_reports(outputs: &[(AgentKind, String)]) -> String {
    outputs
        .iter()
        .map(|(kind, output)| format!("## {} Research Report\n\n{}", kind.display_name(), output))
        .collect::<Vec<_>>()
        .join(REPORT_SEPARATOR)
}

/// Consensus used when no synthesizer is available
pub fn fallback_consensus(query: &str, combined: &str) -> String {
    format!(
        "# Meta-Deep Research Consensus Report\n\n**Query:** {}\n\n---\n\n{}",
        query, combined
    )
}

/// Report stored when the synthesizer failed; keeps the raw agent reports.
pub fn degraded_consensus(query: &str, error: &str, combined: &str) -> String {
    format!(
        "# Meta-Deep Research Report\n\n**Query:** {}\n\n*Synthesis error: {}*\n\n---\n\n{}",
        query, error, combined
    )
}
