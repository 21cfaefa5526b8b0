//! Fixed strings of the policy-writing team.

/// Display name of the human-driven participant.
pub const USER_PROXY_NAME: &str = "User Proxy";
pub const REVIEWER_NAME: &str = "Reviewer";
pub const WRITER_NAME: &str = "Technical Writer";

/// Author label of notices that come from the application itself.
pub const SYSTEM_AUTHOR: &str = "PoliGen";

/// Output requirements appended to every task.
pub const CONTEXT: &str = "- Task: PoliGen specialises in creating high-quality and detailed cybersecurity policies. The target audience is organisations that want to update their policy documentation to reflect recognised information security best practices.

    Output Specifications:

    • Output Style and Format: Write policy documents that are thorough and detailed. Ensure grammatical accuracy, coherence, and stylistic refinement. Structure the policy document logically and clearly.

    • Tone: The tone is formal and professional.

    • Section Headings and Subheadings: Create titles and subheadings that are clear, concise, and descriptive.

    • Section Headings: Use a consistent format for section headings.

    • Subheadings: Use a consistent format for subheadings.

    • Content Structure: Use bullet points or numbered lists to present information in a clear and concise manner.

    Sample output:

    - Introduction
    - Purpose
    - Scope
    - Policy Details (this section and subheadings will vary depending on the policy type)
    - Responsibilities
    - Enforcement
    - Definitions
    - References
    - Revision History
    - Appendix A: Glossary
    - Appendix B: Acronyms
    - Appendix C: Document Control

    ";

pub const REVIEWER_SYSTEM_MESSAGE: &str = "Reviewer. Reviews the policy document, focuses on the structure and clarity of the content.
Ensures policies are detailed and thorough.
Highly focussed on helping the Technical Writer to create a high-quality policy document.
Only provides suggestions for improvement.";

pub const WRITER_SYSTEM_MESSAGE: &str = "Technical Writer. Creates high-quality and detailed information security policies, focusing on recognised information security best practices.
Writes policy documents that are thorough and detailed.
Crafts documents using a formal and professional tone.
Structures content with effective subheadings and bullet points to facilitate reader comprehension.";

pub const USER_PROXY_SYSTEM_MESSAGE: &str =
    "User Proxy. Provides feedback on the policy document and guides the team through the process.";

/// Published by the User Proxy when a session starts.
pub const GREETING: &str = "Hi, this is the PoliGen agent team 🤖. Please specify a cybersecurity domain for us to write a policy about (e.g. Data Classification, Remote Access).";

/// Published before the first run of a session.
pub const STARTING_NOTICE: &str = "Starting agents on task of creating a policy document...";

const TASK_PREFIX: &str = "Write a policy document for the following cybersecurity domain: ";
const TASK_SUFFIX: &str = ". The final output should adhere to these requirements: \n";

/// Task message that opens a conversation about `domain`.
pub fn compose_task(domain: &str) -> String {
    let mut task = String::with_capacity(
        TASK_PREFIX.len() + domain.len() + TASK_SUFFIX.len() + CONTEXT.len(),
    );
    task.push_str(TASK_PREFIX);
    task.push_str(domain);
    task.push_str(TASK_SUFFIX);
    task.push_str(CONTEXT);
    task
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_embeds_domain_then_requirements() {
        let task = compose_task("Data Classification");
        assert!(task.starts_with(
            "Write a policy document for the following cybersecurity domain: Data Classification."
        ));
        assert!(task.ends_with(CONTEXT));
        assert!(task.contains("requirements: \n- Task: PoliGen"));
    }

    #[test]
    fn domain_is_not_trimmed() {
        assert!(compose_task(" VPN ").contains("domain:  VPN ."));
    }
}
