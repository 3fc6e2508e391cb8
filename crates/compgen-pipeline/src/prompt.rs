//! Messages sent to the model for a generation.
//!
//! The model keeps no memory between calls, so follow-up edits resend the
//! whole previous component verbatim.

use compgen_harness::ChatMessage;

use crate::request::GenerationRequest;

pub const SYSTEM_PROMPT: &str = r#"You are an expert React/TypeScript developer. Generate ONLY valid React component code.

RULES:
1. Output a single React/TypeScript source file. No explanations, no markdown fences, no prose before or after the code.
2. Start directly with the import statements.
3. Use functional components and TypeScript interfaces for props and state.
4. Style exclusively with inline style={{}} objects using camelCase CSS properties. Never use className or utility classes.
5. Include every import the code needs (React, useState, useEffect, ...).
6. Export the component as default: "export default function ComponentName() { ... }".
7. Make the component interactive and accessible, with sensible state handling and hover/focus feedback done through inline styles.

SHAPE:
import React, { useState } from 'react';

interface ComponentNameProps {}

export default function ComponentName() {
  const [value, setValue] = useState('');
  return (
    <div style={{ display: 'flex', flexDirection: 'column', padding: '2rem', backgroundColor: '#f3f4f6' }}>
    </div>
  );
}"#;

const STYLE_REMINDER: &str = "REMEMBER: Use ONLY inline styles (style={{}}), NO className prop, NO Tailwind classes. Make it beautiful with proper colors, spacing, and interactions.";

/// The user message for `request`.
///
/// Follow-ups embed the prior code ahead of the instruction and ask for the
/// complete updated component rather than a diff.
pub fn user_message(request: &GenerationRequest) -> String {
    let prompt = request.prompt.trim();
    match request.prior_code() {
        Some(prior) => format!(
            "Previous code:\n{prior}\n\nUser request: {prompt}\n\nPlease apply the requested changes and return the full updated component, not a diff. {STYLE_REMINDER}"
        ),
        None => format!(
            "Create a React TypeScript component with the following requirements: {prompt}\n\n{STYLE_REMINDER}"
        ),
    }
}

/// System prompt followed by the user message.
pub fn compose_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_message(request)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use compgen_harness::ChatRole;

    #[test]
    fn first_turn_wraps_prompt_with_requirements() {
        let messages = compose_messages(&GenerationRequest::new("  a red button "));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[1].content.starts_with(
            "Create a React TypeScript component with the following requirements: a red button\n"
        ));
    }

    #[test]
    fn follow_up_embeds_prior_code_verbatim_before_instruction() {
        let prior = "import React from 'react';\n\nexport default function Btn() {\n  return <button />;\n}";
        let message = user_message(&GenerationRequest::follow_up("make it blue", prior));
        let code_at = message.find(prior).expect("prior code embedded verbatim");
        let instruction_at = message.find("User request: make it blue").expect("instruction");
        assert!(code_at < instruction_at);
        assert!(message.contains("full updated component"));
    }
}
