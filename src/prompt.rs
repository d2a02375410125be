use std::collections::HashMap;

use crate::models::{Document, Message};

pub const SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer \
the question. If you don't know the answer, say that you \
don't know. Use three sentences maximum and keep the \
answer concise.\
\n\n\
{context}";

pub const HUMAN_TEMPLATE: &str = "{input}";

const DOCUMENT_SEPARATOR: &str = "\n\n";

/// A system + human message pair with `{name}` placeholders.
#[derive(Debug, Clone)]
pub struct ChatPromptTemplate {
    messages: Vec<(String, String)>,
}

impl ChatPromptTemplate {
    pub fn from_messages<R, T>(messages: impl IntoIterator<Item = (R, T)>) -> Self
    where
        R: Into<String>,
        T: Into<String>,
    {
        Self {
            messages: messages
                .into_iter()
                .map(|(role, template)| (role.into(), template.into()))
                .collect(),
        }
    }

    /// The question-answering prompt, optionally with a custom system instruction.
    pub fn question_answering(system_prompt: Option<&str>) -> Self {
        Self::from_messages([
            ("system", system_prompt.unwrap_or(SYSTEM_PROMPT)),
            ("user", HUMAN_TEMPLATE),
        ])
    }

    pub fn format_messages(&self, vars: &HashMap<&str, &str>) -> Vec<Message> {
        self.messages
            .iter()
            .map(|(role, template)| Message {
                role: role.clone(),
                content: render(template, vars),
            })
            .collect()
    }
}

/// Substitutes `{name}` placeholders in a single pass so that substituted
/// text is never re-scanned. Unknown placeholders are left as-is.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_placeholder(&after[..close]) => {
                let name = &after[..close];
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_placeholder(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Joins document contents the way they are stuffed into `{context}`.
pub fn format_documents(docs: &[Document]) -> String {
    docs.iter()
        .map(|d| d.page_content.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_known_vars() {
        let vars = HashMap::from([("context", "ctx"), ("input", "question")]);
        assert_eq!(render("A {context} B {input}", &vars), "A ctx B question");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let vars = HashMap::from([("context", "{input}"), ("input", "q")]);
        assert_eq!(render("{context}/{input}", &vars), "{input}/q");
    }

    #[test]
    fn test_render_keeps_unknown_and_stray_braces() {
        let vars = HashMap::from([("input", "q")]);
        assert_eq!(render("{missing} {input} {a b} {", &vars), "{missing} q {a b} {");
        assert_eq!(render("json: {\"k\": 1}", &vars), "json: {\"k\": 1}");
    }

    #[test]
    fn test_question_answering_messages() {
        let prompt = ChatPromptTemplate::question_answering(None);
        let vars = HashMap::from([("context", "Fever is a symptom."), ("input", "What is fever?")]);
        let messages = prompt.format_messages(&vars);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.starts_with("You are an assistant"));
        assert!(messages[0].content.ends_with("\n\nFever is a symptom."));
        assert_eq!(messages[1], Message::user("What is fever?"));
    }

    #[test]
    fn test_custom_system_prompt() {
        let prompt = ChatPromptTemplate::question_answering(Some("Context: {context}"));
        let vars = HashMap::from([("context", "c"), ("input", "i")]);
        assert_eq!(prompt.format_messages(&vars)[0].content, "Context: c");
    }

    #[test]
    fn test_format_documents_joins_with_blank_line() {
        let docs = vec![Document::new("one"), Document::new("two")];
        assert_eq!(format_documents(&docs), "one\n\ntwo");
        assert_eq!(format_documents(&[]), "");
    }
}
